mod epg;
mod playlist;

pub use epg::{EpgResponse, Programme, ProgrammeRaw, TextNode, TvDocument};
pub use playlist::{Channel, Group, PlaylistFormat, Tvg, UrlQuery, DEFAULT_GROUP_TITLE};
