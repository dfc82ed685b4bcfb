pub mod cache;
pub mod epg;
pub mod fetcher;
pub mod fragment;
pub mod m3u_parser;
pub mod relay;
pub mod xmltv;
