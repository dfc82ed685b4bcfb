use serde::{Deserialize, Serialize};

/// Group title assigned to channels from comma-delimited lists
pub const DEFAULT_GROUP_TITLE: &str = "Default";

/// Playlist text format, selected by `detect_format`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistFormat {
    /// `#EXTM3U` playlist with `#EXTINF` metadata lines
    ExtendedM3u,
    /// One `name,url` pair per line
    CommaDelimited,
}

impl std::fmt::Display for PlaylistFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaylistFormat::ExtendedM3u => write!(f, "m3u"),
            PlaylistFormat::CommaDelimited => write!(f, "comma_delimited"),
        }
    }
}

/// `tvg-*` metadata of a channel. Missing values are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tvg {
    pub id: String,
    pub name: String,
    pub logo: String,
    pub url: String,
    pub rec: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub title: String,
}

/// Single normalized channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub url: String,
    pub tvg: Tvg,
    pub group: Group,
}

impl Channel {
    /// Channel from a comma-delimited line: only the name is known
    pub fn from_name_and_url(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            tvg: Tvg {
                name: name.to_string(),
                ..Tvg::default()
            },
            group: Group {
                title: DEFAULT_GROUP_TITLE.to_string(),
            },
        }
    }
}

/// Query string shared by `/playlist`, `/epg` and `/proxy`
#[derive(Debug, Default, Deserialize)]
pub struct UrlQuery {
    #[serde(default)]
    pub url: Option<String>,
}

impl UrlQuery {
    /// The `url` parameter, treating an empty value as missing
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_json_shape() {
        let channel = Channel::from_name_and_url("CCTV-1", "http://a/1.m3u8");
        let json = serde_json::to_value(&channel).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "name": "CCTV-1",
                "url": "http://a/1.m3u8",
                "tvg": { "id": "", "name": "CCTV-1", "logo": "", "url": "", "rec": "" },
                "group": { "title": "Default" }
            })
        );
    }

    #[test]
    fn test_blank_url_parameter_is_missing() {
        let query = |url: Option<&str>| UrlQuery { url: url.map(str::to_string) };

        assert_eq!(query(None).url(), None);
        assert_eq!(query(Some("")).url(), None);
        assert_eq!(query(Some("  ")).url(), None);
        assert_eq!(query(Some("http://a/epg.xml")).url(), Some("http://a/epg.xml"));
    }
}
