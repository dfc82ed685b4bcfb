use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::models::{Channel, Group, PlaylistFormat, Tvg};

/// Marker that identifies an extended M3U playlist
const EXTM3U_MARKER: &str = "#EXTM3U";

lazy_static! {
    /// Regex to parse EXTINF attributes (tvg-id="...", group-title="...", etc)
    static ref ATTR_REGEX: Regex = Regex::new(r#"([\w.]+(?:-[\w.]+)*)="([^"]*)""#).unwrap();
}

/// Parsed EXTINF line data
#[derive(Debug, Default)]
struct ExtinfData {
    attributes: HashMap<String, String>,
    title: String,
}

impl ExtinfData {
    fn attr(&self, key: &str) -> String {
        self.attributes.get(key).cloned().unwrap_or_default()
    }
}

/// Pick the parser for a playlist body.
///
/// Any occurrence of `#EXTM3U` selects the M3U parser; everything else is
/// read as a comma-delimited list. New formats get a new variant here.
pub fn detect_format(text: &str) -> PlaylistFormat {
    if text.contains(EXTM3U_MARKER) {
        PlaylistFormat::ExtendedM3u
    } else {
        PlaylistFormat::CommaDelimited
    }
}

/// Normalize a playlist body into channels, in source order.
/// Entries that cannot be parsed are skipped.
pub fn normalize(text: &str) -> (PlaylistFormat, Vec<Channel>) {
    let format = detect_format(text);
    let channels = match format {
        PlaylistFormat::ExtendedM3u => parse_extended_m3u(text),
        PlaylistFormat::CommaDelimited => parse_comma_delimited(text),
    };
    (format, channels)
}

/// Byte offset of the first comma not inside a quoted attribute value
fn find_title_separator(content: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (idx, c) in content.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Parse an EXTINF line
/// Format: #EXTINF:duration tvg-id="..." tvg-name="..." tvg-logo="..." group-title="...",Title
fn parse_extinf(line: &str) -> Option<ExtinfData> {
    let content = line.strip_prefix("#EXTINF:")?;

    let separator = find_title_separator(content)?;
    let header = &content[..separator];
    let title = content[separator + 1..].trim().to_string();

    let mut attributes = HashMap::new();
    for caps in ATTR_REGEX.captures_iter(header) {
        let key = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
        let value = caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();
        attributes.insert(key, value);
    }

    Some(ExtinfData {
        attributes,
        title,
    })
}

fn build_channel(extinf: ExtinfData, extgrp: Option<String>, url: &str) -> Option<Channel> {
    let tvg = Tvg {
        id: extinf.attr("tvg-id"),
        name: extinf.attr("tvg-name"),
        logo: extinf.attr("tvg-logo"),
        url: extinf.attr("tvg-url"),
        rec: extinf.attr("tvg-rec"),
    };

    let name = if extinf.title.is_empty() {
        tvg.name.clone()
    } else {
        extinf.title.clone()
    };
    if name.is_empty() || url.is_empty() {
        return None;
    }

    let group_title = match extinf.attributes.get("group-title") {
        Some(title) if !title.is_empty() => title.clone(),
        _ => extgrp.unwrap_or_default(),
    };

    Some(Channel {
        name,
        url: url.to_string(),
        tvg,
        group: Group { title: group_title },
    })
}

/// Extended M3U: each `#EXTINF` line describes the next URL line
pub fn parse_extended_m3u(text: &str) -> Vec<Channel> {
    let mut channels = Vec::new();
    let mut pending: Option<ExtinfData> = None;
    let mut pending_group: Option<String> = None;

    for (line_no, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed.starts_with("#EXTINF:") {
            if pending.is_some() {
                tracing::debug!(line = line_no + 1, "EXTINF without stream URL skipped");
            }
            pending = parse_extinf(trimmed);
            pending_group = None;
            if pending.is_none() {
                tracing::debug!(line = line_no + 1, "malformed EXTINF line skipped");
            }
            continue;
        }

        if let Some(group) = trimmed.strip_prefix("#EXTGRP:") {
            pending_group = Some(group.trim().to_string());
            continue;
        }

        // Other directives (#EXTM3U, #EXTVLCOPT, #KODIPROP, ...)
        if trimmed.starts_with('#') {
            continue;
        }

        match pending.take() {
            Some(extinf) => match build_channel(extinf, pending_group.take(), trimmed) {
                Some(channel) => channels.push(channel),
                None => tracing::debug!(line = line_no + 1, "entry without name skipped"),
            },
            None => tracing::debug!(line = line_no + 1, "stream URL without EXTINF skipped"),
        }
    }

    channels
}

/// Comma-delimited list: `name,url` per line. Commas after the first belong to the URL.
pub fn parse_comma_delimited(text: &str) -> Vec<Channel> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split(',').collect();
            if parts.len() < 2 {
                return None;
            }
            let name = parts[0].trim();
            let url = parts[1..].join(",");
            let url = url.trim();
            if name.is_empty() || url.is_empty() {
                return None;
            }
            Some(Channel::from_name_and_url(name, url))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DEFAULT_GROUP_TITLE;

    #[test]
    fn test_parse_extinf() {
        let line = r#"#EXTINF:-1 tvg-id="globo" tvg-name="Globo HD" tvg-logo="http://logo.com/globo.png" group-title="TV",Globo HD"#;
        let extinf = parse_extinf(line).unwrap();

        assert_eq!(extinf.title, "Globo HD");
        assert_eq!(extinf.attributes.get("tvg-id"), Some(&"globo".to_string()));
        assert_eq!(extinf.attributes.get("group-title"), Some(&"TV".to_string()));
    }

    #[test]
    fn test_parse_extinf_minimal() {
        let line = "#EXTINF:-1,Canal Teste";
        let extinf = parse_extinf(line).unwrap();

        assert_eq!(extinf.title, "Canal Teste");
        assert!(extinf.attributes.is_empty());
    }

    #[test]
    fn test_parse_extinf_comma_inside_attribute() {
        let line = r#"#EXTINF:-1 group-title="News, Sports",Sky News"#;
        let extinf = parse_extinf(line).unwrap();

        assert_eq!(extinf.title, "Sky News");
        assert_eq!(
            extinf.attributes.get("group-title"),
            Some(&"News, Sports".to_string())
        );
    }

    #[test]
    fn test_parse_extinf_ignores_duration_value() {
        for line in [
            r#"#EXTINF:0 tvg-id="a",Channel A"#,
            r#"#EXTINF:12.5 tvg-id="a",Channel A"#,
            r#"#EXTINF: tvg-id="a",Channel A"#,
        ] {
            let extinf = parse_extinf(line).unwrap();
            assert_eq!(extinf.title, "Channel A", "{}", line);
            assert_eq!(extinf.attr("tvg-id"), "a", "{}", line);
        }
    }

    #[test]
    fn test_parse_extinf_without_title_separator() {
        assert!(parse_extinf("#EXTINF:-1 tvg-id=\"x\"").is_none());
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(detect_format("#EXTM3U\n#EXTINF:-1,A\nhttp://a"), PlaylistFormat::ExtendedM3u);
        assert_eq!(detect_format("CCTV1,http://a.com/1.ts"), PlaylistFormat::CommaDelimited);
        // Substring match, not only at the start
        assert_eq!(detect_format("junk\n#EXTM3U"), PlaylistFormat::ExtendedM3u);
    }

    #[test]
    fn test_extended_m3u_entries_in_order() {
        let text = "#EXTM3U url-tvg=\"http://epg.example.com/guide.xml\"\r\n\
#EXTINF:-1 tvg-id=\"cctv1\" tvg-name=\"CCTV-1\" tvg-logo=\"http://logo/1.png\" tvg-url=\"http://epg/1\" tvg-rec=\"7\" group-title=\"News\",CCTV 1\r\n\
http://a.com/1.m3u8\r\n\
#EXTINF:-1,Second\r\n\
#EXTVLCOPT:http-referrer=http://example.com\r\n\
http://a.com/2.m3u8\r\n\
#EXTINF:-1,Second\r\n\
http://a.com/2.m3u8\r\n";

        let channels = parse_extended_m3u(text);
        assert_eq!(channels.len(), 3);

        assert_eq!(channels[0].name, "CCTV 1");
        assert_eq!(channels[0].url, "http://a.com/1.m3u8");
        assert_eq!(channels[0].tvg.id, "cctv1");
        assert_eq!(channels[0].tvg.name, "CCTV-1");
        assert_eq!(channels[0].tvg.logo, "http://logo/1.png");
        assert_eq!(channels[0].tvg.url, "http://epg/1");
        assert_eq!(channels[0].tvg.rec, "7");
        assert_eq!(channels[0].group.title, "News");

        // Duplicates pass through untouched
        assert_eq!(channels[1], channels[2]);
        assert_eq!(channels[1].group.title, "");
        assert_eq!(channels[1].tvg, Tvg::default());
    }

    #[test]
    fn test_extended_m3u_extgrp_and_name_fallback() {
        let text = "#EXTM3U\n\
#EXTINF:-1 tvg-name=\"Fallback Name\",\n\
#EXTGRP:Movies\n\
http://a.com/movie.mp4\n";

        let channels = parse_extended_m3u(text);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Fallback Name");
        assert_eq!(channels[0].group.title, "Movies");
    }

    #[test]
    fn test_extended_m3u_skips_broken_entries() {
        let text = "#EXTM3U\n\
http://orphan.com/stream\n\
#EXTINF:-1 tvg-id=\"broken\"\n\
http://a.com/broken\n\
#EXTINF:-1,\n\
http://a.com/nameless\n\
#EXTINF:-1,Dangling\n\
#EXTINF:-1,Good\n\
http://a.com/good\n\
#EXTINF:-1,No URL at end\n";

        let channels = parse_extended_m3u(text);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "Good");
        assert_eq!(channels[0].url, "http://a.com/good");
    }

    #[test]
    fn test_comma_delimited_single_line() {
        let channels = parse_comma_delimited("CCTV1,http://a.com/1.ts");
        assert_eq!(channels.len(), 1);

        let channel = &channels[0];
        assert_eq!(channel.name, "CCTV1");
        assert_eq!(channel.url, "http://a.com/1.ts");
        assert_eq!(channel.tvg.name, "CCTV1");
        assert_eq!(channel.tvg.id, "");
        assert_eq!(channel.tvg.logo, "");
        assert_eq!(channel.tvg.url, "");
        assert_eq!(channel.tvg.rec, "");
        assert_eq!(channel.group.title, DEFAULT_GROUP_TITLE);
    }

    #[test]
    fn test_comma_delimited_rejoins_url_commas() {
        let channels = parse_comma_delimited("A,http://x,y=1");
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].name, "A");
        assert_eq!(channels[0].url, "http://x,y=1");
    }

    #[test]
    fn test_comma_delimited_drops_bad_lines() {
        let text = "\r\n\
no comma here\r\n\
 ,http://a.com/no-name\r\n\
Empty URL,   \r\n\
  Spaced  ,  http://a.com/spaced  \r\n\
   \r\n\
Dup,http://a.com/d\r\n\
Dup,http://a.com/d\r\n";

        let channels = parse_comma_delimited(text);
        let names: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Spaced", "Dup", "Dup"]);
        assert_eq!(channels[0].url, "http://a.com/spaced");
    }

    #[test]
    fn test_normalize_dispatches_on_marker() {
        let (format, channels) = normalize("CCTV1,http://a.com/1.ts\nCCTV2,http://a.com/2.ts");
        assert_eq!(format, PlaylistFormat::CommaDelimited);
        assert_eq!(channels.len(), 2);

        let (format, channels) = normalize("#EXTM3U\n#EXTINF:-1,CCTV1\nhttp://a.com/1.ts\n");
        assert_eq!(format, PlaylistFormat::ExtendedM3u);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].group.title, "");
    }
}
