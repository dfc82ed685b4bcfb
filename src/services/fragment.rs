//! Fragment URL rewriting
//!
//! HLS players resolve segment URIs relative to the manifest they loaded. When
//! the manifest came through `/proxy?url=...`, a relative `seg-1.ts` resolves
//! to `<relay origin>/seg-1.ts`, which the relay knows nothing about. The
//! rewriter maps every segment request back onto the stream's real location
//! and wraps it as a relay request:
//!
//! ```text
//! http://relay/seg-1.ts  + base http://origin/live/  ->  http://relay/proxy?url=http%3A%2F%2Forigin%2Flive%2Fseg-1.ts
//! ```
//!
//! Rewriting is stateless and idempotent.

use thiserror::Error;
use url::{Origin, Url};

/// Path of the relay endpoint on this server
pub const RELAY_PATH: &str = "/proxy";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RewriteError {
    #[error("invalid relay origin '{0}'")]
    InvalidRelayOrigin(String),
    #[error("invalid stream base url '{0}'")]
    InvalidBase(String),
    #[error("cannot resolve '{target}' against '{base}'")]
    Unresolvable { target: String, base: String },
}

/// Directory containing the manifest, e.g. `http://o/live/index.m3u8` → `http://o/live/`
pub fn stream_base_url(manifest_url: &str) -> String {
    match Url::parse(manifest_url).and_then(|url| url.join(".")) {
        Ok(dir) => dir.to_string(),
        Err(_) => manifest_url
            .rfind('/')
            .map(|idx| manifest_url[..=idx].to_string())
            .unwrap_or_default(),
    }
}

fn is_absolute_http(url: &str) -> bool {
    Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct FragmentRewriter {
    origin: Origin,
    /// Serialized origin without trailing slash, e.g. `http://localhost:3000`
    origin_prefix: String,
}

impl FragmentRewriter {
    /// `relay_base_url` is the public origin players use to reach this server
    pub fn new(relay_base_url: &str) -> Result<Self, RewriteError> {
        let parsed = Url::parse(relay_base_url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| RewriteError::InvalidRelayOrigin(relay_base_url.to_string()))?;

        let origin = parsed.origin();
        Ok(Self {
            origin_prefix: origin.ascii_serialization(),
            origin,
        })
    }

    /// Relay URL for an absolute origin URL (what the player loads for the manifest)
    pub fn relay_url(&self, absolute_url: &str) -> String {
        format!(
            "{}{}?url={}",
            self.origin_prefix,
            RELAY_PATH,
            urlencoding::encode(absolute_url)
        )
    }

    /// Undo a previous trip through the relay.
    ///
    /// `<origin>/proxy?url=X` yields `X`; any other URL on the relay origin
    /// yields its path and query without the leading `/`, to be resolved
    /// against the stream base. Foreign URLs are returned unchanged.
    fn unwrap_relay(&self, requested: &str) -> String {
        let Ok(parsed) = Url::parse(requested) else {
            return requested.to_string();
        };
        if parsed.origin() != self.origin {
            return requested.to_string();
        }

        if parsed.path() == RELAY_PATH {
            if let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "url") {
                return target.into_owned();
            }
        }

        let mut remainder = parsed.path().trim_start_matches('/').to_string();
        if let Some(query) = parsed.query() {
            remainder.push('?');
            remainder.push_str(query);
        }
        remainder
    }

    /// Map a segment request onto the relay.
    ///
    /// `base_url` is the stream's base (the manifest URL or its directory).
    pub fn rewrite(&self, requested: &str, base_url: &str) -> Result<String, RewriteError> {
        let target = self.unwrap_relay(requested.trim());

        let absolute = if is_absolute_http(&target) {
            target
        } else {
            let base = Url::parse(base_url)
                .ok()
                .filter(|u| matches!(u.scheme(), "http" | "https"))
                .ok_or_else(|| RewriteError::InvalidBase(base_url.to_string()))?;
            base.join(&target)
                .map_err(|_| RewriteError::Unresolvable {
                    target: target.clone(),
                    base: base_url.to_string(),
                })?
                .to_string()
        };

        Ok(self.relay_url(&absolute))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://origin.example.com/live/chan1/";

    fn rewriter() -> FragmentRewriter {
        FragmentRewriter::new("http://localhost:3000").unwrap()
    }

    fn relayed(absolute: &str) -> String {
        format!("http://localhost:3000/proxy?url={}", urlencoding::encode(absolute))
    }

    #[test]
    fn test_stream_base_url() {
        assert_eq!(
            stream_base_url("http://origin.example.com/live/chan1/index.m3u8?token=a/b"),
            "http://origin.example.com/live/chan1/"
        );
        assert_eq!(stream_base_url("http://origin.example.com/live/"), "http://origin.example.com/live/");
        assert_eq!(stream_base_url("relative/path/index.m3u8"), "relative/path/");
    }

    #[test]
    fn test_relative_segment_resolved_against_base() {
        let url = rewriter().rewrite("seg-001.ts", BASE).unwrap();
        assert_eq!(url, relayed("http://origin.example.com/live/chan1/seg-001.ts"));
    }

    #[test]
    fn test_relay_origin_url_is_unwrapped() {
        // What a player produces when resolving "seg-001.ts?t=9" against the proxied manifest
        let url = rewriter()
            .rewrite("http://localhost:3000/seg-001.ts?t=9", BASE)
            .unwrap();
        assert_eq!(url, relayed("http://origin.example.com/live/chan1/seg-001.ts?t=9"));
    }

    #[test]
    fn test_absolute_origin_url_wrapped_unchanged() {
        let absolute = "https://cdn.example.net/a/b/seg-7.ts?sig=x,y&e=1";
        let url = rewriter().rewrite(absolute, BASE).unwrap();
        assert_eq!(url, relayed(absolute));
    }

    #[test]
    fn test_protocol_relative_url_takes_base_scheme() {
        let url = rewriter().rewrite("//cdn.example.net/seg.ts", BASE).unwrap();
        assert_eq!(url, relayed("http://cdn.example.net/seg.ts"));
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let r = rewriter();
        for requested in [
            "seg-001.ts",
            "../chan2/seg 2.ts",
            "http://localhost:3000/seg-001.ts",
            "https://cdn.example.net/seg.ts?a=1&b=%2F+x",
        ] {
            let once = r.rewrite(requested, BASE).unwrap();
            let twice = r.rewrite(&once, BASE).unwrap();
            assert_eq!(once, twice, "rewriting {} twice", requested);
        }
    }

    #[test]
    fn test_other_host_on_same_name_not_unwrapped() {
        let url = rewriter()
            .rewrite("http://localhost:8080/seg.ts", BASE)
            .unwrap();
        assert_eq!(url, relayed("http://localhost:8080/seg.ts"));
    }

    #[test]
    fn test_relative_segment_needs_http_base() {
        assert_eq!(
            rewriter().rewrite("seg.ts", "not a url"),
            Err(RewriteError::InvalidBase("not a url".to_string()))
        );
    }

    #[test]
    fn test_invalid_relay_origin() {
        assert!(FragmentRewriter::new("localhost:3000").is_err());
    }
}
