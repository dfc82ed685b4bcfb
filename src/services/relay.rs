//! Stream relay
//!
//! Re-issues a GET for a manifest or segment and hands the origin's status,
//! content type and body stream back to the route, so the player only ever
//! talks to this server. Nothing is buffered or stored.
//!
//! Live channels and progressive files never finish within a fixed budget, so
//! the proxy timeout bounds the wait for the origin's response headers and
//! each gap between body chunks, never the transfer as a whole.

use bytes::Bytes;
use futures::stream::{self, Stream};
use reqwest::{header, Client, Response};
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;
use crate::services::fetcher::{client_builder, parse_remote_url, FetchError};

/// Upstream headers copied onto the relayed response
static PASSTHROUGH_HEADERS: [header::HeaderName; 4] = [
    header::CONTENT_LENGTH,
    header::ACCEPT_RANGES,
    header::ETAG,
    header::LAST_MODIFIED,
];

#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    InvalidUrl(FetchError),
    #[error("upstream timed out: {0}")]
    Timeout(reqwest::Error),
    #[error("upstream sent no response within {0:?}")]
    NoResponse(Duration),
    #[error("upstream stalled for {0:?} mid-body")]
    Stalled(Duration),
    #[error("upstream request failed: {0}")]
    Request(reqwest::Error),
    #[error("upstream returned HTTP {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("invalid upstream response: {0}")]
    Response(String),
}

/// Client headers forwarded to the origin
#[derive(Debug, Default, Clone)]
pub struct ForwardHeaders {
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub range: Option<String>,
}

/// Successful upstream response, body not yet read
pub struct RelayResponse {
    pub status: u16,
    pub content_type: String,
    /// (lowercase header name, value) pairs from `PASSTHROUGH_HEADERS`
    pub headers: Vec<(&'static str, String)>,
    upstream: Response,
    idle_timeout: Duration,
}

impl RelayResponse {
    /// Body chunks as they arrive. Errors when the origin stays silent longer
    /// than the idle timeout; dropping the stream closes the upstream transfer.
    pub fn into_body_stream(self) -> impl Stream<Item = Result<Bytes, RelayError>> + Send + 'static {
        let idle = self.idle_timeout;
        stream::try_unfold(self.upstream, move |mut upstream| async move {
            let next = tokio::time::timeout(idle, upstream.chunk()).await;
            match next {
                Ok(Ok(Some(chunk))) => Ok(Some((chunk, upstream))),
                Ok(Ok(None)) => Ok(None),
                Ok(Err(e)) => Err(RelayError::Request(e)),
                Err(_) => Err(RelayError::Stalled(idle)),
            }
        })
    }
}

/// Guess content type from URL
pub fn guess_content_type(url: &str) -> &'static str {
    let lower = url.to_lowercase();
    if lower.contains(".m3u8") {
        "application/vnd.apple.mpegurl"
    } else if lower.contains(".mp4") {
        "video/mp4"
    } else if lower.contains(".mkv") {
        "video/x-matroska"
    } else if lower.contains(".avi") {
        "video/x-msvideo"
    } else {
        "video/MP2T"
    }
}

pub struct StreamRelay {
    client: Client,
    default_user_agent: String,
    /// Bounds connect, response headers and each gap between body chunks
    timeout: Duration,
}

impl StreamRelay {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let timeout = config.proxy_timeout();
        let client = client_builder(&config.user_agent, config.max_redirects)
            .connect_timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            default_user_agent: config.user_agent.clone(),
            timeout,
        })
    }

    /// GET `url` on behalf of a player. Non-2xx and transport failures are errors; nothing is retried.
    pub async fn relay(
        &self,
        url: &str,
        forward: &ForwardHeaders,
    ) -> Result<RelayResponse, RelayError> {
        let target = parse_remote_url(url).map_err(RelayError::InvalidUrl)?;

        let user_agent = forward
            .user_agent
            .as_deref()
            .filter(|ua| !ua.is_empty())
            .unwrap_or(&self.default_user_agent);

        let mut request = self
            .client
            .get(target)
            .header(header::USER_AGENT, user_agent)
            .header(header::ACCEPT, "*/*");

        if let Some(referer) = forward.referer.as_deref() {
            request = request.header(header::REFERER, referer);
        }

        // Forward Range header for partial content requests
        if let Some(range) = forward.range.as_deref() {
            request = request.header(header::RANGE, range);
        }

        let upstream = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| RelayError::NoResponse(self.timeout))?
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout(e)
                } else {
                    RelayError::Request(e)
                }
            })?;

        let status = upstream.status();
        if !status.is_success() {
            return Err(RelayError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        // Origin content type verbatim; guessed only when the origin sends none
        let content_type = upstream
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| guess_content_type(url).to_string());

        let headers = PASSTHROUGH_HEADERS
            .iter()
            .filter_map(|name| {
                let value = upstream.headers().get(name)?.to_str().ok()?;
                Some((name.as_str(), value.to_string()))
            })
            .collect();

        Ok(RelayResponse {
            status: status.as_u16(),
            content_type,
            headers,
            upstream,
            idle_timeout: self.timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("http://a/live.M3U8?t=1"), "application/vnd.apple.mpegurl");
        assert_eq!(guess_content_type("http://a/movie.mp4"), "video/mp4");
        assert_eq!(guess_content_type("http://a/movie.mkv"), "video/x-matroska");
        assert_eq!(guess_content_type("http://a/movie.avi"), "video/x-msvideo");
        assert_eq!(guess_content_type("http://a/seg-001.ts"), "video/MP2T");
        assert_eq!(guess_content_type("http://a/stream"), "video/MP2T");
    }

    #[tokio::test]
    async fn test_relay_rejects_non_http_url() {
        let relay = StreamRelay::new(&Config::default()).unwrap();
        let result = relay.relay("file:///etc/passwd", &ForwardHeaders::default()).await;
        assert!(matches!(result, Err(RelayError::InvalidUrl(_))));
    }
}
