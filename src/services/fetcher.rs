//! Resource fetcher
//!
//! Retrieves playlists and EPG documents from arbitrary origins. Some IPTV
//! origins reject default HTTP client fingerprints or serve self-issued
//! certificates, so the client:
//!
//! - follows redirects (bounded),
//! - accepts invalid TLS certificates,
//! - sends a desktop browser User-Agent,
//! - negotiates gzip transfer encoding and decodes it transparently,
//! - connects directly, ignoring `HTTP_PROXY`-style environment settings.
//!
//! Payloads that are themselves gzip files (`epg.xml.gz`) are a different
//! matter: the transport hands back the compressed bytes and the caller
//! decompresses them with [`gunzip`].

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use reqwest::{redirect, Client, ClientBuilder};
use std::io::Read;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::Config;

/// gzip member header
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Resource fetcher errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("request timed out: {0}")]
    Timeout(reqwest::Error),
    #[error("request failed: {0}")]
    Request(reqwest::Error),
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },
    #[error("failed to read response body: {0}")]
    Body(reqwest::Error),
    #[error("failed to decompress gzip payload: {0}")]
    Gzip(#[from] std::io::Error),
    #[error("failed to build HTTP client: {0}")]
    Client(reqwest::Error),
}

impl FetchError {
    fn from_send(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err)
        } else {
            FetchError::Request(err)
        }
    }

    fn from_status(status: reqwest::StatusCode) -> Self {
        FetchError::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        }
    }
}

/// Parse and validate an absolute http(s) URL
pub fn parse_remote_url(raw: &str) -> Result<Url, FetchError> {
    let url = Url::parse(raw).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl(format!("unsupported scheme '{}'", other))),
    }
}

/// Whether the URL path names an explicitly gzip-compressed file
pub fn is_gzip_url(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".gz")
}

/// Decompress a gzip payload, including files made of several concatenated members.
///
/// Some servers label `.gz` files with `Content-Encoding: gzip`, in which case
/// the transport has already inflated them; bytes without the gzip header are
/// returned unchanged.
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>, FetchError> {
    if !data.starts_with(&GZIP_MAGIC) {
        return Ok(data.to_vec());
    }

    let mut decoder = MultiGzDecoder::new(data);
    let mut out = Vec::with_capacity(data.len() * 4);
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Hardened client settings shared by the fetcher and the stream relay
pub fn client_builder(user_agent: &str, max_redirects: usize) -> ClientBuilder {
    Client::builder()
        .user_agent(user_agent)
        .gzip(true)
        .danger_accept_invalid_certs(true)
        .redirect(redirect::Policy::limited(max_redirects))
        .no_proxy()
}

/// Client whose `timeout` bounds each whole request, body included
pub fn build_client(
    user_agent: &str,
    timeout: Duration,
    max_redirects: usize,
) -> Result<Client, FetchError> {
    client_builder(user_agent, max_redirects)
        .timeout(timeout)
        .build()
        .map_err(FetchError::Client)
}

/// HTTP fetcher for playlist and EPG sources
#[derive(Clone)]
pub struct ResourceFetcher {
    client: Client,
}

impl ResourceFetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let client = build_client(
            &config.user_agent,
            config.fetch_timeout(),
            config.max_redirects,
        )?;
        Ok(Self { client })
    }

    /// GET `url` and return the raw body. Non-2xx responses are errors; nothing is retried.
    pub async fn fetch_bytes(&self, url: &Url) -> Result<Bytes, FetchError> {
        tracing::debug!(url = %url, "fetching remote resource");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from_send)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %url, status = status.as_u16(), "upstream returned error status");
            return Err(FetchError::from_status(status));
        }

        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(e)
            } else {
                FetchError::Body(e)
            }
        })?;

        tracing::debug!(url = %url, bytes = body.len(), "fetched remote resource");
        Ok(body)
    }

    /// GET `url` and decode the body as UTF-8 (invalid sequences are replaced)
    pub async fn fetch_text(&self, url: &Url) -> Result<String, FetchError> {
        let body = self.fetch_bytes(url).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_parse_remote_url() {
        assert!(parse_remote_url("http://example.com/list.m3u").is_ok());
        assert!(parse_remote_url("https://example.com/epg.xml.gz?token=1").is_ok());
        assert!(matches!(
            parse_remote_url("ftp://example.com/list.m3u"),
            Err(FetchError::InvalidUrl(_))
        ));
        assert!(matches!(
            parse_remote_url("not a url"),
            Err(FetchError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_is_gzip_url_uses_path_only() {
        let gz = Url::parse("http://test.com/epg.xml.gz").unwrap();
        let gz_query = Url::parse("http://test.com/epg.xml.GZ?day=1").unwrap();
        let plain = Url::parse("http://test.com/epg.xml?file=a.gz").unwrap();
        assert!(is_gzip_url(&gz));
        assert!(is_gzip_url(&gz_query));
        assert!(!is_gzip_url(&plain));
    }

    #[test]
    fn test_gunzip_roundtrip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"<tv></tv>").unwrap();
        let compressed = encoder.finish().unwrap();

        assert_eq!(gunzip(&compressed).unwrap(), b"<tv></tv>");
    }

    #[test]
    fn test_gunzip_concatenated_members() {
        let member = |part: &[u8]| {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(part).unwrap();
            encoder.finish().unwrap()
        };
        let mut data = member(b"<tv><programme channel=\"a\"/>");
        data.extend(member(b"<programme channel=\"b\"/></tv>"));

        assert_eq!(
            gunzip(&data).unwrap(),
            b"<tv><programme channel=\"a\"/><programme channel=\"b\"/></tv>"
        );
    }

    #[test]
    fn test_gunzip_passes_through_plain_bytes() {
        assert_eq!(gunzip(b"<tv></tv>").unwrap(), b"<tv></tv>");
    }

    #[test]
    fn test_gunzip_rejects_corrupt_header() {
        let corrupt = [0x1f, 0x8b, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01];
        assert!(matches!(gunzip(&corrupt), Err(FetchError::Gzip(_))));
    }

    #[test]
    fn test_status_error_message() {
        let err = FetchError::from_status(reqwest::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "HTTP 404: Not Found");
    }
}
