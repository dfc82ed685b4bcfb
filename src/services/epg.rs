use std::borrow::Cow;
use std::sync::Arc;
use thiserror::Error;

use crate::models::EpgResponse;
use crate::services::cache::EpgCache;
use crate::services::fetcher::{gunzip, is_gzip_url, parse_remote_url, FetchError, ResourceFetcher};
use crate::services::xmltv::{self, XmltvError};

#[derive(Debug, Error)]
pub enum EpgError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("failed to parse XMLTV: {0}")]
    Parse(#[from] XmltvError),
    #[error("EPG worker failed: {0}")]
    Worker(String),
}

/// EPG lookups: cache first, then fetch → gunzip → normalize → store
pub struct EpgService {
    fetcher: ResourceFetcher,
    cache: EpgCache,
}

impl EpgService {
    pub fn new(fetcher: ResourceFetcher, cache: EpgCache) -> Self {
        Self { fetcher, cache }
    }

    pub fn cache(&self) -> &EpgCache {
        &self.cache
    }

    /// Programmes for the guide at `url`, served from cache while fresh
    pub async fn programmes(&self, url: &str) -> Result<Arc<EpgResponse>, EpgError> {
        self.cache.get_or_fetch(url, || self.load(url)).await
    }

    async fn load(&self, raw_url: &str) -> Result<EpgResponse, EpgError> {
        let url = parse_remote_url(raw_url)?;
        let compressed = is_gzip_url(&url);

        tracing::info!(url = %url, compressed, "Fetching EPG");
        let body = self.fetcher.fetch_bytes(&url).await?;

        // Decompression and XML parsing of large guides stay off the async workers
        let programmes = tokio::task::spawn_blocking(move || {
            let xml: Cow<[u8]> = if compressed {
                Cow::Owned(gunzip(&body)?)
            } else {
                Cow::Borrowed(&body[..])
            };
            xmltv::normalize_bytes(&xml).map_err(EpgError::from)
        })
        .await
        .map_err(|e| EpgError::Worker(e.to_string()))??;

        tracing::info!(url = %url, programmes = programmes.len(), "EPG parsed");
        Ok(EpgResponse { programmes })
    }
}
