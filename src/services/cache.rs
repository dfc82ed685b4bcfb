use chrono::{DateTime, Utc};
use lru::LruCache;
use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::metrics;
use crate::models::EpgResponse;

/// Source of "now" for staleness checks
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheEntry {
    value: Arc<EpgResponse>,
    stored_at: DateTime<Utc>,
}

type KeyLocks = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Holds the per-key load lock; removes the lock from the table when the last holder leaves
struct InflightGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // Table + this guard: nobody else is waiting on the key
        if Arc::strong_count(&self.lock) <= 2 {
            locks.remove(&self.key);
        }
    }
}

/// In-memory EPG cache keyed by source URL (verbatim, no canonicalization).
///
/// Entries go stale `ttl` after they were stored and are refreshed lazily on
/// the next lookup. Concurrent misses for the same URL share one load.
pub struct EpgCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    inflight: KeyLocks,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
}

impl EpgCache {
    /// `max_entries` caps distinct URLs (least recently used evicted); `None` is unbounded
    pub fn new(ttl: Duration, max_entries: Option<usize>, clock: Arc<dyn Clock>) -> Self {
        let entries = match max_entries.and_then(NonZeroUsize::new) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };

        Self {
            entries: Mutex::new(entries),
            inflight: StdMutex::new(HashMap::new()),
            ttl: chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::weeks(5200)),
            clock,
        }
    }

    /// Fresh value for `url`, if any
    pub async fn get(&self, url: &str) -> Option<Arc<EpgResponse>> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().await;
        let entry = entries.get(url)?;

        if now - entry.stored_at < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    /// Store `value` for `url`, replacing any previous entry
    pub async fn insert(&self, url: &str, value: Arc<EpgResponse>) {
        let stored_at = self.clock.now();
        let mut entries = self.entries.lock().await;
        if let Some((evicted, _)) = entries.push(url.to_string(), CacheEntry { value, stored_at }) {
            if evicted != url {
                tracing::info!(evicted_url = %evicted, "EPG cache entry evicted by LRU");
            }
        }
    }

    /// Number of entries, fresh or stale
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn lock_key(&self, url: &str) -> InflightGuard<'_> {
        let lock = {
            let mut locks = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            locks
                .entry(url.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let guard = lock.clone().lock_owned().await;
        InflightGuard {
            locks: &self.inflight,
            key: url.to_string(),
            lock,
            guard: Some(guard),
        }
    }

    /// Return the cached value for `url`, or run `load` and cache its result.
    ///
    /// Failed loads are not cached.
    pub async fn get_or_fetch<F, Fut, E>(&self, url: &str, load: F) -> Result<Arc<EpgResponse>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<EpgResponse, E>>,
    {
        if let Some(value) = self.get(url).await {
            tracing::info!(url, "Returning cached EPG");
            metrics::EPG_CACHE_LOOKUPS.with_label_values(&["hit"]).inc();
            return Ok(value);
        }

        let _inflight = self.lock_key(url).await;

        // Filled by a concurrent request while we waited for the key
        if let Some(value) = self.get(url).await {
            tracing::debug!(url, "EPG loaded by concurrent request");
            metrics::EPG_CACHE_LOOKUPS.with_label_values(&["coalesced"]).inc();
            return Ok(value);
        }

        metrics::EPG_CACHE_LOOKUPS.with_label_values(&["miss"]).inc();
        let value = Arc::new(load().await?);
        self.insert(url, value.clone()).await;
        Ok(value)
    }
}
