//! `HttpStackCache` -- reqwest downloads behind an LRU of item bytes.
//!
//! Concurrent requests for the same id share one download; a cached id is
//! served without touching the network. Entries are bounded by count, not
//! bytes.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use lru::LruCache;
use serde::Serialize;
use stackfetch_core::config::FetchConfig;
use stackfetch_core::{FetchAndCache, FetchError};
use tracing::{debug, info, warn};
use url::Url;

/// One download, awaitable by every caller that asked for the same id.
type Download = Shared<BoxFuture<'static, Result<Bytes, FetchError>>>;

struct CacheState {
    entries: LruCache<String, Bytes>,
    in_flight: HashMap<String, Download>,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Requests satisfied by joining a download already in progress.
    pub joined: u64,
    pub entries: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.joined;
        if total == 0 {
            0.0
        } else {
            (self.hits + self.joined) as f64 / total as f64
        }
    }
}

/// HTTP fetch-and-cache for stack items.
pub struct HttpStackCache {
    client: reqwest::Client,
    /// Ids are joined onto this. `None` means ids are absolute URLs.
    base_url: Option<Url>,
    timeout_ms: u64,
    state: Mutex<CacheState>,
    hits: AtomicU64,
    misses: AtomicU64,
    joined: AtomicU64,
}

impl HttpStackCache {
    /// Wrap an existing client. A capacity of zero is treated as one.
    pub fn new(
        client: reqwest::Client,
        base_url: Option<&str>,
        capacity: usize,
    ) -> Result<Self, FetchError> {
        let base_url = base_url.map(parse_base_url).transpose()?;
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Ok(Self {
            client,
            base_url,
            timeout_ms: 0,
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                in_flight: HashMap::new(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            joined: AtomicU64::new(0),
        })
    }

    /// Build a client with the configured timeout and user agent.
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| FetchError::Http(e.to_string()))?;

        let mut cache = Self::new(client, config.base_url.as_deref(), config.cache_capacity)?;
        cache.timeout_ms = config.request_timeout_ms;

        info!(
            base_url = config.base_url.as_deref().unwrap_or("(absolute ids)"),
            capacity = config.cache_capacity,
            timeout_ms = config.request_timeout_ms,
            "HTTP stack cache ready"
        );
        Ok(cache)
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The URL an id is downloaded from.
    pub fn resolve(&self, id: &str) -> Result<Url, FetchError> {
        let parsed = match &self.base_url {
            Some(base) => base.join(id),
            None => Url::parse(id),
        };
        parsed.map_err(|e| FetchError::InvalidId {
            id: id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Return the item's bytes, downloading them on a cache miss.
    pub async fn fetch(&self, id: &str) -> Result<Bytes, FetchError> {
        let download = {
            let mut state = self.lock_state();
            if let Some(bytes) = state.entries.get(id).cloned() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(id, "cache hit");
                return Ok(bytes);
            }
            if let Some(pending) = state.in_flight.get(id).cloned() {
                self.joined.fetch_add(1, Ordering::Relaxed);
                debug!(id, "joining in-flight download");
                pending
            } else {
                let url = self.resolve(id)?;
                self.misses.fetch_add(1, Ordering::Relaxed);
                let pending =
                    download_item(self.client.clone(), url, id.to_string(), self.timeout_ms)
                        .boxed()
                        .shared();
                state.in_flight.insert(id.to_string(), pending.clone());
                pending
            }
        };

        let result = download.clone().await;

        // Whoever settles first moves the result into the cache; later
        // joiners find the in-flight slot already gone or replaced.
        let mut state = self.lock_state();
        if state
            .in_flight
            .get(id)
            .is_some_and(|current| current.ptr_eq(&download))
        {
            state.in_flight.remove(id);
            if let Ok(bytes) = &result {
                if let Some((evicted, _)) = state.entries.push(id.to_string(), bytes.clone()) {
                    if evicted != id {
                        debug!(evicted = %evicted, "cache entry evicted");
                    }
                }
            }
        }
        result
    }

    /// Cached bytes for an id, if present. Refreshes its recency.
    pub fn get(&self, id: &str) -> Option<Bytes> {
        self.lock_state().entries.get(id).cloned()
    }

    /// Seed the cache with bytes obtained elsewhere.
    pub fn prime(&self, id: impl Into<String>, bytes: Bytes) {
        self.lock_state().entries.put(id.into(), bytes);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock_state().entries.contains(id)
    }

    pub fn len(&self) -> usize {
        self.lock_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            joined: self.joined.load(Ordering::Relaxed),
            entries: state.entries.len(),
            capacity: state.entries.cap().get(),
        }
    }
}

#[async_trait]
impl FetchAndCache for HttpStackCache {
    async fn fetch_and_cache(&self, id: &str) -> Result<(), FetchError> {
        self.fetch(id).await.map(|_| ())
    }
}

/// Directory-style base: a missing trailing slash would make `join` replace
/// the last path segment instead of appending to it.
fn parse_base_url(raw: &str) -> Result<Url, FetchError> {
    let mut url = Url::parse(raw).map_err(|e| FetchError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(FetchError::InvalidBaseUrl {
            url: raw.to_string(),
            reason: "URL cannot be used as a base".into(),
        });
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn download_item(
    client: reqwest::Client,
    url: Url,
    id: String,
    timeout_ms: u64,
) -> Result<Bytes, FetchError> {
    debug!(%url, "downloading stack item");
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| map_reqwest_error(e, timeout_ms))?;

    let status = response.status();
    if !status.is_success() {
        warn!(%url, status = status.as_u16(), "stack item request rejected");
        return Err(FetchError::Status {
            id,
            status: status.as_u16(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| map_reqwest_error(e, timeout_ms))?;
    debug!(%url, bytes = bytes.len(), "stack item downloaded");
    Ok(bytes)
}

fn map_reqwest_error(err: reqwest::Error, timeout_ms: u64) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(timeout_ms)
    } else {
        FetchError::Http(err.to_string())
    }
}
