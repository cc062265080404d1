//! Time-to-live caches.
//!
//! Caches are explicit objects owned by a session rather than process-wide
//! singletons. All mutation goes through `DashMap`, so callers need no extra
//! locking. Expired entries are treated as misses and evicted lazily.

use crate::registry::{RegistryError, RegistryResult};
use bytes::Bytes;
use dashmap::DashMap;
use serde::Serialize;
use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Default lifetime of a cached registry answer.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

const USER_AGENT: &str = concat!("jvmdeps/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

pub struct TtlCache<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key)
            && entry.expires_at > now
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(entry.value.clone());
        }

        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn put(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Inserts with the cache's default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.put(key, value, self.default_ttl);
    }

    pub fn remove<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.remove(key);
    }

    /// Drops every entry and resets the counters.
    pub fn clear(&self) {
        self.entries.clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// HTTP client with a TTL response cache in front of it.
///
/// Only successful responses are cached; failures are returned as
/// [`RegistryError`] carrying the HTTP status when there was one.
pub struct HttpCache {
    client: reqwest::Client,
    responses: TtlCache<String, Bytes>,
}

impl HttpCache {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client, using defaults: {}", e);
                reqwest::Client::new()
            });

        Self {
            client,
            responses: TtlCache::new(ttl),
        }
    }

    /// Fetches `url`, serving repeated requests from the cache.
    pub async fn get_cached(&self, url: &str) -> RegistryResult<Bytes> {
        if let Some(body) = self.responses.get(url) {
            tracing::trace!("HTTP cache hit: {}", url);
            return Ok(body);
        }

        let body = self.fetch(url).await?;
        self.responses.insert(url.to_string(), body.clone());
        Ok(body)
    }

    /// Fetches `url` without touching the cache (large binary downloads).
    pub async fn fetch(&self, url: &str) -> RegistryResult<Bytes> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!("GET {} returned {}", url, status);
            return Err(RegistryError::http(url, status.as_u16()));
        }

        response.bytes().await.map_err(|e| request_error(url, &e))
    }

    pub fn stats(&self) -> CacheStats {
        self.responses.stats()
    }

    pub fn clear(&self) {
        self.responses.clear();
    }
}

impl Default for HttpCache {
    fn default() -> Self {
        Self::new()
    }
}

fn request_error(url: &str, err: &reqwest::Error) -> RegistryError {
    match err.status() {
        Some(status) => RegistryError::http(url, status.as_u16()),
        None if err.is_timeout() => RegistryError::transport(url, "request timed out"),
        None => RegistryError::transport(url, err.to_string()),
    }
}
