//! Response cache
//!
//! In-memory cache of successful transform responses backed by moka, keyed by
//! the request path and query string. Only `200` responses are stored; items
//! larger than `max_item_bytes` are skipped.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;
use crate::metrics::TransformMetrics;

/// A cached transform result
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub content_type: String,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn size_bytes(&self) -> usize {
        self.body.len() + self.content_type.len()
    }
}

/// Hit/miss counters local to one cache instance
#[derive(Debug, Default)]
struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

pub struct ResponseCache {
    cache: moka::future::Cache<String, CachedResponse>,
    stats: Arc<CacheStatsTracker>,
    max_item_bytes: usize,
}

impl ResponseCache {
    /// Build the cache, or `None` when caching is disabled
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        Some(Self::new(
            config.max_entries,
            Duration::from_secs(config.ttl_seconds),
            config.max_item_bytes,
        ))
    }

    pub fn new(max_entries: u64, ttl: Duration, max_item_bytes: usize) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self {
            cache,
            stats: Arc::new(CacheStatsTracker::default()),
            max_item_bytes,
        }
    }

    pub async fn get(&self, key: &str) -> Option<CachedResponse> {
        let metrics = TransformMetrics::global();
        match self.cache.get(key).await {
            Some(entry) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                metrics.cache_hits.inc();
                Some(entry)
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                metrics.cache_misses.inc();
                None
            }
        }
    }

    /// Store a response. Returns false when the item is too large to cache.
    pub async fn insert(&self, key: String, response: CachedResponse) -> bool {
        if response.size_bytes() > self.max_item_bytes {
            tracing::debug!(
                // Keys may carry forwarded credentials after the first line
                path = %key.split('\n').next().unwrap_or_default(),
                size = response.size_bytes(),
                max = self.max_item_bytes,
                "Response too large to cache"
            );
            return false;
        }
        self.cache.insert(key, response).await;
        true
    }

    /// Forces moka to process pending evictions and expirations
    pub async fn run_pending(&self) {
        self.cache.run_pending_tasks().await;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &'static [u8]) -> CachedResponse {
        CachedResponse {
            content_type: "image/png".to_string(),
            body: Bytes::from_static(body),
        }
    }

    #[tokio::test]
    async fn test_get_after_insert_hits() {
        let cache = ResponseCache::new(10, Duration::from_secs(60), 1024);
        assert!(cache.get("/api/transform?url=a").await.is_none());

        assert!(cache.insert("/api/transform?url=a".to_string(), response(b"abc")).await);
        let hit = cache.get("/api/transform?url=a").await.unwrap();
        assert_eq!(hit.body.as_ref(), b"abc");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn test_oversized_item_is_not_cached() {
        let cache = ResponseCache::new(10, Duration::from_secs(60), 4);
        assert!(!cache.insert("k".to_string(), response(b"too large")).await);
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn test_entries_expire_after_ttl() {
        let cache = ResponseCache::new(10, Duration::from_millis(50), 1024);
        cache.insert("k".to_string(), response(b"x")).await;
        tokio::time::sleep(Duration::from_millis(120)).await;
        cache.run_pending().await;
        assert!(cache.get("k").await.is_none());
    }

    #[test]
    fn test_disabled_config_builds_no_cache() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(ResponseCache::from_config(&config).is_none());
        assert!(ResponseCache::from_config(&CacheConfig::default()).is_some());
    }
}
