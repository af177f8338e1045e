//! Result cache over the durable store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::key::CacheKey;
use crate::observability::metrics;
use crate::store::{keys, StoreHandle};

/// Process-local cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Lookups that failed on the store. Also counted in `misses`.
    pub errors: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    fn new(hits: u64, misses: u64, errors: u64) -> Self {
        let lookups = hits + misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };
        Self {
            hits,
            misses,
            errors,
            hit_rate,
        }
    }
}

/// Caches serialized operation results under `cache:<namespace>:<keyHash>`.
///
/// Every failure is absorbed: a broken store looks like a cold cache to
/// callers, but is logged and counted separately.
pub struct ResultCache {
    namespace: String,
    default_ttl: Duration,
    store: StoreHandle,
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
}

impl ResultCache {
    pub fn new(namespace: impl Into<String>, default_ttl: Duration, store: StoreHandle) -> Self {
        Self {
            namespace: namespace.into(),
            default_ttl,
            store,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn storage_key(&self, key: &CacheKey) -> String {
        keys::cache_entry_key(&self.namespace, key.hash())
    }

    /// Look up a cached value. `None` is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let storage_key = self.storage_key(key);
        let bytes = match self.store.get(&storage_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(&self.namespace, "miss");
                return None;
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.errors.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(&self.namespace, "error");
                tracing::warn!(
                    namespace = %self.namespace,
                    store = self.store.backend(),
                    error = %e,
                    "Cache lookup failed, treating as miss"
                );
                return None;
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(&self.namespace, "hit");
                Some(value)
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                metrics::record_cache_lookup(&self.namespace, "corrupt");
                tracing::warn!(
                    namespace = %self.namespace,
                    key = %storage_key,
                    error = %e,
                    "Discarding undecodable cache entry"
                );
                self.store.submit_delete(storage_key);
                None
            }
        }
    }

    /// Store a value with the cache's default TTL.
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        self.set_with_ttl(key, value, self.default_ttl)
    }

    /// Store a value in the background. Failures are logged, never returned.
    pub fn set_with_ttl<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: Duration) {
        let bytes = match serde_json::to_vec(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(namespace = %self.namespace, error = %e, "Failed to encode cache value");
                return;
            }
        };
        self.store.submit_set(self.storage_key(key), bytes, ttl);
    }

    /// Remove one entry in the background.
    pub fn invalidate(&self, key: &CacheKey) {
        self.store.submit_delete(self.storage_key(key));
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::new(
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }

    /// Reset the counters and drop every entry in this namespace.
    ///
    /// Returns the number of entries removed (0 if the store is unreachable).
    pub async fn clear(&self) -> u64 {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);

        let prefix = keys::cache_namespace_prefix(&self.namespace);
        match self.store.delete_prefix(&prefix).await {
            Ok(removed) => {
                tracing::info!(namespace = %self.namespace, removed, "Cache cleared");
                removed
            }
            Err(e) => {
                tracing::warn!(
                    namespace = %self.namespace,
                    error = %e,
                    "Failed to clear cache entries, counters reset only"
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::UnavailableStore;
    use crate::store::DurableStore;
    use std::sync::Arc;

    fn cache(ttl: Duration) -> (ResultCache, StoreHandle, crate::store::MemoryStore) {
        let (handle, store) = StoreHandle::in_memory();
        (ResultCache::new("search", ttl, handle.clone()), handle, store)
    }

    #[tokio::test]
    async fn test_two_hits_after_set() {
        let (cache, handle, _) = cache(Duration::from_secs(60));
        let key = CacheKey::from_input("q1");

        cache.set(&key, &"result-A".to_string());
        handle.flush().await;

        assert_eq!(cache.get::<String>(&key).await.as_deref(), Some("result-A"));
        assert_eq!(cache.get::<String>(&key).await.as_deref(), Some("result-A"));

        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_rate, 1.0);
    }

    #[tokio::test]
    async fn test_entry_expires_after_ttl() {
        let (cache, handle, _) = cache(Duration::from_secs(60));
        let key = CacheKey::from_input("q1");

        cache.set_with_ttl(&key, &vec![0.25f32, 0.5], Duration::from_millis(30));
        handle.flush().await;
        assert_eq!(cache.get::<Vec<f32>>(&key).await, Some(vec![0.25, 0.5]));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.get::<Vec<f32>>(&key).await, None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_store_failure_is_a_distinct_miss() {
        let handle = StoreHandle::over(Arc::new(UnavailableStore));
        let cache = ResultCache::new("search", Duration::from_secs(60), handle.clone());
        let key = CacheKey::from_input("q1");

        cache.set(&key, &"value");
        handle.flush().await;
        assert_eq!(cache.get::<String>(&key).await, None);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.hits, 0);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_removed() {
        let (cache, handle, store) = cache(Duration::from_secs(60));
        let key = CacheKey::from_input("q1");
        let storage_key = keys::cache_entry_key("search", key.hash());
        store
            .set(&storage_key, b"\xff\x00".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get::<String>(&key).await, None);
        handle.flush().await;
        assert!(store.get(&storage_key).await.unwrap().is_none());
        assert_eq!(cache.stats().errors, 0);
    }

    #[tokio::test]
    async fn test_clear_only_touches_own_namespace() {
        let (handle, store) = StoreHandle::in_memory();
        let search = ResultCache::new("search", Duration::from_secs(60), handle.clone());
        let embeddings = ResultCache::new("embeddings", Duration::from_secs(60), handle.clone());
        let key = CacheKey::from_input("q1");

        search.set(&key, &1u32);
        embeddings.set(&key, &2u32);
        handle.flush().await;
        assert_eq!(search.get::<u32>(&key).await, Some(1));

        assert_eq!(search.clear().await, 1);
        assert_eq!(search.stats(), CacheStats::default());
        assert_eq!(search.get::<u32>(&key).await, None);
        assert_eq!(embeddings.get::<u32>(&key).await, Some(2));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_clear_spares_namespace_sharing_a_prefix() {
        let (handle, store) = StoreHandle::in_memory();
        let search = ResultCache::new("search", Duration::from_secs(60), handle.clone());
        let versioned = ResultCache::new("search:v2", Duration::from_secs(60), handle.clone());
        let key = CacheKey::from_input("q1");

        search.set(&key, &1u32);
        versioned.set(&key, &7u32);
        handle.flush().await;

        assert_eq!(search.clear().await, 1);
        assert_eq!(versioned.get::<u32>(&key).await, Some(7));
        assert_eq!(store.len(), 1);

        assert_eq!(versioned.clear().await, 1);
        assert!(store.is_empty());
    }
}
