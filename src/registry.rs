//! Composition root for the resilience core.
//!
//! # Responsibilities
//! - Own one breaker per dependency, one cache per namespace, and the dedup tracker
//! - Resolve per-dependency configuration (breaker, retry, attempt timeout)
//! - Hand out [`ProtectedCaller`]s that share this state
//! - Report health for the admin surface
//!
//! # Design Decisions
//! - Built once at startup and passed by `Arc`; there are no process-wide globals
//! - Breakers and caches are created lazily on first use

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

use crate::cache::{CacheStats, ResultCache};
use crate::caller::ProtectedCaller;
use crate::config::CoreConfig;
use crate::dedup::{DedupStats, DedupTracker};
use crate::resilience::{BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState, RetryPolicy};
use crate::store::{DurableStore, PersistenceQueue, QueueStats, StoreHandle};

/// Health report served by `GET /admin/status`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub store_backend: &'static str,
    pub open_circuits: usize,
    pub breakers: Vec<BreakerSnapshot>,
    pub caches: BTreeMap<String, CacheStats>,
    pub dedup: DedupStats,
    pub persistence: QueueStats,
}

pub struct ResilienceRegistry {
    config: CoreConfig,
    store: StoreHandle,
    breakers: BreakerRegistry,
    caches: DashMap<String, Arc<ResultCache>>,
    dedup: Arc<DedupTracker>,
}

impl ResilienceRegistry {
    pub fn new(config: CoreConfig, store: StoreHandle) -> Self {
        let breakers = BreakerRegistry::new(&config, store.clone());
        let dedup = Arc::new(DedupTracker::new(store.clone(), &config.dedup));
        Self {
            config,
            store,
            breakers,
            caches: DashMap::new(),
            dedup,
        }
    }

    /// Start a persistence queue over `store` and build the registry on it.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn with_store(config: CoreConfig, store: Arc<dyn DurableStore>) -> Self {
        let timeout = config.store.operation_timeout();
        let queue = PersistenceQueue::start(store.clone(), &config.persistence, timeout);
        Self::new(config, StoreHandle::new(store, queue, timeout))
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    pub fn breaker(&self, dependency: &str) -> Arc<CircuitBreaker> {
        self.breakers.get(dependency)
    }

    pub fn retry_policy(&self, dependency: &str) -> RetryPolicy {
        RetryPolicy::from(self.config.retry_for(dependency))
    }

    pub fn attempt_timeout(&self, dependency: &str) -> Option<Duration> {
        self.config.retry_for(dependency).attempt_timeout()
    }

    /// The cache for `namespace`, created on first use.
    pub fn cache(&self, namespace: &str) -> Arc<ResultCache> {
        if let Some(existing) = self.caches.get(namespace) {
            return existing.clone();
        }
        self.caches
            .entry(namespace.to_string())
            .or_insert_with(|| {
                Arc::new(ResultCache::new(
                    namespace,
                    self.config.cache.ttl_for(namespace),
                    self.store.clone(),
                ))
            })
            .clone()
    }

    pub fn find_cache(&self, namespace: &str) -> Option<Arc<ResultCache>> {
        self.caches.get(namespace).map(|c| c.clone())
    }

    pub fn dedup(&self) -> &Arc<DedupTracker> {
        &self.dedup
    }

    pub fn caller(self: &Arc<Self>) -> ProtectedCaller {
        ProtectedCaller::new(self.clone())
    }

    pub fn cache_stats(&self) -> BTreeMap<String, CacheStats> {
        self.caches
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    /// Force a breaker CLOSED. Breakers named in the configuration are
    /// created if needed; unknown names return `false`.
    pub async fn reset_breaker(&self, dependency: &str) -> bool {
        let breaker = match self.breakers.find(dependency) {
            Some(breaker) => breaker,
            None if self.config.dependencies.contains_key(dependency) => {
                self.breakers.get(dependency)
            }
            None => return false,
        };
        breaker.reset().await;
        true
    }

    /// Clear a cache namespace. Returns the number of entries removed, or
    /// `None` if the namespace has never been used.
    pub async fn clear_cache(&self, namespace: &str) -> Option<u64> {
        let cache = self.find_cache(namespace)?;
        Some(cache.clear().await)
    }

    pub fn health(&self) -> HealthSnapshot {
        let breakers = self.breakers.snapshots();
        let open_circuits = breakers
            .iter()
            .filter(|b| b.state != CircuitState::Closed)
            .count();

        HealthSnapshot {
            store_backend: self.store.backend(),
            open_circuits,
            breakers,
            caches: self.cache_stats(),
            dedup: self.dedup.stats(),
            persistence: self.store.queue().stats(),
        }
    }

    /// Wait for queued store writes to land.
    pub async fn flush(&self) {
        self.store.flush().await
    }
}
