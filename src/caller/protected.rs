//! The public call path.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::{CacheKey, ResultCache};
use crate::caller::CallError;
use crate::registry::ResilienceRegistry;
use crate::resilience::run_with_retry;

/// Wraps caller-supplied operations with caching, circuit breaking and retry.
///
/// Cheap to clone; every clone shares the registry's breakers and caches.
#[derive(Clone)]
pub struct ProtectedCaller {
    registry: Arc<ResilienceRegistry>,
    cache: Option<Arc<ResultCache>>,
}

impl ProtectedCaller {
    pub fn new(registry: Arc<ResilienceRegistry>) -> Self {
        Self {
            registry,
            cache: None,
        }
    }

    /// Use `cache` for every cached call instead of the per-dependency cache.
    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn registry(&self) -> &Arc<ResilienceRegistry> {
        &self.registry
    }

    fn cache_for(&self, dependency: &str) -> Arc<ResultCache> {
        match &self.cache {
            Some(cache) => cache.clone(),
            None => self.registry.cache(dependency),
        }
    }

    /// Run `operation` against `dependency` with breaker gating and retry.
    pub async fn call<T, E, F, Fut>(&self, dependency: &str, operation: F) -> Result<T, CallError<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let breaker = self.registry.breaker(dependency);
        let policy = self.registry.retry_policy(dependency);
        let attempt_timeout = self.registry.attempt_timeout(dependency);
        run_with_retry(&breaker, &policy, attempt_timeout, operation).await
    }

    /// Like [`call`](Self::call), answering from the cache when `key` hits
    /// and populating it on success.
    pub async fn call_cached<T, E, F, Fut>(
        &self,
        dependency: &str,
        key: &CacheKey,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.call_with(dependency, Some(key), operation).await
    }

    /// Full call path with an optional cache key.
    pub async fn call_with<T, E, F, Fut>(
        &self,
        dependency: &str,
        key: Option<&CacheKey>,
        operation: F,
    ) -> Result<T, CallError<E>>
    where
        T: Serialize + DeserializeOwned,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(key) = key else {
            return self.call(dependency, operation).await;
        };

        let cache = self.cache_for(dependency);
        if let Some(hit) = cache.get::<T>(key).await {
            tracing::debug!(dependency = %dependency, namespace = %cache.namespace(), "Cache hit");
            return Ok(hit);
        }

        let value = self.call(dependency, operation).await?;
        cache.set(key, &value);
        Ok(value)
    }
}
