//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use resilience_core::config::CoreConfig;
use resilience_core::store::{DurableStore, MemoryStore, StoreError, StoreResult};
use resilience_core::ResilienceRegistry;

const UP: u8 = 0;
const DOWN: u8 = 1;
const HANGING: u8 = 2;

/// A memory store whose availability can be switched at runtime.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    mode: AtomicU8,
    calls: AtomicU64,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn go_down(&self) {
        self.mode.store(DOWN, Ordering::SeqCst);
    }

    pub fn hang(&self) {
        self.mode.store(HANGING, Ordering::SeqCst);
    }

    pub fn recover(&self) {
        self.mode.store(UP, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.inner
    }

    async fn gate(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.mode.load(Ordering::SeqCst) {
            DOWN => Err(StoreError::Unavailable("injected outage".into())),
            HANGING => std::future::pending().await,
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl DurableStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.gate().await?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        self.gate().await?;
        self.inner.set(key, value, ttl).await
    }

    async fn set_if_not_exists(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<bool> {
        self.gate().await?;
        self.inner.set_if_not_exists(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.gate().await?;
        self.inner.delete(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> StoreResult<u64> {
        self.gate().await?;
        self.inner.delete_prefix(prefix).await
    }
}

/// Configuration with short delays so tests run quickly.
pub fn fast_config() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.store.operation_timeout_ms = 50;
    config.persistence.workers = 2;
    config.persistence.queue_capacity = 256;
    config.breaker.failure_threshold = 5;
    config.breaker.recovery_timeout_ms = 100;
    config.retry.max_attempts = 1;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 5;
    config.retry.jitter_fraction = 0.0;
    config
}

pub fn registry_over(store: Arc<dyn DurableStore>, config: CoreConfig) -> Arc<ResilienceRegistry> {
    Arc::new(ResilienceRegistry::with_store(config, store))
}
