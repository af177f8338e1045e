//! Durable key-value storage subsystem.
//!
//! # Data Flow
//! ```text
//! CircuitBreaker ──┐                      ┌──► DurableStore (memory.rs, or a networked store)
//! ResultCache ─────┼──► queue.rs ─────────┤
//! DedupTracker ────┘  (fire-and-forget)   └──► reads on the caller's path, bounded by a deadline
//! ```
//!
//! # Key Namespaces
//! - `circuit:<dependency>:state` owned by the circuit breakers
//! - `cache:<namespace>:<keyHash>` owned by the result caches
//! - `dedup:<eventId>` owned by the dedup tracker
//!
//! # Design Decisions
//! - The store is an interface; nothing in the core depends on a concrete backend
//! - Store failures never escape the public call paths, they only degrade memory
//! - Writes go through a bounded worker pool; saturation drops writes instead of queueing forever

pub mod handle;
pub mod keys;
pub mod memory;
pub mod queue;

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub use handle::StoreHandle;
pub use memory::MemoryStore;
pub use queue::{PersistJob, PersistenceQueue, QueueStats};

/// Errors raised by a [`DurableStore`] backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The operation did not complete before its deadline.
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),

    /// The backend reported a failure.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Key-value store with per-key expiration.
///
/// Implementations must support TTLs with at least millisecond resolution and
/// must make [`DurableStore::set_if_not_exists`] a single atomic operation.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Read a value. Expired keys read as absent.
    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Write a value with an expiration, replacing any previous value.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()>;

    /// Write a value only if the key is absent (or expired).
    ///
    /// Returns `true` if this call created the key.
    async fn set_if_not_exists(&self, key: &str, value: Vec<u8>, ttl: Duration)
        -> StoreResult<bool>;

    /// Remove a key. Returns `true` if a live key was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Remove every key starting with `prefix`. Returns the number removed.
    async fn delete_prefix(&self, prefix: &str) -> StoreResult<u64>;
}

/// Run a store operation with a deadline.
pub async fn with_deadline<T, F>(limit: Duration, operation: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// Wall-clock milliseconds since the unix epoch.
pub(crate) fn unix_millis_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
pub(crate) mod testing {
    //! Store doubles for unit tests.

    use super::*;

    /// A store whose every operation fails.
    pub struct UnavailableStore;

    #[async_trait]
    impl DurableStore for UnavailableStore {
        fn name(&self) -> &'static str {
            "unavailable"
        }

        async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> StoreResult<()> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn set_if_not_exists(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Duration,
        ) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn delete(&self, _key: &str) -> StoreResult<bool> {
            Err(StoreError::Unavailable("connection refused".into()))
        }

        async fn delete_prefix(&self, _prefix: &str) -> StoreResult<u64> {
            Err(StoreError::Unavailable("connection refused".into()))
        }
    }

    /// A store that never answers.
    pub struct HangingStore;

    #[async_trait]
    impl DurableStore for HangingStore {
        fn name(&self) -> &'static str {
            "hanging"
        }

        async fn get(&self, _key: &str) -> StoreResult<Option<Vec<u8>>> {
            std::future::pending().await
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> StoreResult<()> {
            std::future::pending().await
        }

        async fn set_if_not_exists(
            &self,
            _key: &str,
            _value: Vec<u8>,
            _ttl: Duration,
        ) -> StoreResult<bool> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> StoreResult<bool> {
            std::future::pending().await
        }

        async fn delete_prefix(&self, _prefix: &str) -> StoreResult<u64> {
            std::future::pending().await
        }
    }
}
