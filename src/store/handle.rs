//! Shared access to the store for the core's components.

use std::sync::Arc;
use std::time::Duration;

use crate::store::{with_deadline, DurableStore, PersistJob, PersistenceQueue, StoreResult};

/// The store, its background writer, and the read deadline, bundled.
///
/// Reads run on the caller's path under the deadline. Writes are handed to
/// the [`PersistenceQueue`] and never awaited.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn DurableStore>,
    queue: PersistenceQueue,
    operation_timeout: Duration,
}

impl StoreHandle {
    pub fn new(
        store: Arc<dyn DurableStore>,
        queue: PersistenceQueue,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            operation_timeout,
        }
    }

    /// Backend name for logs.
    pub fn backend(&self) -> &'static str {
        self.store.name()
    }

    pub fn store(&self) -> &Arc<dyn DurableStore> {
        &self.store
    }

    pub fn queue(&self) -> &PersistenceQueue {
        &self.queue
    }

    pub async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        with_deadline(self.operation_timeout, self.store.get(key)).await
    }

    pub async fn set_if_not_exists(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> StoreResult<bool> {
        with_deadline(
            self.operation_timeout,
            self.store.set_if_not_exists(key, value, ttl),
        )
        .await
    }

    pub async fn delete_prefix(&self, prefix: &str) -> StoreResult<u64> {
        with_deadline(self.operation_timeout, self.store.delete_prefix(prefix)).await
    }

    /// Queue a write. Returns `false` if the queue dropped it.
    pub fn submit_set(&self, key: String, value: Vec<u8>, ttl: Duration) -> bool {
        self.queue.submit(PersistJob::Set { key, value, ttl })
    }

    /// Queue a delete. Returns `false` if the queue dropped it.
    pub fn submit_delete(&self, key: String) -> bool {
        self.queue.submit(PersistJob::Delete { key })
    }

    /// Wait for queued writes to land.
    pub async fn flush(&self) {
        self.queue.idle().await
    }
}

#[cfg(test)]
impl StoreHandle {
    /// Handle over a fresh in-memory store, for unit tests.
    pub(crate) fn in_memory() -> (Self, crate::store::MemoryStore) {
        let store = crate::store::MemoryStore::new();
        (Self::over(Arc::new(store.clone())), store)
    }

    /// Handle over any store with small test settings.
    pub(crate) fn over(store: Arc<dyn DurableStore>) -> Self {
        let config = crate::config::PersistenceConfig {
            workers: 2,
            queue_capacity: 64,
        };
        let queue = PersistenceQueue::start(store.clone(), &config, Duration::from_millis(200));
        Self::new(store, queue, Duration::from_millis(200))
    }
}
