//! Bounded background writer for fire-and-forget persistence.
//!
//! # Responsibilities
//! - Accept writes from the call path without blocking it
//! - Apply them on a fixed pool of worker tasks
//! - Drop (and count) writes when the queue is saturated
//!
//! # Design Decisions
//! - `submit` is synchronous and never awaits
//! - A failed write is logged and counted, never retried
//! - Writes to one key stay ordered (one worker owns each key)
//! - `idle()` lets shutdown and tests wait for accepted writes to land

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Notify};

use crate::config::PersistenceConfig;
use crate::observability::metrics;
use crate::store::{with_deadline, DurableStore};

/// A single background write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistJob {
    /// Write `value` under `key` with an expiration.
    Set {
        key: String,
        value: Vec<u8>,
        ttl: Duration,
    },
    /// Remove `key`.
    Delete { key: String },
}

impl PersistJob {
    /// Key the job touches.
    pub fn key(&self) -> &str {
        match self {
            PersistJob::Set { key, .. } | PersistJob::Delete { key } => key,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            PersistJob::Set { .. } => "set",
            PersistJob::Delete { .. } => "delete",
        }
    }
}

/// Counters exposed on the admin surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub submitted: u64,
    pub applied: u64,
    pub failed: u64,
    pub dropped: u64,
    pub pending: usize,
}

#[derive(Default)]
struct QueueShared {
    pending: AtomicUsize,
    idle: Notify,
    submitted: AtomicU64,
    applied: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl QueueShared {
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Handle to the persistence worker pool. Cloning shares the pool.
///
/// Jobs are sharded by key, so writes to the same key apply in submission order.
#[derive(Clone)]
pub struct PersistenceQueue {
    shards: Arc<[mpsc::Sender<PersistJob>]>,
    shared: Arc<QueueShared>,
}

impl PersistenceQueue {
    /// Spawn the worker pool. Must be called inside a Tokio runtime.
    ///
    /// Workers exit once every handle to the queue has been dropped.
    pub fn start(
        store: Arc<dyn DurableStore>,
        config: &PersistenceConfig,
        write_timeout: Duration,
    ) -> Self {
        let workers = config.workers.max(1);
        let per_shard = config.queue_capacity.max(1).div_ceil(workers);
        let shared = Arc::new(QueueShared::default());

        let mut shards = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let (tx, mut rx) = mpsc::channel::<PersistJob>(per_shard);
            shards.push(tx);

            let store = store.clone();
            let shared = shared.clone();
            tokio::spawn(async move {
                while let Some(job) = rx.recv().await {
                    apply(store.as_ref(), &shared, job, write_timeout).await;
                }
                tracing::debug!(worker_id, "Persistence worker stopped");
            });
        }

        tracing::info!(
            workers,
            capacity_per_worker = per_shard,
            "Persistence queue started"
        );

        Self {
            shards: shards.into(),
            shared,
        }
    }

    fn shard_for(&self, key: &str) -> &mpsc::Sender<PersistJob> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    /// Hand a write to the pool. Returns `false` if it was dropped.
    pub fn submit(&self, job: PersistJob) -> bool {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        match self.shard_for(job.key()).try_send(job) {
            Ok(()) => {
                self.shared.submitted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(job)) => {
                self.reject(&job, "queue saturated");
                false
            }
            Err(TrySendError::Closed(job)) => {
                self.reject(&job, "queue closed");
                false
            }
        }
    }

    fn reject(&self, job: &PersistJob, reason: &'static str) {
        self.shared.dropped.fetch_add(1, Ordering::Relaxed);
        self.shared.finish_one();
        metrics::record_persistence(job.kind(), "dropped");
        tracing::warn!(key = %job.key(), kind = job.kind(), reason, "Dropping background store write");
    }

    /// Wait until every accepted write has been applied or has failed.
    pub async fn idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Snapshot of the queue counters.
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            applied: self.shared.applied.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            pending: self.shared.pending.load(Ordering::Acquire),
        }
    }
}

async fn apply(store: &dyn DurableStore, shared: &QueueShared, job: PersistJob, limit: Duration) {
    let kind = job.kind();
    let result = match &job {
        PersistJob::Set { key, value, ttl } => {
            with_deadline(limit, store.set(key, value.clone(), *ttl)).await
        }
        PersistJob::Delete { key } => with_deadline(limit, store.delete(key)).await.map(|_| ()),
    };

    match result {
        Ok(()) => {
            shared.applied.fetch_add(1, Ordering::Relaxed);
            metrics::record_persistence(kind, "applied");
        }
        Err(e) => {
            shared.failed.fetch_add(1, Ordering::Relaxed);
            metrics::record_persistence(kind, "failed");
            tracing::warn!(
                store = store.name(),
                key = %job.key(),
                kind,
                error = %e,
                "Background store write failed"
            );
        }
    }
    shared.finish_one();
}
