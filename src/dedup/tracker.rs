//! At-most-once gate for at-least-once delivered events.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::DedupConfig;
use crate::observability::metrics;
use crate::store::{keys, unix_millis_now, StoreError, StoreHandle};

/// Result of trying to claim an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    /// First delivery seen; this caller owns processing.
    Claimed,
    /// Already claimed within the TTL window; skip it.
    Duplicate,
    /// The claim could not be checked; processing anyway (fail open).
    Unverified,
    /// The claim could not be checked; skipping (fail closed).
    Rejected,
}

impl DedupOutcome {
    pub fn should_process(&self) -> bool {
        matches!(self, DedupOutcome::Claimed | DedupOutcome::Unverified)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DedupOutcome::Claimed => "claimed",
            DedupOutcome::Duplicate => "duplicate",
            DedupOutcome::Unverified => "unverified",
            DedupOutcome::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStatus {
    Claimed,
    Completed,
}

/// Marker stored under `dedup:<eventId>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub status: DedupStatus,
    pub claimed_at_ms: u64,
    pub claim_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
}

impl DedupRecord {
    fn claimed() -> Self {
        Self {
            status: DedupStatus::Claimed,
            claimed_at_ms: unix_millis_now(),
            claim_id: Uuid::new_v4(),
            completed_at_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DedupStats {
    pub claimed: u64,
    pub duplicates: u64,
    pub unverified: u64,
    pub rejected: u64,
    pub completed: u64,
}

/// Tracks processed event ids in the durable store.
///
/// The claim is a single `set_if_not_exists`, so two concurrent deliveries
/// of one event can never both be told to process it.
pub struct DedupTracker {
    store: StoreHandle,
    ttl: Duration,
    fail_open: bool,
    claimed: AtomicU64,
    duplicates: AtomicU64,
    unverified: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
}

impl DedupTracker {
    pub fn new(store: StoreHandle, config: &DedupConfig) -> Self {
        Self {
            store,
            ttl: config.ttl(),
            fail_open: config.fail_open,
            claimed: AtomicU64::new(0),
            duplicates: AtomicU64::new(0),
            unverified: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            completed: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Atomically check and mark `event_id`.
    pub async fn claim(&self, event_id: &str) -> DedupOutcome {
        let outcome = self.try_claim(event_id).await;
        let counter = match outcome {
            DedupOutcome::Claimed => &self.claimed,
            DedupOutcome::Duplicate => &self.duplicates,
            DedupOutcome::Unverified => &self.unverified,
            DedupOutcome::Rejected => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        metrics::record_dedup_outcome(outcome.as_str());
        outcome
    }

    async fn try_claim(&self, event_id: &str) -> DedupOutcome {
        if event_id.is_empty() {
            tracing::warn!("Event has no id, processing without deduplication");
            return DedupOutcome::Unverified;
        }

        let marker = match serde_json::to_vec(&DedupRecord::claimed()) {
            Ok(marker) => marker,
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "Failed to encode dedup marker");
                return self.unverifiable(event_id);
            }
        };

        match self
            .store
            .set_if_not_exists(&keys::dedup_key(event_id), marker, self.ttl)
            .await
        {
            Ok(true) => DedupOutcome::Claimed,
            Ok(false) => {
                tracing::debug!(event_id = %event_id, "Duplicate event skipped");
                DedupOutcome::Duplicate
            }
            Err(e) => {
                tracing::warn!(
                    event_id = %event_id,
                    store = self.store.backend(),
                    error = %e,
                    fail_open = self.fail_open,
                    "Dedup store unavailable"
                );
                self.unverifiable(event_id)
            }
        }
    }

    fn unverifiable(&self, event_id: &str) -> DedupOutcome {
        if self.fail_open {
            tracing::warn!(event_id = %event_id, "Processing event without dedup guarantee");
            DedupOutcome::Unverified
        } else {
            tracing::warn!(event_id = %event_id, "Skipping event, dedup could not be verified");
            DedupOutcome::Rejected
        }
    }

    /// `true` if the caller should process the event.
    pub async fn should_process(&self, event_id: &str) -> bool {
        self.claim(event_id).await.should_process()
    }

    /// Record that processing finished. The marker gets a fresh TTL.
    ///
    /// Returns `false` if the write could not be queued.
    pub async fn mark_complete(&self, event_id: &str) -> bool {
        if event_id.is_empty() {
            return false;
        }

        let mut record = match self.read_marker(event_id).await {
            Ok(Some(record)) => record,
            Ok(None) => DedupRecord::claimed(),
            Err(e) => {
                tracing::warn!(
                    event_id = %event_id,
                    error = %e,
                    "Dedup marker unreadable, leaving it as claimed"
                );
                return false;
            }
        };
        record.status = DedupStatus::Completed;
        record.completed_at_ms = Some(unix_millis_now());

        let bytes = match serde_json::to_vec(&record) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "Failed to encode dedup marker");
                return false;
            }
        };

        self.completed.fetch_add(1, Ordering::Relaxed);
        self.store
            .submit_set(keys::dedup_key(event_id), bytes, self.ttl)
    }

    /// Read the marker for `event_id`, if any.
    pub async fn status(&self, event_id: &str) -> Option<DedupRecord> {
        match self.read_marker(event_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "Failed to read dedup marker");
                None
            }
        }
    }

    /// An undecodable marker reads as absent; a store failure is an error.
    async fn read_marker(&self, event_id: &str) -> Result<Option<DedupRecord>, StoreError> {
        let Some(bytes) = self.store.get(&keys::dedup_key(event_id)).await? else {
            return Ok(None);
        };
        match serde_json::from_slice(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "Undecodable dedup marker");
                Ok(None)
            }
        }
    }

    /// Claim `event_id`, run `handler` if this caller owns it, and mark the
    /// event complete when the handler succeeds.
    ///
    /// Returns `Ok(None)` when the event was skipped. A failed handler leaves
    /// the event claimed until the TTL lapses; redelivery is the transport's job.
    pub async fn process_once<T, E, F, Fut>(&self, event_id: &str, handler: F) -> Result<Option<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let outcome = self.claim(event_id).await;
        if !outcome.should_process() {
            return Ok(None);
        }

        let value = handler().await?;
        if outcome == DedupOutcome::Claimed {
            self.mark_complete(event_id).await;
        }
        Ok(Some(value))
    }

    pub fn stats(&self) -> DedupStats {
        DedupStats {
            claimed: self.claimed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
            unverified: self.unverified.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
        }
    }
}
