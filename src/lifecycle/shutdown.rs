//! Shutdown coordination for the core.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::registry::ResilienceRegistry;
use crate::store::MemoryStore;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
/// Clones share the same signal.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::AcqRel) {
            tracing::info!("Shutdown triggered");
        }
        let _ = self.tx.send(());
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Resolve once shutdown has been triggered, even if that happened
    /// before this call.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Number of tasks still subscribed.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Flush queued store writes, then snapshot the in-memory store.
///
/// Writes still pending after `deadline` are abandoned.
pub async fn drain(registry: &ResilienceRegistry, memory: Option<&MemoryStore>, deadline: Duration) {
    if tokio::time::timeout(deadline, registry.flush()).await.is_err() {
        let stats = registry.store().queue().stats();
        tracing::warn!(pending = stats.pending, "Persistence queue did not drain before deadline");
    }

    if let Some(memory) = memory {
        if let Err(e) = memory.save_snapshot() {
            tracing::error!(error = %e, "Failed to write store snapshot");
        }
    }
}
