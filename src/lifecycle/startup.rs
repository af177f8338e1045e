//! Startup orchestration.
//!
//! # Responsibilities
//! - Open the durable store (restoring its snapshot when configured)
//! - Start the persistence queue and the expiry sweeper
//! - Build the registry every caller shares
//!
//! # Design Decisions
//! - Fail fast: an unreadable snapshot is fatal rather than silently discarded
//! - The admin listener starts last, after the registry exists

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;

use crate::config::CoreConfig;
use crate::lifecycle::Shutdown;
use crate::registry::ResilienceRegistry;
use crate::store::MemoryStore;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to load store snapshot {}: {source}", .path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Everything `main` needs to run and later shut down the core.
pub struct CoreRuntime {
    pub registry: Arc<ResilienceRegistry>,
    pub memory: MemoryStore,
    pub shutdown: Shutdown,
    sweeper: JoinHandle<()>,
}

impl CoreRuntime {
    /// Stop the sweeper, flush pending writes and save the snapshot.
    pub async fn shutdown(self, deadline: Duration) {
        self.shutdown.trigger();
        let _ = self.sweeper.await;
        crate::lifecycle::shutdown::drain(&self.registry, Some(&self.memory), deadline).await;
    }
}

/// Build the core from validated configuration. Must run inside a Tokio runtime.
pub fn start(config: CoreConfig) -> Result<CoreRuntime, StartupError> {
    let memory = match &config.store.snapshot_path {
        Some(path) => MemoryStore::load_snapshot(path).map_err(|source| StartupError::Snapshot {
            path: PathBuf::from(path),
            source,
        })?,
        None => MemoryStore::new(),
    };

    let shutdown = Shutdown::new();
    let sweeper = spawn_sweeper(
        memory.clone(),
        Duration::from_secs(config.store.sweep_interval_secs.max(1)),
        shutdown.clone(),
    );

    tracing::info!(
        store = "memory",
        entries = memory.len(),
        persistence_workers = config.persistence.workers,
        dependencies = config.dependencies.len(),
        "Resilience core starting"
    );

    let registry = Arc::new(ResilienceRegistry::with_store(config, Arc::new(memory.clone())));

    Ok(CoreRuntime {
        registry,
        memory,
        shutdown,
        sweeper,
    })
}

fn spawn_sweeper(memory: MemoryStore, every: Duration, shutdown: Shutdown) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = memory.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, remaining = memory.len(), "Purged expired store entries");
                    }
                }
                _ = shutdown.wait() => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_snapshot_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CoreConfig::default();
        config.breaker.failure_threshold = 1;
        config.store.snapshot_path = Some(dir.path().join("store.json").display().to_string());

        let runtime = start(config.clone()).unwrap();
        runtime.registry.breaker("llm").record_failure().await;
        assert!(runtime.registry.dedup().should_process("evt-1").await);
        runtime.shutdown(Duration::from_secs(1)).await;

        let runtime = start(config).unwrap();
        assert!(!runtime.registry.breaker("llm").allow().await);
        assert!(!runtime.registry.dedup().should_process("evt-1").await);
        runtime.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        let mut config = CoreConfig::default();
        config.store.snapshot_path = Some(path.display().to_string());
        assert!(matches!(start(config), Err(StartupError::Snapshot { .. })));
    }
}
