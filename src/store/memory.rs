//! In-process store with per-key expiry and optional snapshot persistence.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::store::{unix_millis_now, DurableStore, StoreResult};

#[derive(Debug, Clone)]
struct StoredValue {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Ceiling for a single entry's lifetime. Longer TTLs are clamped to it.
pub const MAX_ENTRY_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `now + ttl`, clamped so an oversized TTL cannot overflow the clock.
fn expiry_after(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl.min(MAX_ENTRY_TTL))
        .or_else(|| now.checked_add(Duration::from_secs(365 * 24 * 60 * 60)))
        .unwrap_or(now)
}

impl StoredValue {
    fn new(value: Vec<u8>, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: expiry_after(Instant::now(), ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// On-disk form of one entry. Expiry is wall-clock so it survives a restart.
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    /// Hex-encoded value bytes.
    value: String,
    /// Expiry timestamp (milliseconds since epoch).
    expires_at_ms: u64,
}

/// A thread-safe in-memory [`DurableStore`].
///
/// Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, StoredValue>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty store without snapshot persistence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that saves to `path` on [`MemoryStore::save_snapshot`].
    pub fn with_snapshot_path(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            snapshot_path: Some(path.into()),
        }
    }

    /// Load from a snapshot file if it exists. Expired entries are skipped.
    pub fn load_snapshot(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let store = Self::with_snapshot_path(path);
        if !path.exists() {
            return Ok(store);
        }

        let reader = BufReader::new(File::open(path)?);
        let map: HashMap<String, SnapshotEntry> = serde_json::from_reader(reader)?;

        let now_ms = unix_millis_now();
        let now = Instant::now();
        let mut skipped = 0usize;
        for (key, entry) in map {
            if entry.expires_at_ms <= now_ms {
                skipped += 1;
                continue;
            }
            let value = match hex::decode(&entry.value) {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Skipping undecodable snapshot entry");
                    skipped += 1;
                    continue;
                }
            };
            let remaining = Duration::from_millis(entry.expires_at_ms - now_ms);
            store.inner.insert(
                key,
                StoredValue {
                    value,
                    expires_at: expiry_after(now, remaining),
                },
            );
        }

        tracing::info!(
            path = %path.display(),
            loaded = store.inner.len(),
            skipped,
            "Loaded store snapshot"
        );
        Ok(store)
    }

    /// Save live entries to the snapshot file. Returns the number written.
    pub fn save_snapshot(&self) -> std::io::Result<usize> {
        let Some(path) = &self.snapshot_path else {
            return Ok(0);
        };

        let now = Instant::now();
        let now_ms = unix_millis_now();
        let map: HashMap<String, SnapshotEntry> = self
            .inner
            .iter()
            .filter(|r| r.value().is_live(now))
            .map(|r| {
                let remaining = r.value().expires_at.saturating_duration_since(now);
                (
                    r.key().clone(),
                    SnapshotEntry {
                        value: hex::encode(&r.value().value),
                        expires_at_ms: now_ms.saturating_add(
                            u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
                        ),
                    },
                )
            })
            .collect();

        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(writer, &map)?;
        tracing::info!(path = %path.display(), entries = map.len(), "Saved store snapshot");
        Ok(map.len())
    }

    /// Drop every expired entry. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, v| v.is_live(now));
        before.saturating_sub(self.inner.len())
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        let now = Instant::now();
        let expired = match self.inner.get(key) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.inner.remove_if(key, |_, v| !v.is_live(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> StoreResult<()> {
        self.inner.insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn set_if_not_exists(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> StoreResult<bool> {
        let now = Instant::now();
        match self.inner.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if occupied.get().is_live(now) {
                    Ok(false)
                } else {
                    occupied.insert(StoredValue::new(value, ttl));
                    Ok(true)
                }
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, ttl));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        Ok(self
            .inner
            .remove(key)
            .map(|(_, v)| v.is_live(now))
            .unwrap_or(false))
    }

    async fn delete_prefix(&self, prefix: &str) -> StoreResult<u64> {
        let mut removed = 0u64;
        self.inner.retain(|k, _| {
            if k.starts_with(prefix) {
                removed += 1;
                false
            } else {
                true
            }
        });
        Ok(removed)
    }
}
