//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: dependency assumed down, calls fail fast
//! - Half-Open: a probe call is testing whether the dependency recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= threshold after a failure
//! Open → Half-Open: first admission check after the recovery timeout (lazy, no timer)
//! Half-Open → Closed: probe call succeeds
//! Half-Open → Open: probe call fails
//! ```
//!
//! # Design Decisions
//! - Per-dependency circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - At most `half_open_max_probes` probes in flight; other callers are rejected
//! - State is persisted in the background and restored lazily on first use
//! - Store failures degrade cross-restart memory only, never admission decisions

use std::fmt;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::config::BreakerConfig;
use crate::observability::metrics;
use crate::store::{keys, unix_millis_now, StoreHandle};

/// Breaker state as seen by callers and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored form of a breaker under `circuit:<dependency>:state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedBreakerState {
    pub state: CircuitState,
    pub failure_count: u32,
    /// Wall-clock unix milliseconds at which the circuit opened.
    #[serde(default)]
    pub opened_at_ms: Option<u64>,
    #[serde(default)]
    pub half_open_attempts: u32,
}

/// Point-in-time view of one breaker, for the admin surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub half_open_attempts: u32,
    /// How long the circuit has been open, if it is.
    pub opened_for_ms: Option<u64>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    /// Probe slots currently held while half-open.
    half_open_attempts: u32,
    /// Bumped every time a fresh half-open window starts, so a stale permit
    /// cannot release a slot it does not own.
    half_open_epoch: u64,
    last_probe_at: Option<Instant>,
}

impl Default for BreakerInner {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            failure_count: 0,
            opened_at: None,
            half_open_attempts: 0,
            half_open_epoch: 0,
            last_probe_at: None,
        }
    }
}

enum Admission {
    Rejected,
    Pass,
    Probe(u64),
}

/// Where a recorded outcome came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reporter {
    /// `record_success` / `record_failure` after `allow`.
    Caller,
    /// A permit admitted while the circuit was closed.
    Pass,
    /// A half-open probe permit from the given window.
    Probe(u64),
}

/// Per-dependency circuit breaker backed by the durable store.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    store: StoreHandle,
    inner: Mutex<BreakerInner>,
    loaded: OnceCell<()>,
}

impl CircuitBreaker {
    /// Create a breaker in the CLOSED state.
    ///
    /// Persisted state is read lazily on the first admission or outcome.
    pub fn new(name: impl Into<String>, config: BreakerConfig, store: StoreHandle) -> Self {
        Self {
            name: name.into(),
            config,
            store,
            inner: Mutex::new(BreakerInner::default()),
            loaded: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current in-memory state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.lock().failure_count
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            half_open_attempts: inner.half_open_attempts,
            opened_for_ms: inner
                .opened_at
                .map(|at| at.elapsed().as_millis() as u64),
        }
    }

    /// Whether a call may proceed.
    ///
    /// A `true` answer while half-open holds a probe slot until
    /// [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure) is called. Prefer
    /// [`acquire`](Self::acquire), which releases the slot on drop.
    pub async fn allow(&self) -> bool {
        match self.acquire().await {
            Some(permit) => {
                permit.detach();
                true
            }
            None => false,
        }
    }

    /// Ask for permission to make one call.
    ///
    /// Returns `None` when the circuit rejects the call.
    pub async fn acquire(&self) -> Option<CallPermit<'_>> {
        self.ensure_loaded().await;

        let admission = {
            let mut inner = self.inner.lock();
            self.admit(&mut inner, Instant::now())
        };

        match admission {
            Admission::Rejected => {
                metrics::record_breaker_rejection(&self.name);
                tracing::debug!(dependency = %self.name, "Circuit open, rejecting call");
                None
            }
            Admission::Pass => Some(CallPermit {
                breaker: self,
                probe_epoch: None,
                settled: false,
            }),
            Admission::Probe(epoch) => Some(CallPermit {
                breaker: self,
                probe_epoch: Some(epoch),
                settled: false,
            }),
        }
    }

    /// Record a successful call.
    pub async fn record_success(&self) {
        self.ensure_loaded().await;
        self.on_success(Reporter::Caller);
    }

    /// Record a failed call.
    pub async fn record_failure(&self) {
        self.ensure_loaded().await;
        self.on_failure(Reporter::Caller);
    }

    /// Force the circuit CLOSED and clear its counters.
    pub async fn reset(&self) {
        self.ensure_loaded().await;
        let mut inner = self.inner.lock();
        let previous = inner.state;
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
        inner.half_open_attempts = 0;
        inner.half_open_epoch += 1;
        inner.last_probe_at = None;

        if previous != CircuitState::Closed {
            self.log_transition(previous, CircuitState::Closed);
        }
        tracing::info!(dependency = %self.name, "Circuit breaker reset");
        self.persist(&inner);
    }

    /// Force the circuit OPEN, starting a fresh recovery timeout.
    pub async fn force_open(&self) {
        self.ensure_loaded().await;
        let mut inner = self.inner.lock();
        let previous = inner.state;
        self.open(&mut inner, Instant::now());
        if previous != CircuitState::Open {
            self.log_transition(previous, CircuitState::Open);
        }
        tracing::warn!(dependency = %self.name, "Circuit breaker forced open");
        self.persist(&inner);
    }

    /// Re-read persisted state from the store.
    ///
    /// Returns `true` if a persisted state was restored. A missing, corrupt,
    /// or unreadable entry leaves the in-memory state untouched.
    pub async fn load_from_store(&self) -> bool {
        let restored = self.read_persisted().await;
        let _ = self.loaded.set(());
        restored
    }

    async fn ensure_loaded(&self) {
        self.loaded
            .get_or_init(|| async {
                self.read_persisted().await;
            })
            .await;
    }

    async fn read_persisted(&self) -> bool {
        let key = keys::circuit_state_key(&self.name);
        let bytes = match self.store.get(&key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(
                    dependency = %self.name,
                    store = self.store.backend(),
                    error = %e,
                    "Failed to load circuit state, starting CLOSED"
                );
                return false;
            }
        };

        let persisted = match serde_json::from_slice::<PersistedBreakerState>(&bytes) {
            Ok(persisted) => persisted,
            Err(e) => {
                tracing::warn!(
                    dependency = %self.name,
                    error = %e,
                    "Corrupt circuit state in store, starting CLOSED"
                );
                return false;
            }
        };

        self.restore(&persisted);
        tracing::info!(
            dependency = %self.name,
            state = %persisted.state,
            failure_count = persisted.failure_count,
            "Restored circuit state from store"
        );
        true
    }

    fn restore(&self, persisted: &PersistedBreakerState) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.state = persisted.state;
        inner.failure_count = persisted.failure_count;
        inner.half_open_attempts = 0;
        inner.half_open_epoch += 1;
        inner.last_probe_at = None;
        inner.opened_at = match persisted.state {
            CircuitState::Open => {
                let now_ms = unix_millis_now();
                let age_ms = now_ms.saturating_sub(persisted.opened_at_ms.unwrap_or(now_ms));
                let age = Duration::from_millis(age_ms).min(self.config.recovery_timeout());
                Some(now.checked_sub(age).unwrap_or(now))
            }
            CircuitState::Closed | CircuitState::HalfOpen => None,
        };
    }

    fn admit(&self, inner: &mut BreakerInner, now: Instant) -> Admission {
        let recovery = self.config.recovery_timeout();
        match inner.state {
            CircuitState::Closed => Admission::Pass,
            CircuitState::Open => {
                let opened_at = inner.opened_at.unwrap_or(now);
                if now.saturating_duration_since(opened_at) < recovery {
                    return Admission::Rejected;
                }
                inner.state = CircuitState::HalfOpen;
                inner.opened_at = None;
                inner.half_open_epoch += 1;
                inner.half_open_attempts = 1;
                inner.last_probe_at = Some(now);
                self.log_transition(CircuitState::Open, CircuitState::HalfOpen);
                self.persist(inner);
                Admission::Probe(inner.half_open_epoch)
            }
            CircuitState::HalfOpen => {
                if inner.half_open_attempts < self.config.half_open_max_probes.max(1) {
                    inner.half_open_attempts += 1;
                    inner.last_probe_at = Some(now);
                    return Admission::Probe(inner.half_open_epoch);
                }

                let stale = inner
                    .last_probe_at
                    .map_or(true, |at| now.saturating_duration_since(at) >= recovery);
                if !stale {
                    return Admission::Rejected;
                }

                tracing::warn!(
                    dependency = %self.name,
                    held = inner.half_open_attempts,
                    "Half-open probe abandoned, admitting a new probe"
                );
                inner.half_open_epoch += 1;
                inner.half_open_attempts = 1;
                inner.last_probe_at = Some(now);
                Admission::Probe(inner.half_open_epoch)
            }
        }
    }

    /// Only the current window's probe (or an untracked caller) may settle
    /// a half-open circuit.
    fn settles_half_open(&self, inner: &BreakerInner, reporter: Reporter) -> bool {
        let current = match reporter {
            Reporter::Caller => true,
            Reporter::Pass => false,
            Reporter::Probe(epoch) => epoch == inner.half_open_epoch,
        };
        if !current {
            tracing::debug!(
                dependency = %self.name,
                "Ignoring outcome of a call admitted outside the current probe window"
            );
        }
        current
    }

    fn on_success(&self, reporter: Reporter) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                if inner.failure_count == 0 {
                    return;
                }
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen => {
                if !self.settles_half_open(&inner, reporter) {
                    return;
                }
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.half_open_attempts = 0;
                inner.last_probe_at = None;
                self.log_transition(CircuitState::HalfOpen, CircuitState::Closed);
            }
            CircuitState::Open => {
                // A call admitted before the circuit opened finished late.
                tracing::debug!(dependency = %self.name, "Ignoring success while circuit is open");
                return;
            }
        }
        self.persist(&inner);
    }

    fn on_failure(&self, reporter: Reporter) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count = inner.failure_count.saturating_add(1);
                if inner.failure_count >= self.config.failure_threshold {
                    self.open(&mut inner, now);
                    self.log_transition(CircuitState::Closed, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                if !self.settles_half_open(&inner, reporter) {
                    return;
                }
                self.open(&mut inner, now);
                self.log_transition(CircuitState::HalfOpen, CircuitState::Open);
            }
            CircuitState::Open => {
                inner.failure_count = inner.failure_count.saturating_add(1);
            }
        }
        self.persist(&inner);
    }

    fn open(&self, inner: &mut BreakerInner, now: Instant) {
        inner.state = CircuitState::Open;
        inner.failure_count = inner.failure_count.max(self.config.failure_threshold);
        inner.opened_at = Some(now);
        inner.half_open_attempts = 0;
        inner.last_probe_at = None;
    }

    fn release_probe(&self, epoch: u64) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen
            && inner.half_open_epoch == epoch
            && inner.half_open_attempts > 0
        {
            inner.half_open_attempts -= 1;
            tracing::debug!(dependency = %self.name, "Half-open probe abandoned by caller");
        }
    }

    /// Queue the current state for the store. Called with the lock held so
    /// writes for this breaker reach the queue in state order.
    fn persist(&self, inner: &BreakerInner) {
        let now_ms = unix_millis_now();
        let persisted = PersistedBreakerState {
            state: inner.state,
            failure_count: inner.failure_count,
            opened_at_ms: inner
                .opened_at
                .map(|at| now_ms.saturating_sub(at.elapsed().as_millis() as u64)),
            half_open_attempts: inner.half_open_attempts,
        };
        let ttl = match inner.state {
            CircuitState::Open => self.config.open_state_ttl(),
            CircuitState::Closed | CircuitState::HalfOpen => self.config.state_ttl(),
        };

        match serde_json::to_vec(&persisted) {
            Ok(bytes) => {
                self.store
                    .submit_set(keys::circuit_state_key(&self.name), bytes, ttl);
            }
            Err(e) => {
                tracing::warn!(dependency = %self.name, error = %e, "Failed to encode circuit state");
            }
        }
    }

    fn log_transition(&self, from: CircuitState, to: CircuitState) {
        metrics::record_breaker_transition(&self.name, from.as_str(), to.as_str());
        match to {
            CircuitState::Open => tracing::warn!(
                dependency = %self.name,
                from = %from,
                to = %to,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                dependency = %self.name,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }
    }
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Permission to make one call through a [`CircuitBreaker`].
///
/// Consume it with [`success`](Self::success) or [`failure`](Self::failure).
/// Dropping it unsettled (the call was cancelled) records nothing and frees
/// any half-open probe slot it held.
#[must_use = "a permit should be settled with success() or failure()"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe_epoch: Option<u64>,
    settled: bool,
}

impl CallPermit<'_> {
    /// Whether this call is a half-open recovery probe.
    pub fn is_probe(&self) -> bool {
        self.probe_epoch.is_some()
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.reporter());
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.reporter());
    }

    fn reporter(&self) -> Reporter {
        self.probe_epoch.map_or(Reporter::Pass, Reporter::Probe)
    }

    /// Keep any probe slot held until an outcome is recorded on the breaker.
    fn detach(mut self) {
        self.settled = true;
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(epoch) = self.probe_epoch {
            self.breaker.release_probe(epoch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::UnavailableStore;
    use crate::store::{DurableStore, MemoryStore};
    use std::sync::Arc;

    fn config(threshold: u32, recovery_ms: u64) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: threshold,
            recovery_timeout_ms: recovery_ms,
            ..BreakerConfig::default()
        }
    }

    fn breaker(threshold: u32, recovery_ms: u64) -> (CircuitBreaker, StoreHandle, MemoryStore) {
        let (handle, store) = StoreHandle::in_memory();
        let cb = CircuitBreaker::new("llm", config(threshold, recovery_ms), handle.clone());
        (cb, handle, store)
    }

    async fn trip(cb: &CircuitBreaker) {
        for _ in 0..cb.config().failure_threshold {
            cb.record_failure().await;
        }
    }

    #[tokio::test]
    async fn test_threshold_opens_circuit() {
        let (cb, _, _) = breaker(5, 60_000);
        for _ in 0..4 {
            cb.record_failure().await;
            assert_eq!(cb.state(), CircuitState::Closed);
            assert!(cb.allow().await);
        }
        cb.record_failure().await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow().await);
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let (cb, _, _) = breaker(3, 60_000);
        cb.record_failure().await;
        cb.record_failure().await;
        cb.record_success().await;
        assert_eq!(cb.failure_count(), 0);
        cb.record_failure().await;
        cb.record_failure().await;
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_single_probe_after_recovery_timeout() {
        let (cb, _, _) = breaker(2, 30);
        trip(&cb).await;
        assert!(!cb.allow().await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cb.allow().await);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(!cb.allow().await);
    }

    #[tokio::test]
    async fn test_concurrent_probe_admits_exactly_one() {
        let (cb, _, _) = breaker(1, 20);
        let cb = Arc::new(cb);
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cb = cb.clone();
            handles.push(tokio::spawn(async move { cb.allow().await }));
        }
        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }
        assert_eq!(admitted, 1);
    }

    #[tokio::test]
    async fn test_half_open_success_closes() {
        let (cb, _, _) = breaker(2, 10);
        trip(&cb).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let permit = cb.acquire().await.expect("probe admitted");
        assert!(permit.is_probe());
        permit.success();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.allow().await);
    }

    #[tokio::test]
    async fn test_half_open_failure_reopens() {
        let (cb, _, _) = breaker(2, 10);
        trip(&cb).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cb.allow().await);
        cb.record_failure().await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.failure_count(), 2);
        assert!(!cb.allow().await);
    }

    #[tokio::test]
    async fn test_dropped_permit_releases_probe() {
        let (cb, _, _) = breaker(1, 10);
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let permit = cb.acquire().await.expect("probe admitted");
        assert!(cb.acquire().await.is_none());
        drop(permit);

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.snapshot().half_open_attempts, 0);
        assert!(cb.acquire().await.is_some());
    }

    #[tokio::test]
    async fn test_abandoned_probe_is_reassigned() {
        let (cb, _, _) = breaker(1, 20);
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        // allow() holds the slot until an outcome is recorded, which never happens.
        assert!(cb.allow().await);
        assert!(!cb.allow().await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cb.allow().await);
    }

    #[tokio::test]
    async fn test_stale_permit_does_not_release_new_window() {
        let (cb, _, _) = breaker(1, 20);
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let stale = cb.acquire().await.expect("first probe");
        tokio::time::sleep(Duration::from_millis(30)).await;
        let fresh = cb.acquire().await.expect("reassigned probe");
        drop(stale);

        assert_eq!(cb.snapshot().half_open_attempts, 1);
        assert!(cb.acquire().await.is_none());
        fresh.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_late_closed_call_does_not_settle_probe() {
        let (cb, _, _) = breaker(1, 20);
        let late = cb.acquire().await.expect("admitted while closed");
        assert!(!late.is_probe());
        cb.record_failure().await;
        assert_eq!(cb.state(), CircuitState::Open);
        tokio::time::sleep(Duration::from_millis(30)).await;

        let probe = cb.acquire().await.expect("probe admitted");
        late.success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.acquire().await.is_none());

        probe.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_late_closed_failure_does_not_reopen_probe_window() {
        let (cb, _, _) = breaker(1, 20);
        let late = cb.acquire().await.expect("admitted while closed");
        cb.record_failure().await;
        tokio::time::sleep(Duration::from_millis(30)).await;

        let probe = cb.acquire().await.expect("probe admitted");
        late.failure();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        probe.failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_state_survives_fresh_instance() {
        let (cb, handle, _) = breaker(3, 60_000);
        trip(&cb).await;
        handle.flush().await;

        let restored = CircuitBreaker::new("llm", config(3, 60_000), handle.clone());
        assert!(restored.load_from_store().await);
        assert_eq!(restored.state(), CircuitState::Open);
        assert_eq!(restored.failure_count(), 3);
        assert!(!restored.allow().await);
    }

    #[tokio::test]
    async fn test_closed_failure_count_survives_fresh_instance() {
        let (cb, handle, _) = breaker(5, 60_000);
        cb.record_failure().await;
        cb.record_failure().await;
        handle.flush().await;

        let restored = CircuitBreaker::new("llm", config(5, 60_000), handle);
        // Loaded lazily by the first admission check.
        assert!(restored.allow().await);
        assert_eq!(restored.state(), CircuitState::Closed);
        assert_eq!(restored.failure_count(), 2);
    }

    #[tokio::test]
    async fn test_persisted_open_time_is_honoured() {
        let (handle, store) = StoreHandle::in_memory();
        let persisted = PersistedBreakerState {
            state: CircuitState::Open,
            failure_count: 5,
            opened_at_ms: Some(unix_millis_now() - 10_000),
            half_open_attempts: 0,
        };
        store
            .set(
                &keys::circuit_state_key("llm"),
                serde_json::to_vec(&persisted).unwrap(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        let cb = CircuitBreaker::new("llm", config(5, 5_000), handle);
        assert!(cb.allow().await, "recovery timeout already elapsed before restart");
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test]
    async fn test_corrupt_entry_falls_back_to_closed() {
        let (handle, store) = StoreHandle::in_memory();
        store
            .set(&keys::circuit_state_key("llm"), b"{not json".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();

        let cb = CircuitBreaker::new("llm", config(2, 60_000), handle);
        assert!(!cb.load_from_store().await);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow().await);
    }

    #[tokio::test]
    async fn test_works_without_store() {
        let handle = StoreHandle::over(Arc::new(UnavailableStore));
        let cb = CircuitBreaker::new("llm", config(2, 60_000), handle.clone());

        assert!(cb.allow().await);
        cb.record_failure().await;
        cb.record_failure().await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow().await);

        handle.flush().await;
        assert!(handle.queue().stats().failed >= 2);
    }

    #[tokio::test]
    async fn test_reset_and_force_open() {
        let (cb, handle, store) = breaker(2, 60_000);
        trip(&cb).await;
        cb.reset().await;
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
        assert!(cb.allow().await);

        cb.force_open().await;
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow().await);

        handle.flush().await;
        let bytes = store.get(&keys::circuit_state_key("llm")).await.unwrap().unwrap();
        let persisted: PersistedBreakerState = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(persisted.state, CircuitState::Open);
        assert!(persisted.opened_at_ms.is_some());
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&CircuitState::HalfOpen).unwrap(),
            "\"HALF_OPEN\""
        );
        assert_eq!(CircuitState::Open.to_string(), "OPEN");
    }
}
