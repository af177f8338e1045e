//! Resilience & caching core.
//!
//! Protects a service from slow or failing upstream dependencies, avoids
//! repeating expensive calls, and processes at-least-once events at most once.
//!
//! ```text
//! ProtectedCaller::call_cached(dependency, key, operation)
//!     → cache (hit: return)
//!     → resilience (circuit breaker gate, retry with backoff, attempt timeout)
//!     → cache (store result)
//!
//! DedupTracker::should_process(event_id) gates inbound events.
//!
//! Breaker state, cache entries and dedup markers all live in a DurableStore,
//! written in the background through the persistence queue.
//! ```

// Core subsystems
pub mod cache;
pub mod caller;
pub mod dedup;
pub mod registry;
pub mod resilience;
pub mod store;

// Cross-cutting concerns
pub mod admin;
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use cache::{CacheKey, CacheStats, ResultCache};
pub use caller::{CallError, ProtectedCaller};
pub use config::CoreConfig;
pub use dedup::{DedupOutcome, DedupTracker};
pub use lifecycle::Shutdown;
pub use registry::{HealthSnapshot, ResilienceRegistry};
pub use resilience::{CircuitBreaker, CircuitState, RetryPolicy};
pub use store::{DurableStore, MemoryStore, StoreError, StoreHandle};
