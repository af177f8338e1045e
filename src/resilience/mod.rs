//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Protected call for a dependency:
//!     → registry.rs (look up or create the dependency's breaker)
//!     → circuit_breaker.rs (admit, or reject while open)
//!     → timeouts.rs (bound the attempt)
//!     → On failure: backoff.rs (stop, or wait and retry)
//!     → retries.rs (re-check the breaker before every attempt)
//! ```
//!
//! # Design Decisions
//! - Breaker state always takes precedence over remaining retry budget
//! - Circuit breakers are per dependency and persisted to the durable store
//! - Timeouts are optional per dependency; a timed-out attempt is a failure
//! - Cancelled attempts are neither successes nor failures

pub mod backoff;
pub mod circuit_breaker;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use backoff::{RetryDecision, RetryPolicy};
pub use circuit_breaker::{
    BreakerSnapshot, CallPermit, CircuitBreaker, CircuitState, PersistedBreakerState,
};
pub use registry::BreakerRegistry;
pub use retries::run_with_retry;
pub use timeouts::{with_attempt_timeout, AttemptError};
