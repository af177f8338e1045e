//! Protected call orchestration.
//!
//! # Data Flow
//! ```text
//! call_cached(dependency, key, operation)
//!     → ResultCache::get (hit: return)
//!     → CircuitBreaker::acquire (open: UpstreamUnavailable)
//!     → retry loop around operation(), outcomes reported to the breaker
//!     → ResultCache::set on success (background)
//!     → final operation error returned unchanged
//! ```
//!
//! # Design Decisions
//! - Failures of the protected operation reach the caller untouched
//! - Store failures never do; they only cost cache hits and cross-restart memory

pub mod error;
pub mod protected;

pub use error::CallError;
pub use protected::ProtectedCaller;
