//! Result caching subsystem.
//!
//! # Data Flow
//! ```text
//! Caller input + params
//!     → key.rs (canonicalize, SHA-256)
//!     → result_cache.rs (cache:<namespace>:<hash> in the durable store)
//!         → hit: decode and return
//!         → miss / store error / corrupt entry: caller runs the operation
//! ```
//!
//! # Design Decisions
//! - Staleness is bounded by TTL only; there is no upstream-driven invalidation
//! - Writes are fire-and-forget through the persistence queue
//! - Store errors are counted apart from clean misses ("broken" vs "cold")

pub mod key;
pub mod result_cache;

pub use key::{CacheKey, CacheKeyBuilder};
pub use result_cache::{CacheStats, ResultCache};
