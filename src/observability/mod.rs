//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Breakers, caches, dedup, persistence queue produce:
//!     → logging.rs (structured tracing events with a dependency/namespace field)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout (tracing-subscriber fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Store degradation is visible here and nowhere else
//! - Metrics are cheap (atomic increments) and safe to call before a recorder exists

pub mod logging;
pub mod metrics;
