//! Inbound event deduplication.
//!
//! # Data Flow
//! ```text
//! Event delivery (at least once)
//!     → tracker.rs claim: set_if_not_exists(dedup:<eventId>, Claimed, ttl)
//!         → created: process, then mark Completed (background)
//!         → exists: skip as duplicate
//!         → store down: process anyway (fail open) or skip (fail closed)
//! ```
//!
//! # Design Decisions
//! - Check-and-mark is one atomic store operation, never read-then-write
//! - Fail-open by default: a duplicate of an idempotent operation beats a dropped event
//! - A failed handler leaves the claim in place; retries come from redelivery after the TTL

pub mod tracker;

pub use tracker::{DedupOutcome, DedupRecord, DedupStats, DedupStatus, DedupTracker};
