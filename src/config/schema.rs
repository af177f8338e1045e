//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the core.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Root configuration for the resilience core.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct CoreConfig {
    /// Durable store settings.
    pub store: StoreConfig,

    /// Background write pool.
    pub persistence: PersistenceConfig,

    /// Default circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Default retry settings.
    pub retry: RetryConfig,

    /// Result cache settings.
    pub cache: CacheConfig,

    /// Inbound event deduplication.
    pub dedup: DedupConfig,

    /// Per-dependency overrides, keyed by dependency name.
    pub dependencies: BTreeMap<String, DependencyConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin HTTP surface.
    pub admin: AdminConfig,
}

impl CoreConfig {
    /// Breaker settings for a dependency (override or default).
    pub fn breaker_for(&self, dependency: &str) -> &BreakerConfig {
        self.dependencies
            .get(dependency)
            .and_then(|d| d.breaker.as_ref())
            .unwrap_or(&self.breaker)
    }

    /// Retry settings for a dependency (override or default).
    pub fn retry_for(&self, dependency: &str) -> &RetryConfig {
        self.dependencies
            .get(dependency)
            .and_then(|d| d.retry.as_ref())
            .unwrap_or(&self.retry)
    }
}

/// Durable store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Deadline for any single store operation in milliseconds.
    pub operation_timeout_ms: u64,

    /// Snapshot file for the in-memory store (loaded at startup, written at shutdown).
    pub snapshot_path: Option<String>,

    /// Interval between expired-entry sweeps in seconds.
    pub sweep_interval_secs: u64,
}

impl StoreConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 250,
            snapshot_path: None,
            sweep_interval_secs: 60,
        }
    }
}

/// Background persistence pool.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Number of worker tasks applying writes.
    pub workers: usize,

    /// Maximum queued writes before new ones are dropped.
    pub queue_capacity: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            queue_capacity: 1024,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Time an open circuit waits before allowing a probe, in milliseconds.
    pub recovery_timeout_ms: u64,

    /// Concurrent probes allowed while half-open.
    pub half_open_max_probes: u32,

    /// Persisted TTL for closed and half-open state, in seconds.
    pub state_ttl_secs: u64,

    /// Persisted TTL for open state, in seconds.
    pub open_state_ttl_secs: u64,
}

impl BreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }

    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }

    pub fn open_state_ttl(&self) -> Duration {
        Duration::from_secs(self.open_state_ttl_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_ms: 30_000,
            half_open_max_probes: 1,
            state_ttl_secs: 300,
            open_state_ttl_secs: 3600,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,

    /// Jitter as a fraction of the delay (0.1 = ±10%).
    pub jitter_fraction: f64,

    /// Optional deadline for a single attempt in milliseconds.
    pub attempt_timeout_ms: Option<u64>,
}

impl RetryConfig {
    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            backoff_multiplier: 2.0,
            jitter_fraction: 0.1,
            attempt_timeout_ms: None,
        }
    }
}

/// Result cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Default entry TTL in seconds.
    pub default_ttl_secs: u64,

    /// Per-namespace TTL overrides in seconds.
    pub namespace_ttl_secs: BTreeMap<String, u64>,
}

impl CacheConfig {
    /// Entry TTL for a namespace (override or default).
    pub fn ttl_for(&self, namespace: &str) -> Duration {
        Duration::from_secs(
            self.namespace_ttl_secs
                .get(namespace)
                .copied()
                .unwrap_or(self.default_ttl_secs),
        )
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 3600,
            namespace_ttl_secs: BTreeMap::new(),
        }
    }
}

/// Event deduplication configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DedupConfig {
    /// How long processed event IDs are remembered, in seconds.
    /// Must exceed the upstream's maximum redelivery window.
    pub ttl_secs: u64,

    /// Process events when the store is unreachable (true) or skip them (false).
    pub fail_open: bool,
}

impl DedupConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 86_400,
            fail_open: true,
        }
    }
}

/// Overrides for one protected dependency.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DependencyConfig {
    pub breaker: Option<BreakerConfig>,
    pub retry: Option<RetryConfig>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin endpoints.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin bind address.
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
            request_timeout_secs: 10,
        }
    }
}
