//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds >= 1, timeouts > 0, jitter < 1)
//! - Validate per-dependency overrides with the same rules as the defaults
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CoreConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{BreakerConfig, CoreConfig, RetryConfig};

/// Upper bound for any TTL field (ten years).
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &CoreConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.store.operation_timeout_ms == 0 {
        errors.push(ValidationError::new("store.operation_timeout_ms", "must be > 0"));
    }
    if config.store.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("store.sweep_interval_secs", "must be > 0"));
    }
    if config.persistence.workers == 0 {
        errors.push(ValidationError::new("persistence.workers", "must be >= 1"));
    }
    if config.persistence.queue_capacity == 0 {
        errors.push(ValidationError::new("persistence.queue_capacity", "must be >= 1"));
    }

    check_breaker("breaker", &config.breaker, &mut errors);
    check_retry("retry", &config.retry, &mut errors);

    check_ttl("cache.default_ttl_secs", config.cache.default_ttl_secs, &mut errors);
    for (namespace, ttl) in &config.cache.namespace_ttl_secs {
        check_ttl(&format!("cache.namespace_ttl_secs.{namespace}"), *ttl, &mut errors);
    }

    check_ttl("dedup.ttl_secs", config.dedup.ttl_secs, &mut errors);

    for (name, dependency) in &config.dependencies {
        if name.trim().is_empty() || name.chars().any(char::is_whitespace) {
            errors.push(ValidationError::new(
                format!("dependencies.{name:?}"),
                "dependency names must be non-empty and contain no whitespace",
            ));
        }
        if let Some(breaker) = &dependency.breaker {
            check_breaker(&format!("dependencies.{name}.breaker"), breaker, &mut errors);
        }
        if let Some(retry) = &dependency.retry {
            check_retry(&format!("dependencies.{name}.retry"), retry, &mut errors);
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new("admin.bind_address", "must be a socket address"));
        }
        if config.admin.request_timeout_secs == 0 {
            errors.push(ValidationError::new("admin.request_timeout_secs", "must be > 0"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_breaker(prefix: &str, breaker: &BreakerConfig, errors: &mut Vec<ValidationError>) {
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(format!("{prefix}.failure_threshold"), "must be >= 1"));
    }
    if breaker.recovery_timeout_ms == 0 {
        errors.push(ValidationError::new(format!("{prefix}.recovery_timeout_ms"), "must be > 0"));
    } else if breaker.recovery_timeout_ms / 1000 > MAX_TTL_SECS {
        errors.push(ValidationError::new(
            format!("{prefix}.recovery_timeout_ms"),
            format!("must be <= {MAX_TTL_SECS}s"),
        ));
    }
    if breaker.half_open_max_probes == 0 {
        errors.push(ValidationError::new(
            format!("{prefix}.half_open_max_probes"),
            "must be >= 1",
        ));
    }
    check_ttl(&format!("{prefix}.state_ttl_secs"), breaker.state_ttl_secs, errors);
    if breaker.open_state_ttl_secs > MAX_TTL_SECS {
        errors.push(ValidationError::new(
            format!("{prefix}.open_state_ttl_secs"),
            format!("must be <= {MAX_TTL_SECS}"),
        ));
    } else if breaker.open_state_ttl_secs < breaker.state_ttl_secs {
        errors.push(ValidationError::new(
            format!("{prefix}.open_state_ttl_secs"),
            "must be >= state_ttl_secs",
        ));
    }
}

fn check_ttl(field: &str, ttl_secs: u64, errors: &mut Vec<ValidationError>) {
    if ttl_secs == 0 {
        errors.push(ValidationError::new(field, "must be > 0"));
    } else if ttl_secs > MAX_TTL_SECS {
        errors.push(ValidationError::new(field, format!("must be <= {MAX_TTL_SECS}")));
    }
}

fn check_retry(prefix: &str, retry: &RetryConfig, errors: &mut Vec<ValidationError>) {
    if retry.max_attempts == 0 {
        errors.push(ValidationError::new(format!("{prefix}.max_attempts"), "must be >= 1"));
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        errors.push(ValidationError::new(
            format!("{prefix}.base_delay_ms"),
            "must be <= max_delay_ms",
        ));
    }
    if !retry.backoff_multiplier.is_finite() || retry.backoff_multiplier < 1.0 {
        errors.push(ValidationError::new(
            format!("{prefix}.backoff_multiplier"),
            "must be a finite number >= 1.0",
        ));
    }
    if !(0.0..1.0).contains(&retry.jitter_fraction) {
        errors.push(ValidationError::new(
            format!("{prefix}.jitter_fraction"),
            "must be in [0.0, 1.0)",
        ));
    }
    if retry.attempt_timeout_ms == Some(0) {
        errors.push(ValidationError::new(format!("{prefix}.attempt_timeout_ms"), "must be > 0"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DependencyConfig;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&CoreConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = CoreConfig::default();
        config.breaker.failure_threshold = 0;
        config.retry.jitter_fraction = 1.5;
        config.dedup.ttl_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(errors.len(), 3);
        assert!(fields.contains(&"breaker.failure_threshold"));
        assert!(fields.contains(&"retry.jitter_fraction"));
        assert!(fields.contains(&"dedup.ttl_secs"));
    }

    #[test]
    fn test_open_state_must_outlive_closed_state() {
        let mut config = CoreConfig::default();
        config.breaker.state_ttl_secs = 600;
        config.breaker.open_state_ttl_secs = 60;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "breaker.open_state_ttl_secs");
    }

    #[test]
    fn test_ttls_have_an_upper_bound() {
        let mut config = CoreConfig::default();
        config.dedup.ttl_secs = u64::MAX;
        config.breaker.open_state_ttl_secs = u64::MAX;
        config.cache.namespace_ttl_secs.insert("embeddings".into(), u64::MAX);

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(errors.len(), 3, "{fields:?}");
        assert!(fields.contains(&"dedup.ttl_secs"));
        assert!(fields.contains(&"breaker.open_state_ttl_secs"));
        assert!(fields.contains(&"cache.namespace_ttl_secs.embeddings"));

        config = CoreConfig::default();
        config.dedup.ttl_secs = MAX_TTL_SECS;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_dependency_override_is_checked() {
        let mut config = CoreConfig::default();
        let mut retry = RetryConfig::default();
        retry.base_delay_ms = 5000;
        config.dependencies.insert(
            "vector-store".into(),
            DependencyConfig {
                breaker: None,
                retry: Some(retry),
            },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "dependencies.vector-store.retry.base_delay_ms");
        assert_eq!(
            errors[0].to_string(),
            "dependencies.vector-store.retry.base_delay_ms: must be <= max_delay_ms"
        );
    }

    #[test]
    fn test_admin_checks_skipped_when_disabled() {
        let mut config = CoreConfig::default();
        config.admin.enabled = false;
        config.admin.api_key.clear();
        assert!(validate_config(&config).is_ok());
    }
}
