//! Metrics collection and exposition.
//!
//! # Metrics
//! - `resilience_breaker_transitions_total` (counter): by dependency, from, to
//! - `resilience_breaker_rejections_total` (counter): calls rejected by an open circuit
//! - `resilience_calls_total` (counter): protected call outcomes by dependency
//! - `resilience_cache_lookups_total` (counter): hit, miss, error, corrupt by namespace
//! - `resilience_dedup_outcomes_total` (counter): claimed, duplicate, unverified, rejected
//! - `resilience_persistence_jobs_total` (counter): applied, failed, dropped by job kind
//!
//! # Design Decisions
//! - Without an installed recorder every call is a no-op
//! - Labels are low-cardinality: dependency and namespace names come from code, not input

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_breaker_transition(dependency: &str, from: &'static str, to: &'static str) {
    ::metrics::counter!(
        "resilience_breaker_transitions_total",
        "dependency" => dependency.to_string(),
        "from" => from,
        "to" => to
    )
    .increment(1);
}

pub fn record_breaker_rejection(dependency: &str) {
    ::metrics::counter!(
        "resilience_breaker_rejections_total",
        "dependency" => dependency.to_string()
    )
    .increment(1);
}

pub fn record_call_outcome(dependency: &str, outcome: &'static str) {
    ::metrics::counter!(
        "resilience_calls_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_cache_lookup(namespace: &str, result: &'static str) {
    ::metrics::counter!(
        "resilience_cache_lookups_total",
        "namespace" => namespace.to_string(),
        "result" => result
    )
    .increment(1);
}

pub fn record_dedup_outcome(outcome: &'static str) {
    ::metrics::counter!("resilience_dedup_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_persistence(kind: &'static str, outcome: &'static str) {
    ::metrics::counter!(
        "resilience_persistence_jobs_total",
        "kind" => kind,
        "outcome" => outcome
    )
    .increment(1);
}
