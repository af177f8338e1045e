//! Retry loop gated by the circuit breaker.
//!
//! # Responsibilities
//! - Ask the breaker for a permit before every attempt, not just the first
//! - Report each attempt's outcome to the breaker
//! - Sleep between attempts according to the [`RetryPolicy`]
//!
//! # Design Decisions
//! - Breaker state beats remaining retry budget: a rejection mid-sequence ends the loop
//! - The caller gets the last attempt's error, never a generic "retries exhausted"
//! - Dropping the loop future mid-attempt drops the permit unsettled, so a
//!   cancelled attempt counts as neither success nor failure
//! - Delays hold no locks; other callers on the same breaker are unaffected

use std::future::Future;
use std::time::Duration;

use crate::caller::CallError;
use crate::observability::metrics;
use crate::resilience::backoff::{RetryDecision, RetryPolicy};
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::resilience::timeouts::{with_attempt_timeout, AttemptError};

/// Run `operation` under `breaker` and `policy`.
pub async fn run_with_retry<T, E, F, Fut>(
    breaker: &CircuitBreaker,
    policy: &RetryPolicy,
    attempt_timeout: Option<Duration>,
    mut operation: F,
) -> Result<T, CallError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let dependency = breaker.name();
    let mut attempt: u32 = 0;
    let mut last_error: Option<AttemptError<E>> = None;

    loop {
        let Some(permit) = breaker.acquire().await else {
            let error = match last_error {
                None => CallError::UpstreamUnavailable {
                    dependency: dependency.to_string(),
                },
                Some(error) => {
                    tracing::warn!(
                        dependency = %dependency,
                        attempt,
                        "Circuit opened during retries, returning last error"
                    );
                    CallError::from_attempt(dependency, error)
                }
            };
            metrics::record_call_outcome(dependency, error.kind());
            return Err(error);
        };

        attempt += 1;
        match with_attempt_timeout(attempt_timeout, operation()).await {
            Ok(value) => {
                permit.success();
                metrics::record_call_outcome(dependency, "success");
                if attempt > 1 {
                    tracing::info!(dependency = %dependency, attempt, "Call succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) => {
                permit.failure();
                if let AttemptError::TimedOut(limit) = &error {
                    tracing::warn!(dependency = %dependency, attempt, timeout = ?limit, "Attempt timed out");
                }

                match policy.next_delay(attempt) {
                    RetryDecision::Stop => {
                        let error = CallError::from_attempt(dependency, error);
                        tracing::warn!(dependency = %dependency, attempts = attempt, "Call failed");
                        metrics::record_call_outcome(dependency, error.kind());
                        return Err(error);
                    }
                    RetryDecision::Retry(delay) => {
                        tracing::debug!(
                            dependency = %dependency,
                            attempt,
                            delay = ?delay,
                            "Attempt failed, retrying"
                        );
                        last_error = Some(error);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
