//! Errors surfaced by protected calls.

use std::time::Duration;

use thiserror::Error;

use crate::resilience::timeouts::AttemptError;

/// Outcome of a protected call that did not produce a value.
///
/// Store failures never appear here; they are logged and absorbed.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// The dependency's circuit is open; the operation was not invoked.
    #[error("dependency '{dependency}' is unavailable (circuit open)")]
    UpstreamUnavailable { dependency: String },

    /// The operation failed; this is the error from its last attempt.
    #[error("operation failed: {0}")]
    OperationFailed(E),

    /// The last attempt exceeded its deadline.
    #[error("call to '{dependency}' timed out after {timeout:?}")]
    TimedOut {
        dependency: String,
        timeout: Duration,
    },
}

impl<E> CallError<E> {
    /// Build from the error of a final attempt.
    pub(crate) fn from_attempt(dependency: &str, error: AttemptError<E>) -> Self {
        match error {
            AttemptError::Failed(e) => CallError::OperationFailed(e),
            AttemptError::TimedOut(timeout) => CallError::TimedOut {
                dependency: dependency.to_string(),
                timeout,
            },
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, CallError::UpstreamUnavailable { .. })
    }

    /// The operation's own error, if that is what ended the call.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            CallError::OperationFailed(e) => Some(e),
            _ => None,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CallError::UpstreamUnavailable { .. } => "rejected",
            CallError::OperationFailed(_) => "failed",
            CallError::TimedOut { .. } => "timed_out",
        }
    }
}
