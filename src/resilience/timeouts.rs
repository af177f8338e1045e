//! Per-attempt deadlines.
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the attempt future is dropped on expiry
//! - A timed-out attempt is a breaker failure like any other
//! - Timeout errors stay distinct from operation errors so the last attempt can report them

use std::future::Future;
use std::time::Duration;

/// Why a single attempt did not produce a value.
#[derive(Debug)]
pub enum AttemptError<E> {
    /// The operation returned an error.
    Failed(E),
    /// The operation did not finish within its deadline.
    TimedOut(Duration),
}

/// Run one attempt, bounded by `limit` when one is configured.
pub async fn with_attempt_timeout<T, E, F>(
    limit: Option<Duration>,
    attempt: F,
) -> Result<T, AttemptError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    let Some(limit) = limit else {
        return attempt.await.map_err(AttemptError::Failed);
    };

    match tokio::time::timeout(limit, attempt).await {
        Ok(result) => result.map_err(AttemptError::Failed),
        Err(_) => Err(AttemptError::TimedOut(limit)),
    }
}
