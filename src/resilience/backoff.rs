//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again.
    Retry(Duration),
    /// The attempt budget is spent.
    Stop,
}

/// Immutable retry schedule.
///
/// Attempts are numbered from 1. `next_delay(n)` is asked after attempt `n`
/// failed and answers how long to wait before attempt `n + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter_fraction: f64,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
        jitter_fraction: f64,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: max_delay.max(base_delay),
            backoff_multiplier: if backoff_multiplier.is_finite() {
                backoff_multiplier.max(1.0)
            } else {
                1.0
            },
            jitter_fraction: jitter_fraction.clamp(0.0, 0.99),
        }
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO, 1.0, 0.0)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Unjittered delay after attempt `attempt`:
    /// `min(max_delay, base_delay * multiplier^(attempt - 1))`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(1024) as i32;
        let scaled = self.base_delay.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        let capped = scaled.min(self.max_delay.as_nanos() as f64);
        Duration::from_nanos(capped.round() as u64)
    }

    /// Decide whether to retry after attempt `attempt` failed.
    pub fn next_delay(&self, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::Stop;
        }
        RetryDecision::Retry(self.jitter(self.backoff_for(attempt)))
    }

    /// Multiply by a uniform factor in `[1 - jitter, 1 + jitter]`.
    fn jitter(&self, delay: Duration) -> Duration {
        if self.jitter_fraction <= 0.0 || delay.is_zero() {
            return delay;
        }
        let factor = rand::thread_rng()
            .gen_range((1.0 - self.jitter_fraction)..=(1.0 + self.jitter_fraction));
        delay.mul_f64(factor)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            config.backoff_multiplier,
            config.jitter_fraction,
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_attempts: u32, jitter: f64) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(100),
            Duration::from_millis(1000),
            2.0,
            jitter,
        )
    }

    #[test]
    fn test_backoff_calculation() {
        let p = policy(10, 0.0);
        assert_eq!(p.backoff_for(1), Duration::from_millis(100));
        assert_eq!(p.backoff_for(2), Duration::from_millis(200));
        assert_eq!(p.backoff_for(3), Duration::from_millis(400));
        assert_eq!(p.backoff_for(5), Duration::from_millis(1000));
        assert_eq!(p.backoff_for(60), Duration::from_millis(1000));
    }

    #[test]
    fn test_delays_non_decreasing_up_to_max() {
        let p = policy(50, 0.0);
        let mut previous = Duration::ZERO;
        for attempt in 1..50 {
            match p.next_delay(attempt) {
                RetryDecision::Retry(delay) => {
                    assert!(delay >= previous, "attempt {attempt}: {delay:?} < {previous:?}");
                    assert!(delay <= Duration::from_millis(1000));
                    previous = delay;
                }
                RetryDecision::Stop => panic!("stopped early at {attempt}"),
            }
        }
    }

    #[test]
    fn test_stops_at_max_attempts() {
        let p = policy(3, 0.1);
        assert!(matches!(p.next_delay(1), RetryDecision::Retry(_)));
        assert!(matches!(p.next_delay(2), RetryDecision::Retry(_)));
        assert_eq!(p.next_delay(3), RetryDecision::Stop);
        assert_eq!(p.next_delay(4), RetryDecision::Stop);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let p = policy(10, 0.2);
        for _ in 0..200 {
            let RetryDecision::Retry(delay) = p.next_delay(2) else {
                panic!("expected retry");
            };
            assert!(delay >= Duration::from_millis(159), "{delay:?}");
            assert!(delay <= Duration::from_millis(241), "{delay:?}");
        }
    }

    #[test]
    fn test_no_retry_policy() {
        let p = RetryPolicy::no_retry();
        assert_eq!(p.max_attempts(), 1);
        assert_eq!(p.next_delay(1), RetryDecision::Stop);
    }

    #[test]
    fn test_from_config() {
        let config = RetryConfig {
            max_attempts: 4,
            base_delay_ms: 10,
            max_delay_ms: 50,
            backoff_multiplier: 3.0,
            jitter_fraction: 0.0,
            attempt_timeout_ms: None,
        };
        let p = RetryPolicy::from(&config);
        assert_eq!(p.max_attempts(), 4);
        assert_eq!(p.backoff_for(2), Duration::from_millis(30));
        assert_eq!(p.backoff_for(3), Duration::from_millis(50));
    }
}
