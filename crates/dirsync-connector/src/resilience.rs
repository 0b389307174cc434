//! Bounded retry with pluggable backoff.
//!
//! [`RetryExecutor`] repeats an async operation until it succeeds, the
//! caller's classifier declares the error fatal, or the attempt budget in
//! [`RetryPolicy`] runs out.

use std::time::Duration;
use tracing::{debug, warn};

/// Delay strategy between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Retry immediately.
    None,
    /// Same delay before every retry.
    Fixed(Duration),
    /// `initial * multiplier^n`, capped at `max`.
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Backoff {
    /// Delay before the retry that follows attempt `attempt` (0-indexed).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(d) => *d,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let ms = initial.as_millis() as f64 * multiplier.powi(attempt as i32);
                let capped = ms.min(max.as_millis() as f64);
                Duration::from_millis(capped as u64)
            }
        }
    }
}

/// How many times to try and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(5),
                multiplier: 2.0,
            },
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }

    /// Policy that retries immediately, for callers that only want a bound.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Backoff::None)
    }
}

/// Error returned once the executor gives up.
#[derive(Debug)]
pub struct RetryFailure<E> {
    /// Attempts actually made.
    pub attempts: u32,
    /// Error from the final attempt.
    pub last_error: E,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryFailure<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "gave up after {} attempt(s): {}",
            self.attempts, self.last_error
        )
    }
}

/// Retry executor driven by a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute `operation`, retrying while `is_retryable` accepts the error.
    pub async fn execute<F, Fut, T, E, R>(
        &self,
        mut operation: F,
        is_retryable: R,
    ) -> Result<T, RetryFailure<E>>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        R: Fn(&E) -> bool,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_attempts || !is_retryable(&e) {
                        warn!(attempts = attempt, error = %e, "Giving up after failed attempt");
                        return Err(RetryFailure {
                            attempts: attempt,
                            last_error: e,
                        });
                    }

                    let delay = self.policy.backoff.delay(attempt - 1);
                    debug!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after failed attempt"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_succeeds_first_try() {
        let executor = RetryExecutor::default();
        let result: Result<u32, RetryFailure<ConnectorError>> =
            executor.execute(|| async { Ok(42) }, |_| true).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let executor = RetryExecutor::new(RetryPolicy::immediate(3));
        let calls = AtomicU32::new(0);

        let result = executor
            .execute(
                || async {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(ConnectorError::connection_failed("refused"))
                    } else {
                        Ok("token")
                    }
                },
                ConnectorError::is_transient,
            )
            .await;

        assert_eq!(result.unwrap(), "token");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_at_attempt_budget() {
        let executor = RetryExecutor::new(RetryPolicy::immediate(3));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ConnectorError::connection_failed("refused"))
                },
                |_| true,
            )
            .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let executor = RetryExecutor::new(RetryPolicy::immediate(5));
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = executor
            .execute(
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(ConnectorError::missing_attribute("immutableId"))
                },
                ConnectorError::is_transient,
            )
            .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            initial: Duration::from_millis(100),
            max: Duration::from_millis(500),
            multiplier: 2.0,
        };
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_attempts_means_one() {
        let policy = RetryPolicy::immediate(0);
        assert_eq!(policy.max_attempts.max(1), 1);
        assert_eq!(Backoff::Fixed(Duration::from_secs(1)).delay(7), Duration::from_secs(1));
    }
}
