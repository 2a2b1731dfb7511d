//! Retry-with-backoff for operations whose errors can be distinguished as
//! terminal or retryable by the caller.

use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Exponential backoff policy: base delay doubles each attempt, capped.
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl BackoffPolicy {
    /// Delay before the given zero-indexed retry attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.base_delay.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
        scaled.min(self.max_delay)
    }
}

/// Error produced when all retry attempts are exhausted.
#[derive(Debug, Error)]
#[error("operation failed after {attempts} attempt(s): {last_error}")]
pub struct RetryError<E: std::fmt::Display> {
    /// Number of attempts made.
    pub attempts: u32,
    /// The error from the final attempt.
    pub last_error: E,
}

/// Retry `operation` according to `policy`. `is_retryable` distinguishes
/// transient errors (retried) from terminal ones (returned immediately).
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: BackoffPolicy,
    mut operation: F,
    is_retryable: impl Fn(&E) -> bool,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                attempt += 1;
                let exhausted = attempt >= policy.max_attempts;
                if exhausted || !is_retryable(&err) {
                    return Err(RetryError {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                let delay = policy.delay_for(attempt - 1);
                warn!(attempt, ?delay, "retrying after transient error");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let result: Result<u32, RetryError<&str>> = retry_with_backoff(
            policy,
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("transient")
                    } else {
                        Ok(42)
                    }
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy::default();
        let result: Result<u32, RetryError<&str>> = retry_with_backoff(
            policy,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err("terminal") }
            },
            |_| false,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_report_attempt_count() {
        let calls = AtomicU32::new(0);
        let policy = BackoffPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        };
        let result: Result<u32, RetryError<&str>> = retry_with_backoff(
            policy,
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err("transient") }
            },
            |_| true,
        )
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
    }
}
