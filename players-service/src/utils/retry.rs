//! Transient fault retry logic
//!
//! Retries an operation with exponential backoff while it fails with a
//! transient error (`PlayersError::is_transient`).
//!
//! **Backoff Strategy:**
//! - Retries: 3 (4 attempts in total)
//! - Initial delay: 1s
//! - Multiplier: 2 (1s, 2s, 4s, ...)
//! - Max delay: 20s
//!
//! Non-transient errors are returned immediately. Cancellation is checked
//! before every attempt and interrupts backoff sleeps.

use std::future::Future;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::error::{PlayersError, PlayersResult};

/// Exponential backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: u32,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2,
            max_delay: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = self.multiplier.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Retry `operation` while it fails transiently
///
/// `on_retry` is called with the error, the upcoming retry number and the
/// backoff delay before each sleep.
///
/// # Returns
/// The operation's result, `PlayersError::Cancelled` if cancellation was
/// observed, or `PlayersError::RetriesExhausted` once the budget is spent.
pub async fn retry_transient<F, Fut, T, R>(
    operation_name: &str,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut on_retry: R,
    mut operation: F,
) -> PlayersResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PlayersResult<T>>,
    R: FnMut(&PlayersError, u32, Duration),
{
    let start_time = Instant::now();
    let mut attempt = 0u32;

    loop {
        if cancel.is_cancelled() {
            return Err(PlayersError::Cancelled);
        }

        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => {
                if attempt > policy.max_retries {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        error = %err,
                        "Retry budget exhausted"
                    );
                    return Err(PlayersError::RetriesExhausted {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                        last_error: err.to_string(),
                    });
                }

                let delay = policy.delay_for(attempt);

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient fault, will retry after backoff"
                );
                on_retry(&err, attempt, delay);

                tokio::select! {
                    _ = cancel.cancelled() => return Err(PlayersError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn transient() -> PlayersError {
        PlayersError::TransientRemote {
            status: Some(503),
            message: "HTTP 503 Service Unavailable".to_string(),
        }
    }

    #[test]
    fn test_default_delays_double_from_one_second() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(3), Duration::from_secs(4));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(6), Duration::from_secs(20));
        assert_eq!(policy.delay_for(64), Duration::from_secs(20));
    }

    #[tokio::test]
    async fn test_retry_succeeds_first_attempt() {
        let result = retry_transient(
            "test_op",
            &RetryPolicy::default(),
            &CancellationToken::new(),
            |_, _, _| {},
            || async { Ok::<i32, PlayersError>(42) },
        )
        .await;

        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_succeeds_after_transient_errors() {
        let attempts = Arc::new(AtomicU32::new(0));
        let mut retries_seen = Vec::new();

        let counter = attempts.clone();
        let result = retry_transient(
            "test_op",
            &RetryPolicy::default(),
            &CancellationToken::new(),
            |_, retry, delay| retries_seen.push((retry, delay)),
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transient())
                    } else {
                        Ok(7)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(
            retries_seen,
            vec![(1, Duration::from_secs(1)), (2, Duration::from_secs(2))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_four_failures_exhaust_three_retries() {
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result = retry_transient(
            "Download players",
            &RetryPolicy::default(),
            &CancellationToken::new(),
            |_, _, _| {},
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            },
        )
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        match result {
            Err(PlayersError::RetriesExhausted {
                operation,
                attempts,
                ..
            }) => {
                assert_eq!(operation, "Download players");
                assert_eq!(attempts, 4);
            }
            other => panic!("Expected RetriesExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_transient_error_fails_immediately() {
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result = retry_transient(
            "test_op",
            &RetryPolicy::default(),
            &CancellationToken::new(),
            |_, _, _| {},
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(PlayersError::Fatal("HTTP 403 Forbidden".into())) }
            },
        )
        .await;

        assert!(matches!(result, Err(PlayersError::Fatal(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let attempts = Arc::new(AtomicU32::new(0));

        let counter = attempts.clone();
        let result = retry_transient(
            "test_op",
            &RetryPolicy::default(),
            &cancel,
            |_, _, _| {},
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            },
        )
        .await;

        assert!(matches!(result, Err(PlayersError::Cancelled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let attempts = Arc::new(AtomicU32::new(0));

        let trigger = cancel.clone();
        let counter = attempts.clone();
        let result = retry_transient(
            "test_op",
            &RetryPolicy::default(),
            &cancel,
            move |_, _, _| trigger.cancel(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(transient()) }
            },
        )
        .await;

        assert!(matches!(result, Err(PlayersError::Cancelled)));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
