//! # Retry policy for listener invocations.
//!
//! [`RetryPolicy`] bounds how many times one listener invocation is attempted
//! and which [`BackoffFactory`] spaces the attempts.
//!
//! ## Rules
//! - Attempts run **sequentially**: attempt N+1 never starts before attempt N returns.
//! - Every call to [`RetryPolicy::run`] takes a **fresh** backoff from the factory.
//! - The sequence ends on the first success, on a non-retryable error, when
//!   attempts are exhausted, or when the backoff returns `None`.
//! - The **last** error is surfaced.
//! - Sleeping uses `tokio::time::sleep`, so other tasks keep running.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::policies::backoff::BackoffFactory;

/// Bounded retry with pluggable backoff.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffFactory,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl RetryPolicy {
    /// Creates a policy; `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, backoff: BackoffFactory) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Maximum number of attempts (always `>= 1`).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Drives `attempt` until it succeeds or the policy gives up.
    ///
    /// - `attempt` receives the 1-based attempt number.
    /// - `retryable` decides whether an error may be retried at all.
    /// - `on_retry(attempt, delay, &err)` is called before each sleep.
    pub async fn run<T, E, F, Fut>(
        &self,
        mut attempt: F,
        retryable: impl Fn(&E) -> bool,
        mut on_retry: impl FnMut(u32, Duration, &E),
    ) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut backoff = (self.backoff)();
        let mut n = 1;

        loop {
            let err = match attempt(n).await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };

            if n >= self.max_attempts || !retryable(&err) {
                return Err(err);
            }

            let Some(delay) = backoff.next_backoff() else {
                return Err(err);
            };

            on_retry(n, delay, &err);
            tokio::time::sleep(delay).await;
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policies::backoff::{ConstantBackoff, StopBackoff};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn constant(ms: u64) -> BackoffFactory {
        ConstantBackoff::factory(Duration::from_millis(ms))
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_on_third_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let policy = RetryPolicy::new(3, constant(10));

        let res: Result<(), &str> = policy
            .run(
                |_| {
                    let calls = Arc::clone(&calls);
                    async move {
                        if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                            Err("not yet")
                        } else {
                            Ok(())
                        }
                    }
                },
                |_| true,
                |_, _, _| {},
            )
            .await;

        assert!(res.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_surfaces_last_error_after_exhaustion() {
        let policy = RetryPolicy::new(3, constant(1));
        let mut retries = Vec::new();

        let res: Result<(), String> = policy
            .run(
                |n| async move { Err(format!("fail #{n}")) },
                |_| true,
                |n, delay, _| retries.push((n, delay)),
            )
            .await;

        assert_eq!(res, Err("fail #3".to_string()));
        assert_eq!(
            retries,
            vec![(1, Duration::from_millis(1)), (2, Duration::from_millis(1))]
        );
    }

    #[tokio::test]
    async fn test_non_retryable_and_stop_end_early() {
        let policy = RetryPolicy::new(5, constant(1));
        let calls = AtomicU32::new(0);
        let res: Result<(), &str> = policy
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("fatal") }
                },
                |_| false,
                |_, _, _| {},
            )
            .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stop = RetryPolicy::new(5, StopBackoff::factory());
        let calls = AtomicU32::new(0);
        let _: Result<(), &str> = stop
            .run(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err("x") }
                },
                |_| true,
                |_, _, _| {},
            )
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_max_attempts_clamped() {
        assert_eq!(RetryPolicy::new(0, constant(1)).max_attempts(), 1);
    }
}
