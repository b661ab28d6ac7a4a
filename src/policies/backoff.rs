//! # Backoff strategies for listener retries.
//!
//! A retry sequence asks a [`Backoff`] for the delay before each new attempt.
//! Backoffs are **stateful** (they count attempts), so the dispatcher never
//! shares one between invocations: it asks a [`BackoffFactory`] for a fresh
//! instance per retry sequence.
//!
//! Provided strategies:
//! - [`ConstantBackoff`]: same delay every time;
//! - [`ExponentialBackoff`]: driven by a [`BackoffPolicy`] (`first × factor^n`, capped, jittered);
//! - [`StopBackoff`]: never waits, stops the sequence immediately.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use eventpool::{BackoffPolicy, JitterPolicy};
//!
//! let policy = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(policy.next(0), Duration::from_millis(100));
//! assert_eq!(policy.next(1), Duration::from_millis(200));
//! assert_eq!(policy.next(10), Duration::from_secs(10));
//!
//! let mut backoff = (policy.factory())();
//! assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
//! assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Stateful delay generator for one retry sequence.
pub trait Backoff: Send {
    /// Returns the delay before the next attempt, or `None` to stop retrying.
    fn next_backoff(&mut self) -> Option<Duration>;

    /// Restarts the sequence from its first delay.
    fn reset(&mut self);
}

/// Produces a fresh [`Backoff`] per retry sequence.
pub type BackoffFactory = Arc<dyn Fn() -> Box<dyn Backoff> + Send + Sync>;

/// Waits the same delay before every attempt.
#[derive(Clone, Copy, Debug)]
pub struct ConstantBackoff {
    delay: Duration,
}

impl ConstantBackoff {
    /// Creates a constant backoff.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Factory producing constant backoffs with `delay`.
    pub fn factory(delay: Duration) -> BackoffFactory {
        Arc::new(move || Box::new(ConstantBackoff::new(delay)) as Box<dyn Backoff>)
    }
}

impl Backoff for ConstantBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        Some(self.delay)
    }

    fn reset(&mut self) {}
}

/// Stops every retry sequence immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct StopBackoff;

impl StopBackoff {
    /// Factory producing stop backoffs.
    pub fn factory() -> BackoffFactory {
        Arc::new(|| Box::new(StopBackoff) as Box<dyn Backoff>)
    }
}

impl Backoff for StopBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        None
    }

    fn reset(&mut self) {}
}

/// Retry backoff policy.
///
/// Encapsulates parameters that determine how retry delays grow:
/// - [`BackoffPolicy::first`]: the initial delay;
/// - [`BackoffPolicy::factor`]: multiplicative growth factor;
/// - [`BackoffPolicy::max`]: the maximum delay cap;
/// - [`BackoffPolicy::jitter`]: randomization.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Initial delay before the first retry.
    pub first: Duration,
    /// Maximum delay cap for retries.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a constant policy: `first = 100ms`, `factor = 1.0`, `max = 30s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Exponential policy with the given bounds and no jitter.
    pub fn exponential(first: Duration, max: Duration) -> Self {
        Self {
            first,
            max,
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }

    /// Computes the delay for the given retry number (0-indexed).
    ///
    /// The base delay is `first × factor^retry`, clamped to [`BackoffPolicy::max`].
    /// Jitter is applied to the clamped base and never fed back into later
    /// calculations, so delays cannot shrink over time.
    pub fn next(&self, retry: u32) -> Duration {
        let exp = retry.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        self.jitter
            .apply_bounded(self.first.min(self.max), base, self.max)
    }

    /// Returns a factory of [`ExponentialBackoff`] sequences following this policy.
    pub fn factory(self) -> BackoffFactory {
        Arc::new(move || Box::new(ExponentialBackoff::new(self)) as Box<dyn Backoff>)
    }
}

/// [`Backoff`] walking a [`BackoffPolicy`] one retry at a time.
#[derive(Clone, Debug)]
pub struct ExponentialBackoff {
    policy: BackoffPolicy,
    retry: u32,
}

impl ExponentialBackoff {
    /// Starts a new sequence.
    pub fn new(policy: BackoffPolicy) -> Self {
        Self { policy, retry: 0 }
    }
}

impl Backoff for ExponentialBackoff {
    fn next_backoff(&mut self) -> Option<Duration> {
        let delay = self.policy.next(self.retry);
        self.retry = self.retry.saturating_add(1);
        Some(delay)
    }

    fn reset(&mut self) {
        self.retry = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exp(first_ms: u64, max: Duration) -> BackoffPolicy {
        BackoffPolicy::exponential(Duration::from_millis(first_ms), max)
    }

    #[test]
    fn test_exponential_growth_no_jitter() {
        let policy = exp(100, Duration::from_secs(30));
        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(3), Duration::from_millis(800));
    }

    #[test]
    fn test_default_is_constant() {
        let policy = BackoffPolicy::default();
        for retry in 0..10 {
            assert_eq!(policy.next(retry), Duration::from_millis(100));
        }
    }

    #[test]
    fn test_clamped_to_max_and_overflow() {
        let policy = exp(100, Duration::from_secs(1));
        assert_eq!(policy.next(10), Duration::from_secs(1));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(1));

        let first_too_big = BackoffPolicy {
            first: Duration::from_secs(10),
            ..exp(0, Duration::from_secs(5))
        };
        assert_eq!(first_too_big.next(0), Duration::from_secs(5));
    }

    #[test]
    fn test_equal_jitter_keeps_half() {
        let policy = BackoffPolicy {
            jitter: JitterPolicy::Equal,
            ..exp(100, Duration::from_secs(30))
        };
        for retry in 0..12 {
            let base_ms = (100.0 * 2.0f64.powi(retry as i32)).min(30_000.0);
            let delay = policy.next(retry);
            assert!(delay >= Duration::from_millis((base_ms / 2.0) as u64));
            assert!(delay <= Duration::from_millis(base_ms as u64));
        }
    }

    #[test]
    fn test_factory_yields_independent_sequences() {
        let factory = exp(10, Duration::from_secs(1)).factory();
        let mut a = factory();
        let mut b = factory();

        assert_eq!(a.next_backoff(), Some(Duration::from_millis(10)));
        assert_eq!(a.next_backoff(), Some(Duration::from_millis(20)));
        // `b` is untouched by `a`'s progress.
        assert_eq!(b.next_backoff(), Some(Duration::from_millis(10)));

        a.reset();
        assert_eq!(a.next_backoff(), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_constant_and_stop() {
        let mut c = (ConstantBackoff::factory(Duration::from_millis(5)))();
        assert_eq!(c.next_backoff(), Some(Duration::from_millis(5)));
        assert_eq!(c.next_backoff(), Some(Duration::from_millis(5)));

        let mut s = (StopBackoff::factory())();
        assert_eq!(s.next_backoff(), None);
    }
}
