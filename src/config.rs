//! # Global dispatcher configuration.
//!
//! Provides [`Config`] centralized settings for an [`EventPool`](crate::EventPool).
//!
//! Config is consumed by [`EventPool::builder`](crate::EventPool::builder), which
//! derives the default worker pool, the default retry policy and the signal bus from it.
//!
//! ## Sentinel values
//! - `max_workers = 0` → unlimited (no semaphore created)
//! - `max_attempts = 0` → treated as `1` (no retry)
//! - `outcome_buffer = 0`, `bus_capacity = 0` → clamped to `1`

use crate::policies::{BackoffPolicy, RetryPolicy};

/// Configuration for an event pool.
///
/// ## Field semantics
/// - `max_workers`: Listener concurrency limit of the default worker pool (`0` = unlimited)
/// - `outcome_buffer`: Capacity of the channel returned by `emit` (min 1)
/// - `max_attempts`: Attempts per listener invocation (`1` = no retry)
/// - `backoff`: Delay strategy between attempts
/// - `bus_capacity`: Signal bus ring buffer size (min 1)
/// - `pool_name`: Label of the default worker pool (logs)
///
/// ## Notes
/// All fields are public. Prefer the helper accessors to avoid sprinkling
/// sentinel checks (`0`) across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum number of listener invocations running at once.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` invocations run simultaneously
    pub max_workers: usize,

    /// Capacity of the per-emission outcome channel.
    ///
    /// Once full, invocations wait to report their outcome until the
    /// receiver drains it.
    pub outcome_buffer: usize,

    /// Maximum attempts per listener invocation.
    pub max_attempts: u32,

    /// Backoff used between attempts when `max_attempts > 1`.
    pub backoff: BackoffPolicy,

    /// Capacity of the signal bus broadcast ring buffer.
    pub bus_capacity: usize,

    /// Name of the default worker pool.
    pub pool_name: String,
}

impl Config {
    /// Returns the worker concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited
    /// - `Some(n)` → at most `n` concurrent invocations
    #[inline]
    pub fn concurrency_limit(&self) -> Option<usize> {
        if self.max_workers == 0 {
            None
        } else {
            Some(self.max_workers)
        }
    }

    /// Returns the outcome channel capacity clamped to a minimum of 1.
    #[inline]
    pub fn outcome_buffer_clamped(&self) -> usize {
        self.outcome_buffer.max(1)
    }

    /// Returns the bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns the retry policy described by `max_attempts` and `backoff`,
    /// or `None` when only a single attempt is configured.
    pub fn retry_policy(&self) -> Option<RetryPolicy> {
        if self.max_attempts <= 1 {
            None
        } else {
            Some(RetryPolicy::new(self.max_attempts, self.backoff.factory()))
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `max_workers = 0` (unlimited)
    /// - `outcome_buffer = 10`
    /// - `max_attempts = 1` (no retry)
    /// - `backoff = BackoffPolicy::default()` (constant 100ms)
    /// - `bus_capacity = 1024`
    /// - `pool_name = "eventpool"`
    fn default() -> Self {
        Self {
            max_workers: 0,
            outcome_buffer: 10,
            max_attempts: 1,
            backoff: BackoffPolicy::default(),
            bus_capacity: 1024,
            pool_name: "eventpool".to_string(),
        }
    }
}
