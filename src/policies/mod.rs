//! Retry and backoff policies.
//!
//! This module groups the knobs that control **whether** a failed listener
//! invocation is attempted again and **how long** to wait between attempts.
//!
//! ## Contents
//! - [`RetryPolicy`] bounded attempts around one listener invocation
//! - [`Backoff`] / [`BackoffFactory`] stateful delay generators, one per retry sequence
//! - [`BackoffPolicy`] how retry delays evolve (first / factor / max + jitter)
//! - [`JitterPolicy`] randomization strategy to avoid synchronized retries
//!
//! ## Quick wiring
//! ```text
//! EventPool::set_retry(RetryPolicy::new(max_attempts, factory))
//!      └─► core::dispatch wraps each listener call:
//!           - RetryPolicy::run(...) loops attempts
//!           - factory() gives a fresh Backoff per invocation
//!           - Backoff::next_backoff() schedules the next attempt
//! ```
//!
//! ## Defaults
//! - No retry (`Config::max_attempts = 1`).
//! - `BackoffPolicy::default()` → first=100ms, factor=1.0 (constant), max=30s, jitter=None.

mod backoff;
mod jitter;
mod retry;

pub use backoff::{
    Backoff, BackoffFactory, BackoffPolicy, ConstantBackoff, ExponentialBackoff, StopBackoff,
};
pub use jitter::JitterPolicy;
pub use retry::RetryPolicy;
