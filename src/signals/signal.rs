//! # Signals emitted by the dispatcher.
//!
//! The [`SignalKind`] enum classifies signals across three categories:
//! - **Listener signals**: outcome of one listener invocation (succeeded, failed, panicked, retry)
//! - **Pool signals**: persistence failures, rejected emissions, pool closed
//! - **Subscriber signals**: observer workers that panicked or overflowed
//!
//! The [`Signal`] struct carries additional metadata such as timestamps, topic,
//! listener id, attempt counters and reasons.
//!
//! ## Ordering guarantees
//! Each signal has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when signals are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use eventpool::{Signal, SignalKind};
//!
//! let s = Signal::new(SignalKind::RetryScheduled)
//!     .with_topic("user.created")
//!     .with_listener("l-1")
//!     .with_attempt(2)
//!     .with_delay(Duration::from_millis(250));
//!
//! assert_eq!(s.kind, SignalKind::RetryScheduled);
//! assert_eq!(s.listener.as_deref(), Some("l-1"));
//! assert_eq!(s.delay_ms, Some(250));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for signal ordering.
static SIGNAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of dispatcher signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    // === Listener signals ===
    /// Listener invocation finished successfully (possibly after retries).
    ///
    /// Sets:
    /// - `topic`, `listener`, `attempt` (attempts used)
    ListenerSucceeded,

    /// Listener invocation finished with an error (after retries, if any).
    ///
    /// Sets:
    /// - `topic`, `listener`, `attempt`
    /// - `reason`: error message
    ListenerFailed,

    /// Listener panicked; the panic was recovered.
    ///
    /// Sets:
    /// - `topic`, `listener`
    /// - `reason`: panic message
    ListenerPanicked,

    /// Next attempt of a failed listener invocation scheduled.
    ///
    /// Sets:
    /// - `topic`, `listener`
    /// - `attempt`: failed attempt number
    /// - `delay_ms`: delay before the next attempt
    /// - `reason`: error of the failed attempt
    RetryScheduled,

    // === Pool signals ===
    /// Event store refused to persist an event or handler result.
    ///
    /// Sets:
    /// - `topic`, `listener` (for handler results)
    /// - `reason`: store error message
    StoreFailed,

    /// Emission rejected as a whole (pool closed or invalid name).
    ///
    /// Sets:
    /// - `topic`: published name
    /// - `reason`: rejection reason
    EmitRejected,

    /// Pool closed (drained or abandoned).
    ///
    /// Sets:
    /// - `pool`: pool name
    /// - `reason`: shutdown mode
    PoolClosed,

    // === Subscriber signals ===
    /// Subscriber panicked during signal processing.
    ///
    /// Sets:
    /// - `listener`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped a signal (queue full or worker closed).
    ///
    /// Sets:
    /// - `listener`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,
}

impl SignalKind {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SignalKind::ListenerSucceeded => "listener_succeeded",
            SignalKind::ListenerFailed => "listener_failed",
            SignalKind::ListenerPanicked => "listener_panicked",
            SignalKind::RetryScheduled => "retry_scheduled",
            SignalKind::StoreFailed => "store_failed",
            SignalKind::EmitRejected => "emit_rejected",
            SignalKind::PoolClosed => "pool_closed",
            SignalKind::SubscriberPanicked => "subscriber_panicked",
            SignalKind::SubscriberOverflow => "subscriber_overflow",
        }
    }
}

/// Dispatcher signal with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`SignalKind`]
#[derive(Debug, Clone)]
pub struct Signal {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Signal classification.
    pub kind: SignalKind,

    /// Name of the pool, if applicable.
    pub pool: Option<Arc<str>>,
    /// Published topic name, if applicable.
    pub topic: Option<Arc<str>>,
    /// Listener id (or subscriber name for subscriber signals).
    pub listener: Option<Arc<str>>,
    /// Attempt count (starting from 1).
    pub attempt: Option<u32>,
    /// Backoff delay before next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
}

impl Signal {
    /// Creates a new signal of the given kind with current timestamp and next sequence number.
    pub fn new(kind: SignalKind) -> Self {
        Self {
            seq: SIGNAL_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            pool: None,
            topic: None,
            listener: None,
            attempt: None,
            delay_ms: None,
            reason: None,
        }
    }

    /// Attaches a pool name.
    #[inline]
    pub fn with_pool(mut self, pool: impl Into<Arc<str>>) -> Self {
        self.pool = Some(pool.into());
        self
    }

    /// Attaches a topic name.
    #[inline]
    pub fn with_topic(mut self, topic: impl Into<Arc<str>>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Attaches a listener id.
    #[inline]
    pub fn with_listener(mut self, listener: impl Into<Arc<str>>) -> Self {
        self.listener = Some(listener.into());
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow signal.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Signal::new(SignalKind::SubscriberOverflow)
            .with_listener(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic signal.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Signal::new(SignalKind::SubscriberPanicked)
            .with_listener(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, SignalKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Signal::new(SignalKind::PoolClosed);
        let b = Signal::new(SignalKind::PoolClosed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates() {
        let s = Signal::new(SignalKind::RetryScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(s.delay_ms, Some(u32::MAX));
    }

    #[test]
    fn test_subscriber_helpers() {
        let s = Signal::subscriber_overflow("audit", "full");
        assert!(s.is_subscriber_overflow());
        assert_eq!(s.listener.as_deref(), Some("audit"));
        assert_eq!(
            s.reason.as_deref(),
            Some("subscriber=audit reason=full")
        );
        assert_eq!(
            Signal::subscriber_panicked("audit", "boom".into()).kind.as_label(),
            "subscriber_panicked"
        );
    }
}
