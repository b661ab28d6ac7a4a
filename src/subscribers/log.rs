//! # LogWriter: signal renderer on top of `tracing`.
//!
//! A minimal subscriber that forwards incoming [`Signal`]s to `tracing`
//! (target `eventpool`). Successes and retries are `debug`, failures are
//! `warn`, panics are `error`.
//!
//! ## Example output (with `tracing-subscriber` fmt layer)
//! ```text
//! DEBUG eventpool: listener succeeded topic="order.paid" listener="3f0c..." attempt=1
//! WARN  eventpool: retry scheduled topic="order.paid" listener="3f0c..." attempt=1 delay_ms=100 reason="error: db down"
//! WARN  eventpool: listener failed topic="order.paid" listener="3f0c..." attempt=3 reason="error: db down"
//! ERROR eventpool: listener panicked topic="order.paid" listener="9a1e..." reason="index out of bounds"
//! INFO  eventpool: pool closed pool="orders" reason="drain"
//! ```

use async_trait::async_trait;

use crate::signals::{Signal, SignalKind};
use crate::subscribers::Subscribe;

/// Signal writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_signal(&self, s: &Signal) {
        let topic = s.topic.as_deref().unwrap_or("-");
        let listener = s.listener.as_deref().unwrap_or("-");
        let reason = s.reason.as_deref().unwrap_or("");

        match s.kind {
            SignalKind::ListenerSucceeded => {
                tracing::debug!(target: "eventpool", topic, listener, attempt = ?s.attempt, "listener succeeded");
            }
            SignalKind::ListenerFailed => {
                tracing::warn!(target: "eventpool", topic, listener, attempt = ?s.attempt, reason, "listener failed");
            }
            SignalKind::ListenerPanicked => {
                tracing::error!(target: "eventpool", topic, listener, reason, "listener panicked");
            }
            SignalKind::RetryScheduled => {
                tracing::warn!(
                    target: "eventpool",
                    topic,
                    listener,
                    attempt = ?s.attempt,
                    delay_ms = ?s.delay_ms,
                    reason,
                    "retry scheduled"
                );
            }
            SignalKind::StoreFailed => {
                tracing::warn!(target: "eventpool", topic, listener, reason, "store failed");
            }
            SignalKind::EmitRejected => {
                tracing::warn!(target: "eventpool", topic, reason, "emit rejected");
            }
            SignalKind::PoolClosed => {
                tracing::info!(target: "eventpool", pool = ?s.pool, reason, "pool closed");
            }
            SignalKind::SubscriberPanicked => {
                tracing::error!(target: "eventpool", subscriber = listener, reason, "subscriber panicked");
            }
            SignalKind::SubscriberOverflow => {
                tracing::warn!(target: "eventpool", subscriber = listener, reason, "subscriber overflow");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
