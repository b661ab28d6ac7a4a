//! # Core subscriber trait
//!
//! `Subscribe` is the extension point for plugging custom signal handlers into
//! an [`EventPool`](crate::EventPool). Each subscriber is driven by a dedicated
//! worker loop fed by a bounded queue owned by the
//! [`SubscriberSet`](crate::subscribers::SubscriberSet).
//!
//! ## Contract
//! - Implementations may be slow (I/O, batching) and do **not** block the
//!   dispatcher nor other subscribers.
//! - Each subscriber **declares** its preferred queue capacity via
//!   [`Subscribe::queue_capacity`]. If a queue overflows, signals for that
//!   subscriber are **dropped** and a `SubscriberOverflow` signal is published.

use async_trait::async_trait;

use crate::signals::Signal;

/// Contract for signal subscribers.
///
/// Called from a subscriber-dedicated worker task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Handle a single signal for this subscriber.
    async fn on_signal(&self, signal: &Signal);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this subscriber's queue.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
