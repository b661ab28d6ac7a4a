//! # Signal bus for broadcasting dispatcher signals.
//!
//! [`Bus`] is a thin wrapper around [`tokio::sync::broadcast`] that provides
//! non-blocking signal publishing from many sources (worker pool tasks,
//! the emit path, subscriber workers).
//!
//! ## Architecture
//! ```text
//! Publishers (many):                   Receivers:
//!   dispatch task 1 ──┐
//!   dispatch task 2 ──┼──────► Bus ──┬──► signal forwarder ───► SubscriberSet
//!   EventPool       ──┤  (broadcast) └──► EventPool::signals() receivers
//!   SubscriberSet   ──┘
//! ```
//!
//! ## Rules
//! - **Non-blocking publish**: `publish()` never blocks; it calls `broadcast::Sender::send`.
//! - **Bounded capacity**: a single ring buffer stores recent signals for all receivers.
//! - **Lag handling**: slow receivers get `RecvError::Lagged(n)` and skip `n` oldest items.
//! - **No persistence**: signals are lost if there are no active receivers at send time.

use tokio::sync::broadcast;

use super::signal::Signal;

/// Broadcast channel for dispatcher signals.
///
/// ### Properties
/// - **Non-blocking**: `publish()` returns immediately.
/// - **Fire-and-forget**: no delivery or durability guarantees.
/// - **Cloneable**: cheap to clone (internally holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Signal>,
}

impl Bus {
    /// Creates a new bus with the given channel capacity.
    ///
    /// ### Notes
    /// - Capacity is **shared** across all receivers (not per-receiver).
    /// - The minimum capacity is 1 (clamped).
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Signal>(capacity.max(1));
        Self { tx }
    }

    /// Publishes a signal to all active receivers.
    ///
    /// If there are no receivers, the signal is dropped.
    pub fn publish(&self, signal: Signal) {
        let _ = self.tx.send(signal);
    }

    /// Creates a new receiver that will observe subsequent signals.
    pub fn subscribe(&self) -> broadcast::Receiver<Signal> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalKind;

    #[tokio::test]
    async fn test_publish_reaches_every_receiver() {
        let bus = Bus::new(0);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(Signal::new(SignalKind::PoolClosed).with_pool("p"));

        assert_eq!(a.recv().await.unwrap().kind, SignalKind::PoolClosed);
        assert_eq!(b.recv().await.unwrap().pool.as_deref(), Some("p"));
    }

    #[test]
    fn test_publish_without_receivers_is_noop() {
        Bus::new(4).publish(Signal::new(SignalKind::PoolClosed));
    }
}
