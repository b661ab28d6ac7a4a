//! # Signal fan-out to subscribers.
//!
//! Each subscriber owns a bounded lane and a worker task draining it, so a slow
//! or crashing subscriber only affects itself.
//!
//! ```text
//! signal forwarder ──► SubscriberSet::emit(signal)
//!                        ├─ try_send ──► lane "log"    ──► worker ──► on_signal()
//!                        └─ try_send ──► lane "audit"  ──► worker ──► on_signal()
//!                                          │ full/closed       │ panic
//!                                          ▼                   ▼
//!                                  SubscriberOverflow   SubscriberPanicked   (back on the Bus)
//! ```
//!
//! Signals reach one subscriber in publish order; different subscribers drift
//! apart freely. An overflow signal that overflows itself is dropped silently.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use crate::error::panic_message;
use crate::signals::{Bus, Signal};
use crate::subscribers::Subscribe;

/// Sending half of one subscriber's queue.
struct Lane {
    subscriber: &'static str,
    tx: mpsc::Sender<Arc<Signal>>,
}

/// Subscribers of one pool, each behind its own bounded queue.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber; the queue holds at least one signal.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (lanes, workers): (Vec<Lane>, Vec<JoinHandle<()>>) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let lane = Lane {
                    subscriber: sub.name(),
                    tx,
                };
                (lane, tokio::spawn(drain_lane(sub, rx, bus.clone())))
            })
            .unzip();

        Self {
            lanes,
            workers,
            bus,
        }
    }

    /// Returns `true` if the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Queues `signal` for every subscriber without waiting.
    ///
    /// A subscriber whose queue is full or gone misses the signal and a
    /// `SubscriberOverflow` naming it is published instead.
    pub fn emit(&self, signal: Arc<Signal>) {
        for lane in &self.lanes {
            let reason = match lane.tx.try_send(Arc::clone(&signal)) {
                Ok(()) => continue,
                Err(TrySendError::Full(_)) => "full",
                Err(TrySendError::Closed(_)) => "closed",
            };
            if !signal.is_subscriber_overflow() {
                self.bus
                    .publish(Signal::subscriber_overflow(lane.subscriber, reason));
            }
        }
    }

    /// Closes every queue and waits until the workers have drained them.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn drain_lane(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Signal>>, bus: Bus) {
    while let Some(signal) = rx.recv().await {
        // A panicking subscriber may leave its own state inconsistent.
        let delivered = std::panic::AssertUnwindSafe(sub.on_signal(&signal))
            .catch_unwind()
            .await;
        if let Err(panic) = delivered {
            bus.publish(Signal::subscriber_panicked(sub.name(), panic_message(&*panic)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalKind;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    struct Recorder {
        seen: Mutex<Vec<SignalKind>>,
        capacity: usize,
    }

    impl Recorder {
        fn arc(capacity: usize) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::default(),
                capacity,
            })
        }
    }

    #[async_trait]
    impl Subscribe for Recorder {
        async fn on_signal(&self, signal: &Signal) {
            self.seen.lock().push(signal.kind);
        }
        fn name(&self) -> &'static str {
            "recorder"
        }
        fn queue_capacity(&self) -> usize {
            self.capacity
        }
    }

    struct Panicky;

    #[async_trait]
    impl Subscribe for Panicky {
        async fn on_signal(&self, _signal: &Signal) {
            panic!("subscriber exploded");
        }
        fn name(&self) -> &'static str {
            "panicky"
        }
    }

    #[tokio::test]
    async fn test_fan_out_and_panic_isolation() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let recorder = Recorder::arc(8);
        let set = SubscriberSet::new(
            vec![Arc::clone(&recorder) as Arc<dyn Subscribe>, Arc::new(Panicky)],
            bus.clone(),
        );

        set.emit(Arc::new(Signal::new(SignalKind::ListenerSucceeded)));
        set.emit(Arc::new(Signal::new(SignalKind::ListenerFailed)));
        set.shutdown().await;

        assert_eq!(
            *recorder.seen.lock(),
            vec![SignalKind::ListenerSucceeded, SignalKind::ListenerFailed]
        );
        let panicked = rx.recv().await.unwrap();
        assert_eq!(panicked.kind, SignalKind::SubscriberPanicked);
        assert_eq!(panicked.listener.as_deref(), Some("panicky"));
        assert_eq!(panicked.reason.as_deref(), Some("subscriber exploded"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_and_reports_overflow() {
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let recorder = Recorder::arc(1);
        let set = SubscriberSet::new(
            vec![Arc::clone(&recorder) as Arc<dyn Subscribe>],
            bus.clone(),
        );

        // The worker has not run yet: the second signal finds the queue full.
        set.emit(Arc::new(Signal::new(SignalKind::ListenerSucceeded)));
        set.emit(Arc::new(Signal::new(SignalKind::ListenerFailed)));

        let overflow = rx.recv().await.unwrap();
        assert_eq!(overflow.kind, SignalKind::SubscriberOverflow);
        assert_eq!(overflow.listener.as_deref(), Some("recorder"));
        assert_eq!(
            overflow.reason.as_deref(),
            Some("subscriber=recorder reason=full")
        );

        // Overflow of an overflow signal is not reported again.
        set.emit(Arc::new(Signal::subscriber_overflow("other", "full")));
        set.shutdown().await;

        assert!(rx.try_recv().is_err());
        assert_eq!(*recorder.seen.lock(), vec![SignalKind::ListenerSucceeded]);
    }
}
