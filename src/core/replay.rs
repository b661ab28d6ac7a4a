//! # Store-backed replay.
//!
//! [`EventPool::replay_from`] spawns a consumer that pulls events from an
//! [`EventQueue`] and dispatches each of them on the pool. Replayed events are
//! never saved again.
//!
//! ## Flow
//! ```text
//! loop:
//!   queue.dequeue_event(runtime_token)
//!     ├─ Ok(Some(event)) → dispatch without save_event  (one event at a time)
//!     ├─ Ok(None)        → stop (cancelled or exhausted)
//!     └─ Err(e)          → warn, sleep(backoff), retry
//! ```
//!
//! ## Rules
//! - The consumer holds only a weak handle: dropping every `EventPool` clone ends it.
//! - It stops on close (the pool's runtime token is cancelled).
//! - When `queue` is the pool's attached store, `emit` only saves the event and
//!   this consumer dispatches it, so each listener runs once per event.
//! - A queue owned by another pool is a log: that pool dispatches inline and
//!   this one dispatches the same events to its own listeners.
//! - Dequeue failures back off exponentially (100ms doubling up to 5s) and reset on success.

use std::sync::Arc;
use std::time::Duration;

use crate::core::event_pool::EventPool;
use crate::error::EmitterError;
use crate::policies::{Backoff, BackoffPolicy, ExponentialBackoff};
use crate::store::EventQueue;

impl EventPool {
    /// Starts dispatching events dequeued from `queue` until the pool closes.
    ///
    /// ### Errors
    /// [`EmitterError::EmitterClosed`] if the pool is already closed.
    ///
    /// ### Notes
    /// Must be called from within a tokio runtime. Listener errors of replayed
    /// events only surface through the error handler and signals.
    pub fn replay_from(&self, queue: Arc<dyn EventQueue>) -> Result<(), EmitterError> {
        if self.is_closed() {
            return Err(EmitterError::EmitterClosed);
        }

        let queue_ptr = Arc::as_ptr(&queue).cast::<()>();
        let own_store = self
            .attached_store()
            .is_some_and(|store| Arc::as_ptr(&store).cast::<()>() == queue_ptr);
        if own_store {
            self.set_replaying_own_store();
        }

        let weak = self.downgrade();
        let token = self.inner.runtime_token.clone();
        let mut backoff = ExponentialBackoff::new(BackoffPolicy::exponential(
            Duration::from_millis(100),
            Duration::from_secs(5),
        ));

        self.inner.dispatchers.spawn(async move {
            while !token.is_cancelled() {
                match queue.dequeue_event(&token).await {
                    Ok(Some(event)) => {
                        backoff.reset();
                        let Some(inner) = weak.upgrade() else { break };
                        let errors = EventPool::from_inner(inner).dispatch_replayed(event).await;
                        if !errors.is_empty() {
                            tracing::debug!(target: "eventpool", failed = errors.len(), "replayed event had failing listeners");
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        let delay = backoff.next_backoff().unwrap_or(Duration::from_secs(5));
                        tracing::warn!(target: "eventpool", error = %e, delay_ms = delay.as_millis() as u64, "dequeue failed");
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
            tracing::debug!(target: "eventpool", "replay consumer stopped");
        });
        Ok(())
    }
}
