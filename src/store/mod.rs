//! # Durability hooks.
//!
//! An [`EventStore`] attached with
//! [`EventPool::set_event_store`](crate::EventPool::set_event_store) is called:
//! - once per emission, **before** any listener runs ([`EventStore::save_event`]);
//! - once per listener invocation, **after** its final attempt
//!   ([`EventStore::save_handler_result`]); intermediate retry failures are not persisted.
//!
//! Persistence is best effort: a store error is reported through the pool's
//! error handler and a `StoreFailed` signal, but never fails or delays dispatch.
//!
//! ## Replay
//! ```text
//! EventStore::save_event ──► queue ──► EventQueue::dequeue_event ──► EventPool::replay_from
//!                                                                        └─► dispatch (no save)
//! ```
//! A store that also implements [`EventQueue`] can feed events back into a pool.
//! A pool replaying its own store only saves on `emit`; the consumer dispatches.
//! [`EventStore::handler_succeeded`] lets the dispatcher skip listeners that
//! already succeeded for a replayed event id.

mod memory;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{DispatchError, StoreError};
use crate::event::Event;

pub use memory::MemoryStore;

/// Persisted outcome of one listener for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResult {
    /// Published topic name.
    pub topic: String,
    /// Listener id.
    pub handler_id: String,
    /// Event id, if the event had one.
    pub event_id: Option<String>,
    /// Final error message, `None` on success.
    pub error: Option<String>,
}

impl StoredResult {
    /// Builds a record from an event, a listener id and the final outcome.
    pub fn new(event: &Event, handler_id: &str, error: Option<&DispatchError>) -> Self {
        Self {
            topic: event.topic().to_string(),
            handler_id: handler_id.to_string(),
            event_id: event.id().map(str::to_string),
            error: error.map(ToString::to_string),
        }
    }

    /// Returns `true` if the listener succeeded.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Pluggable durability hook for events and listener outcomes.
///
/// Implementations must tolerate concurrent calls from many worker tasks.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Persists an event before dispatch.
    async fn save_event(&self, event: &Event) -> Result<(), StoreError>;

    /// Persists the final outcome of one listener for one event.
    async fn save_handler_result(
        &self,
        event: &Event,
        handler_id: &str,
        error: Option<&DispatchError>,
    ) -> Result<(), StoreError>;

    /// Reports whether `handler_id` already succeeded for `event_id`.
    ///
    /// The default never deduplicates.
    async fn handler_succeeded(
        &self,
        _event_id: &str,
        _handler_id: &str,
    ) -> Result<bool, StoreError> {
        Ok(false)
    }
}

/// Queue-capable store used for replay.
#[async_trait]
pub trait EventQueue: Send + Sync + 'static {
    /// Waits for the next queued event.
    ///
    /// Returns `Ok(None)` once `cancel` fires or the queue is exhausted for good.
    async fn dequeue_event(&self, cancel: &CancellationToken) -> Result<Option<Event>, StoreError>;
}
