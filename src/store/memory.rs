//! # In-memory event store.
//!
//! [`MemoryStore`] keeps every saved event and handler result behind a single
//! mutex. Created with [`MemoryStore::queued`], it also pushes each saved event
//! onto a FIFO queue drained through [`EventQueue::dequeue_event`].
//!
//! ## Rules
//! - Handler results are appended in completion order.
//! - Only successful results are remembered for [`EventStore::handler_succeeded`].
//! - After [`MemoryStore::close`], saves fail with [`StoreError::Closed`] and
//!   `dequeue_event` returns `Ok(None)` once the queue is empty.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::{EventQueue, EventStore, StoredResult};
use crate::error::{DispatchError, StoreError};
use crate::event::Event;

#[derive(Default)]
struct State {
    events: Vec<Event>,
    results: Vec<StoredResult>,
    succeeded: HashSet<(String, String)>,
    queue: VecDeque<Event>,
}

/// Mutex-guarded in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    queued: bool,
    closed: AtomicBool,
    ready: Notify,
}

impl MemoryStore {
    /// Creates a store that only records events and results.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that also enqueues every saved event for replay.
    pub fn queued() -> Self {
        Self {
            queued: true,
            ..Self::default()
        }
    }

    /// Snapshot of saved events, in save order.
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    /// Snapshot of saved handler results, in completion order.
    pub fn results(&self) -> Vec<StoredResult> {
        self.state.lock().results.clone()
    }

    /// Number of events waiting in the replay queue.
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Rejects further saves and wakes queue consumers.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.ready.notify_waiters();
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MemoryStore")
            .field("events", &state.events.len())
            .field("results", &state.results.len())
            .field("queued", &state.queue.len())
            .finish()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn save_event(&self, event: &Event) -> Result<(), StoreError> {
        self.ensure_open()?;
        {
            let mut state = self.state.lock();
            state.events.push(event.clone());
            if self.queued {
                state.queue.push_back(event.clone());
            }
        }
        if self.queued {
            self.ready.notify_waiters();
        }
        Ok(())
    }

    async fn save_handler_result(
        &self,
        event: &Event,
        handler_id: &str,
        error: Option<&DispatchError>,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let result = StoredResult::new(event, handler_id, error);

        let mut state = self.state.lock();
        if let (true, Some(event_id)) = (result.is_success(), &result.event_id) {
            state
                .succeeded
                .insert((event_id.clone(), handler_id.to_string()));
        }
        state.results.push(result);
        Ok(())
    }

    async fn handler_succeeded(&self, event_id: &str, handler_id: &str) -> Result<bool, StoreError> {
        if event_id.trim().is_empty() || handler_id.trim().is_empty() {
            return Ok(false);
        }
        let state = self.state.lock();
        Ok(state
            .succeeded
            .contains(&(event_id.to_string(), handler_id.to_string())))
    }
}

#[async_trait]
impl EventQueue for MemoryStore {
    async fn dequeue_event(&self, cancel: &CancellationToken) -> Result<Option<Event>, StoreError> {
        if !self.queued {
            return Ok(None);
        }

        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(event) = self.state.lock().queue.pop_front() {
                return Ok(Some(event));
            }
            if self.closed.load(Ordering::Acquire) {
                return Ok(None);
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                _ = &mut notified => {}
            }
        }
    }
}
