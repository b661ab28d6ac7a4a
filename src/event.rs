//! # Event envelope handed to listeners.
//!
//! An [`Event`] carries the published topic, a type-erased payload and metadata:
//! - `id`: unique event id (assigned by the pool's id generator when missing);
//! - `seq`: globally unique, monotonically increasing sequence number;
//! - `created_at`: wall-clock creation time;
//! - `correlation_id`: optional caller-supplied correlation id;
//! - `properties`: free-form string properties.
//!
//! Events are immutable once handed to the pool and cheap to clone (every
//! field is `Arc`-backed), so all listeners of one emission share the same data.
//!
//! ## Example
//! ```rust
//! use eventpool::Event;
//!
//! let ev = Event::new("user.created", 42u32)
//!     .with_correlation_id("req-7")
//!     .with_property("source", "signup");
//!
//! assert_eq!(ev.topic(), "user.created");
//! assert_eq!(ev.payload::<u32>(), Some(&42));
//! assert_eq!(ev.correlation_id(), Some("req-7"));
//! assert_eq!(ev.property("source"), Some("signup"));
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Type-erased, shareable payload.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Immutable event envelope.
#[derive(Clone)]
pub struct Event {
    seq: u64,
    created_at: SystemTime,
    topic: Arc<str>,
    payload: Option<Payload>,
    id: Option<Arc<str>>,
    correlation_id: Option<Arc<str>>,
    properties: Arc<BTreeMap<String, String>>,
}

impl Event {
    /// Creates an event with the given topic and payload.
    pub fn new<T: Any + Send + Sync>(topic: impl Into<Arc<str>>, payload: T) -> Self {
        Self::from_payload(topic, Some(Arc::new(payload)))
    }

    /// Creates an event without payload.
    pub fn empty(topic: impl Into<Arc<str>>) -> Self {
        Self::from_payload(topic, None)
    }

    /// Creates an event from an already type-erased payload.
    pub fn from_payload(topic: impl Into<Arc<str>>, payload: Option<Payload>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            created_at: SystemTime::now(),
            topic: topic.into(),
            payload,
            id: None,
            correlation_id: None,
            properties: Arc::new(BTreeMap::new()),
        }
    }

    /// Sets the event id.
    #[inline]
    pub fn with_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Sets the correlation id.
    #[inline]
    pub fn with_correlation_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Adds a string property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.properties).insert(key.into(), value.into());
        self
    }

    /// Returns a copy of the event bound to another topic, keeping payload and metadata.
    pub(crate) fn retarget(&self, topic: impl Into<Arc<str>>) -> Self {
        Self {
            topic: topic.into(),
            ..self.clone()
        }
    }

    /// Published topic name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Downcasts the payload to `T`.
    pub fn payload<T: Any>(&self) -> Option<&T> {
        self.payload.as_deref()?.downcast_ref::<T>()
    }

    /// Returns the type-erased payload.
    pub fn raw_payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    /// Event id, if assigned.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Correlation id, if any.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Looks up a property.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }

    /// All properties, sorted by key.
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// Global sequence number.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Wall-clock creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("seq", &self.seq)
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("correlation_id", &self.correlation_id)
            .field("has_payload", &self.payload.is_some())
            .field("properties", &self.properties)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_downcast() {
        let ev = Event::new("a.b", String::from("hello"));
        assert_eq!(ev.payload::<String>().map(String::as_str), Some("hello"));
        assert!(ev.payload::<u32>().is_none());
        assert!(Event::empty("a").payload::<String>().is_none());
    }

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::empty("x");
        let b = Event::empty("x");
        assert!(b.seq() > a.seq());
    }

    #[test]
    fn test_clone_shares_properties_and_retarget_keeps_metadata() {
        let ev = Event::new("a", 1u8).with_id("e-1").with_property("k", "v");
        let moved = ev.retarget("b");
        assert_eq!(moved.topic(), "b");
        assert_eq!(moved.id(), Some("e-1"));
        assert_eq!(moved.property("k"), Some("v"));
        assert_eq!(moved.seq(), ev.seq());
    }
}
