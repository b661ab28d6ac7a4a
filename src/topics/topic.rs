//! # Topic: listeners registered under one subscription pattern.
//!
//! A [`Topic`] keeps its listeners in registration order behind a
//! `parking_lot::RwLock`. Dispatch takes a [`snapshot`](Topic::snapshot) so
//! that listeners added or removed during an emission do not affect it.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::EmitterError;
use crate::listeners::{ListenerId, ListenerRef};
use crate::policies::RetryPolicy;

/// A registered listener together with its per-listener settings.
#[derive(Clone)]
pub(crate) struct ListenerEntry {
    pub(crate) id: ListenerId,
    pub(crate) listener: ListenerRef,
    pub(crate) retry: Option<RetryPolicy>,
}

/// Named collection of listeners.
pub struct Topic {
    pattern: Arc<str>,
    listeners: RwLock<Vec<ListenerEntry>>,
}

impl Topic {
    pub(crate) fn new(pattern: impl Into<Arc<str>>) -> Self {
        Self {
            pattern: pattern.into(),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Subscription pattern of this topic.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Returns `true` if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Ids of registered listeners, in registration order.
    pub fn listener_ids(&self) -> Vec<ListenerId> {
        self.listeners
            .read()
            .iter()
            .map(|e| Arc::clone(&e.id))
            .collect()
    }

    pub(crate) fn add(&self, entry: ListenerEntry) -> Result<(), EmitterError> {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|e| e.id == entry.id) {
            return Err(EmitterError::DuplicateListener {
                topic: self.pattern.to_string(),
                listener: entry.id.to_string(),
            });
        }
        listeners.push(entry);
        Ok(())
    }

    pub(crate) fn remove(&self, id: &str) -> Result<(), EmitterError> {
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|e| &*e.id == id) {
            Some(idx) => {
                listeners.remove(idx);
                Ok(())
            }
            None => Err(EmitterError::ListenerNotFound {
                topic: self.pattern.to_string(),
                listener: id.to_string(),
            }),
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<ListenerEntry> {
        self.listeners.read().clone()
    }

    pub(crate) fn clear(&self) {
        self.listeners.write().clear();
    }
}

impl fmt::Debug for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("pattern", &self.pattern)
            .field("listeners", &self.len())
            .finish()
    }
}
