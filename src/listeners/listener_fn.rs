//! # Function-backed listener (`ListenerFn`)
//!
//! [`ListenerFn`] wraps a closure `F: Fn(Event) -> Fut`, producing a fresh
//! future per call. State shared between calls must be captured explicitly
//! (e.g. `Arc<AtomicU32>`).
//!
//! ## Example
//! ```rust
//! use eventpool::{ListenerFn, ListenerRef, Event, ListenerError};
//!
//! let l: ListenerRef = ListenerFn::arc(|ev: Event| async move {
//!     if ev.topic().is_empty() {
//!         return Err(ListenerError::fatal("no topic"));
//!     }
//!     Ok(())
//! });
//! # let _ = l;
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::error::ListenerError;
use crate::event::Event;
use crate::listeners::listener::{BoxListenerFuture, Listener};

/// Function-backed listener implementation.
#[derive(Debug, Clone)]
pub struct ListenerFn<F> {
    f: F,
}

impl<F, Fut> ListenerFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
{
    /// Creates a new function-backed listener.
    pub fn new(f: F) -> Self {
        Self { f }
    }

    /// Creates the listener and returns it as a shared handle.
    ///
    /// Prefer this when you immediately need a [`ListenerRef`](crate::ListenerRef).
    pub fn arc(f: F) -> Arc<Self> {
        Arc::new(Self::new(f))
    }
}

impl<F, Fut> Listener for ListenerFn<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
{
    fn call(&self, event: Event) -> BoxListenerFuture {
        Box::pin((self.f)(event))
    }
}
