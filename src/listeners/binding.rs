//! # Listener registration options and bindings.
//!
//! [`ListenerOptions`] customizes a single registration:
//! - **middleware**: wrappers applied around the listener (first added = outermost);
//! - **retry**: per-listener [`RetryPolicy`] overriding the pool-wide one.
//!
//! [`ListenerBinding`] bundles a pattern, a listener and its options so that
//! a set of registrations can be declared up front and handed to
//! [`EventPool::register_listeners`](crate::EventPool::register_listeners).
//!
//! ## Example
//! ```rust
//! use eventpool::{ListenerBinding, ListenerFn, ListenerOptions, Event};
//!
//! let binding = ListenerBinding::new("user.*")
//!     .listener(ListenerFn::arc(|_ev: Event| async { Ok(()) }))
//!     .options(ListenerOptions::new());
//! assert_eq!(binding.pattern(), "user.*");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::listeners::listener::{ListenerRef, Middleware};
use crate::policies::RetryPolicy;

/// Per-registration options.
#[derive(Clone, Default)]
pub struct ListenerOptions {
    middleware: Vec<Middleware>,
    retry: Option<RetryPolicy>,
}

impl ListenerOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a middleware. Middlewares added first run outermost.
    pub fn with_middleware<M>(mut self, mw: M) -> Self
    where
        M: Fn(ListenerRef) -> ListenerRef + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(mw));
        self
    }

    /// Overrides the pool-wide retry policy for this listener.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Per-listener retry override, if any.
    pub fn retry(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// Wraps `listener` with the configured middleware chain.
    pub(crate) fn wrap(&self, listener: ListenerRef) -> ListenerRef {
        self.middleware
            .iter()
            .rev()
            .fold(listener, |inner, mw| mw(inner))
    }
}

impl fmt::Debug for ListenerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerOptions")
            .field("middleware", &self.middleware.len())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Declarative listener registration.
#[derive(Clone)]
pub struct ListenerBinding {
    pattern: String,
    listener: Option<ListenerRef>,
    options: ListenerOptions,
}

impl ListenerBinding {
    /// Starts a binding for `pattern` without listener.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            listener: None,
            options: ListenerOptions::default(),
        }
    }

    /// Sets the listener.
    pub fn listener(mut self, listener: ListenerRef) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets registration options.
    pub fn options(mut self, options: ListenerOptions) -> Self {
        self.options = options;
        self
    }

    /// Subscription pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub(crate) fn into_parts(self) -> (String, Option<ListenerRef>, ListenerOptions) {
        (self.pattern, self.listener, self.options)
    }
}

impl fmt::Debug for ListenerBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerBinding")
            .field("pattern", &self.pattern)
            .field("has_listener", &self.listener.is_some())
            .field("options", &self.options)
            .finish()
    }
}
