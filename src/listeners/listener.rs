//! # Listener abstraction.
//!
//! A [`Listener`] receives an [`Event`] and produces a future resolving to
//! `Result<(), ListenerError>`. The common handle type is [`ListenerRef`], an
//! `Arc<dyn Listener>` shared between the topic registry and in-flight invocations.
//!
//! ## Rules
//! - Every [`Listener::call`] creates a **new** future (one per attempt).
//! - Listeners may be invoked concurrently for different events.
//! - A panic inside a listener is recovered by the dispatcher and reported as
//!   [`DispatchError::Panicked`](crate::DispatchError::Panicked).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ListenerError;
use crate::event::Event;

/// Boxed future returned by [`Listener::call`].
pub type BoxListenerFuture = Pin<Box<dyn Future<Output = Result<(), ListenerError>> + Send + 'static>>;

/// Shared handle to a listener.
pub type ListenerRef = Arc<dyn Listener>;

/// Identifier of a registered listener, unique within its topic.
pub type ListenerId = Arc<str>;

/// Wraps a listener into another one (logging, metrics, auth checks, ...).
pub type Middleware = Arc<dyn Fn(ListenerRef) -> ListenerRef + Send + Sync>;

/// # Asynchronous event handler.
///
/// # Example
/// ```
/// use eventpool::{BoxListenerFuture, Event, Listener};
///
/// struct Audit;
///
/// impl Listener for Audit {
///     fn call(&self, event: Event) -> BoxListenerFuture {
///         Box::pin(async move {
///             let _ = event.topic();
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Listener: Send + Sync + 'static {
    /// Handles one event.
    fn call(&self, event: Event) -> BoxListenerFuture;
}
