//! # Listener abstractions and registrations.
//!
//! This module provides the listener-related types:
//! - [`Listener`] - trait for async event handlers
//! - [`ListenerFn`] - closure-backed listener
//! - [`ListenerRef`] / [`ListenerId`] - shared handle and registration id
//! - [`ListenerOptions`] / [`ListenerBinding`] - per-registration options, declarative bindings
//! - [`TypedTopic`] - strongly-typed wrap/unwrap boundary over the untyped [`Event`](crate::Event)

mod binding;
mod listener;
mod listener_fn;
mod typed;

pub use binding::{ListenerBinding, ListenerOptions};
pub use listener::{BoxListenerFuture, Listener, ListenerId, ListenerRef, Middleware};
pub use listener_fn::ListenerFn;
pub use typed::TypedTopic;
