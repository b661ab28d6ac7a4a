//! # Typed topics.
//!
//! The dispatcher only knows the untyped [`Event`] envelope. A [`TypedTopic<T>`]
//! pairs a topic name with two pure functions:
//! - `wrap: T → Event` used when emitting;
//! - `unwrap: &Event → Result<T, ListenerError>` used before calling a typed listener.
//!
//! Both are applied only at the registration/dispatch boundary. An unwrap
//! failure is returned as the listener's error (never a panic), so it surfaces
//! as a [`DispatchError::Listener`](crate::DispatchError::Listener) for that invocation.
//!
//! ## Example
//! ```rust
//! use eventpool::TypedTopic;
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct UserCreated { id: u64 }
//!
//! let topic = TypedTopic::<UserCreated>::new("user.created");
//! let ev = topic.wrap(UserCreated { id: 7 });
//! assert_eq!(ev.topic(), "user.created");
//! assert_eq!(topic.unwrap(&ev).unwrap(), UserCreated { id: 7 });
//! ```

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::ListenerError;
use crate::event::Event;
use crate::listeners::binding::ListenerBinding;
use crate::listeners::listener::{BoxListenerFuture, Listener, ListenerRef};

type WrapFn<T> = Arc<dyn Fn(&str, T) -> Event + Send + Sync>;
type UnwrapFn<T> = Arc<dyn Fn(&Event) -> Result<T, ListenerError> + Send + Sync>;

/// Topic name bound to a payload type.
pub struct TypedTopic<T> {
    name: Arc<str>,
    wrap: WrapFn<T>,
    unwrap: UnwrapFn<T>,
}

impl<T> Clone for TypedTopic<T> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            wrap: Arc::clone(&self.wrap),
            unwrap: Arc::clone(&self.unwrap),
        }
    }
}

impl<T> fmt::Debug for TypedTopic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedTopic")
            .field("name", &self.name)
            .field("payload", &type_name::<T>())
            .finish()
    }
}

impl<T: Clone + Send + Sync + 'static> TypedTopic<T> {
    /// Typed topic storing `T` directly as the event payload.
    ///
    /// Unwrap downcasts the payload and clones it out; any other payload type
    /// yields [`ListenerError::Decode`].
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self::with_codec(
            name,
            |topic, value| Event::new(topic.to_string(), value),
            |event| {
                event
                    .payload::<T>()
                    .cloned()
                    .ok_or_else(|| ListenerError::Decode {
                        topic: event.topic().to_string(),
                        expected: type_name::<T>(),
                    })
            },
        )
    }
}

impl<T: Send + 'static> TypedTopic<T> {
    /// Typed topic with custom conversion functions.
    ///
    /// `wrap` receives the topic name and the value.
    pub fn with_codec<W, U>(name: impl Into<Arc<str>>, wrap: W, unwrap: U) -> Self
    where
        W: Fn(&str, T) -> Event + Send + Sync + 'static,
        U: Fn(&Event) -> Result<T, ListenerError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            wrap: Arc::new(wrap),
            unwrap: Arc::new(unwrap),
        }
    }

    /// Topic name (may be a wildcard pattern when only used for subscribing).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Converts a value into an event on this topic.
    pub fn wrap(&self, value: T) -> Event {
        (self.wrap)(&self.name, value)
    }

    /// Converts an event back into a value.
    pub fn unwrap(&self, event: &Event) -> Result<T, ListenerError> {
        (self.unwrap)(event)
    }

    /// Builds an untyped listener calling `f` with the unwrapped value.
    pub fn listener<F, Fut>(&self, f: F) -> ListenerRef
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        Arc::new(TypedListener {
            unwrap: Arc::clone(&self.unwrap),
            f,
        })
    }

    /// Builds a binding of a typed listener to this topic.
    pub fn bind<F, Fut>(&self, f: F) -> ListenerBinding
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        ListenerBinding::new(self.name.as_ref()).listener(self.listener(f))
    }
}

/// Listener adapter applying `unwrap` before the typed callback.
struct TypedListener<T, F> {
    unwrap: UnwrapFn<T>,
    f: F,
}

impl<T, F, Fut> Listener for TypedListener<T, F>
where
    T: Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
{
    fn call(&self, event: Event) -> BoxListenerFuture {
        match (self.unwrap)(&event) {
            Ok(value) => Box::pin((self.f)(value)),
            Err(err) => Box::pin(async move { Err(err) }),
        }
    }
}
