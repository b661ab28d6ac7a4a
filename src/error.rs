//! Error types used by the dispatcher, its listeners and its collaborators.
//!
//! This module defines the error enums of the crate:
//!
//! - [`EmitterError`]: pool-wide operation errors returned synchronously to the caller
//!   (registration, removal, lookup, lifecycle).
//! - [`ListenerError`]: errors returned by listener code.
//! - [`DispatchError`]: the per-listener outcome of one emission.
//! - [`StoreError`]: failures of an attached [`EventStore`](crate::EventStore).
//! - [`SubmitError`]: a worker pool refusing new work.
//!
//! All of them provide `as_label` (stable snake_case label for logs/metrics).

use std::sync::Arc;

use thiserror::Error;

/// # Errors produced by pool-wide operations.
///
/// Returned synchronously by registration, removal and lifecycle calls on
/// [`EventPool`](crate::EventPool).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitterError {
    /// Topic name or pattern is syntactically invalid.
    #[error("invalid topic name {topic:?}: {reason}")]
    InvalidTopicName {
        /// The offending name, as given.
        topic: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A listener binding was registered without a listener.
    #[error("listener is missing")]
    NilListener,

    /// Topic was never created or was removed by close.
    #[error("unable to find topic {topic:?}")]
    TopicNotFound {
        /// Requested topic name.
        topic: String,
    },

    /// Listener id is not registered on the topic.
    #[error("listener {listener:?} not found on topic {topic:?}")]
    ListenerNotFound {
        /// Topic the removal was addressed to.
        topic: String,
        /// Unknown listener id.
        listener: String,
    },

    /// Listener id already registered on the topic.
    #[error("listener {listener:?} already registered on topic {topic:?}")]
    DuplicateListener {
        /// Topic of the registration.
        topic: String,
        /// Colliding listener id.
        listener: String,
    },

    /// The pool is closed and accepts no new topics or emissions.
    #[error("emitter is closed")]
    EmitterClosed,

    /// Close was called on an already closed pool.
    #[error("emitter is already closed")]
    AlreadyClosed,
}

impl EmitterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventpool::EmitterError;
    ///
    /// assert_eq!(EmitterError::EmitterClosed.as_label(), "emitter_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EmitterError::InvalidTopicName { .. } => "invalid_topic_name",
            EmitterError::NilListener => "nil_listener",
            EmitterError::TopicNotFound { .. } => "topic_not_found",
            EmitterError::ListenerNotFound { .. } => "listener_not_found",
            EmitterError::DuplicateListener { .. } => "duplicate_listener",
            EmitterError::EmitterClosed => "emitter_closed",
            EmitterError::AlreadyClosed => "emitter_already_closed",
        }
    }
}

/// # Errors returned by listener code.
///
/// Some errors are retryable (`Fail`), others are final regardless of the
/// configured retry policy.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ListenerError {
    /// Listener failed but may succeed if retried.
    #[error("listener failed: {reason}")]
    Fail {
        /// The underlying error message.
        reason: String,
    },

    /// Non-recoverable error (never retried).
    #[error("fatal listener error (no retry): {reason}")]
    Fatal {
        /// The underlying error message.
        reason: String,
    },

    /// Typed unwrap could not turn the event into the listener's payload type.
    #[error("cannot decode payload of topic {topic:?} as {expected}")]
    Decode {
        /// Topic of the event that failed to decode.
        topic: String,
        /// Name of the expected payload type.
        expected: &'static str,
    },
}

impl ListenerError {
    /// Shorthand for [`ListenerError::Fail`].
    pub fn fail(reason: impl std::fmt::Display) -> Self {
        ListenerError::Fail {
            reason: reason.to_string(),
        }
    }

    /// Shorthand for [`ListenerError::Fatal`].
    pub fn fatal(reason: impl std::fmt::Display) -> Self {
        ListenerError::Fatal {
            reason: reason.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ListenerError::Fail { .. } => "listener_failed",
            ListenerError::Fatal { .. } => "listener_fatal",
            ListenerError::Decode { .. } => "listener_decode",
        }
    }

    /// Returns a compact human-readable message (without the variant prefix used by `Display`).
    pub fn as_message(&self) -> String {
        match self {
            ListenerError::Fail { reason } => format!("error: {reason}"),
            ListenerError::Fatal { reason } => format!("fatal: {reason}"),
            ListenerError::Decode { topic, expected } => {
                format!("decode: {topic} as {expected}")
            }
        }
    }

    /// Indicates whether the error is safe to retry.
    ///
    /// Returns `true` only for [`ListenerError::Fail`].
    ///
    /// # Example
    /// ```
    /// use eventpool::ListenerError;
    ///
    /// assert!(ListenerError::fail("boom").is_retryable());
    /// assert!(!ListenerError::fatal("nope").is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, ListenerError::Fail { .. })
    }
}

/// # Outcome of one failed listener invocation.
///
/// One value is produced per matched listener per emission (or a single
/// value for an emission rejected as a whole).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The pool is closed; nothing was dispatched.
    #[error("emitter is closed")]
    EmitterClosed,

    /// The published name is not a valid concrete topic.
    #[error("invalid topic {topic:?}: {reason}")]
    InvalidTopic {
        /// Published name.
        topic: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The listener returned an error (after retries, if any).
    #[error("listener {listener}: {error}")]
    Listener {
        /// Listener id.
        listener: Arc<str>,
        /// Last error returned by the listener.
        #[source]
        error: ListenerError,
    },

    /// The listener panicked; the panic was recovered.
    #[error("listener {listener} panicked: {info}")]
    Panicked {
        /// Listener id.
        listener: Arc<str>,
        /// Panic message, if it could be extracted.
        info: String,
    },

    /// The worker pool refused the invocation (pool released or stopped).
    #[error("listener {listener} rejected by worker pool")]
    Rejected {
        /// Listener id.
        listener: Arc<str>,
    },

    /// The attached event store failed; dispatch went on regardless.
    ///
    /// Only ever handed to the error handler, never to outcome channels.
    #[error("event store failed: {error}")]
    Store {
        /// Listener id, when saving a handler result failed.
        listener: Option<Arc<str>>,
        /// Store failure.
        #[source]
        error: StoreError,
    },
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use eventpool::{DispatchError, ListenerError};
    ///
    /// let err = DispatchError::Listener { listener: "l-1".into(), error: ListenerError::fail("x") };
    /// assert_eq!(err.as_label(), "dispatch_listener_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::EmitterClosed => "dispatch_emitter_closed",
            DispatchError::InvalidTopic { .. } => "dispatch_invalid_topic",
            DispatchError::Listener { .. } => "dispatch_listener_failed",
            DispatchError::Panicked { .. } => "dispatch_listener_panicked",
            DispatchError::Rejected { .. } => "dispatch_rejected",
            DispatchError::Store { .. } => "dispatch_store_failed",
        }
    }

    /// Returns a compact human-readable message, used as signal reason.
    pub fn as_message(&self) -> String {
        match self {
            DispatchError::EmitterClosed => "emitter closed".to_string(),
            DispatchError::InvalidTopic { topic, reason } => {
                format!("invalid topic {topic}: {reason}")
            }
            DispatchError::Listener { error, .. } => error.as_message(),
            DispatchError::Panicked { info, .. } => format!("panic: {info}"),
            DispatchError::Rejected { .. } => "rejected by worker pool".to_string(),
            DispatchError::Store { error, .. } => format!("store: {error}"),
        }
    }

    /// Returns the listener id this outcome belongs to, if any.
    pub fn listener(&self) -> Option<&str> {
        match self {
            DispatchError::Listener { listener, .. }
            | DispatchError::Panicked { listener, .. }
            | DispatchError::Rejected { listener } => Some(listener),
            DispatchError::Store { listener, .. } => listener.as_deref(),
            _ => None,
        }
    }

    /// Returns `true` if the outcome comes from a recovered panic.
    pub fn is_panic(&self) -> bool {
        matches!(self, DispatchError::Panicked { .. })
    }
}

impl From<EmitterError> for DispatchError {
    fn from(err: EmitterError) -> Self {
        match err {
            EmitterError::InvalidTopicName { topic, reason } => {
                DispatchError::InvalidTopic { topic, reason }
            }
            _ => DispatchError::EmitterClosed,
        }
    }
}

/// # Errors produced by event stores.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store (or its queue) has been closed.
    #[error("store is closed")]
    Closed,

    /// Backend-specific failure.
    #[error("store backend error: {reason}")]
    Backend {
        /// The underlying error message.
        reason: String,
    },
}

impl StoreError {
    /// Shorthand for [`StoreError::Backend`].
    pub fn backend(reason: impl std::fmt::Display) -> Self {
        StoreError::Backend {
            reason: reason.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StoreError::Closed => "store_closed",
            StoreError::Backend { .. } => "store_backend",
        }
    }
}

/// Worker pool refused a task because it was released or stopped.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("worker pool is not accepting tasks")]
pub struct SubmitError;

/// Extracts a readable message from a recovered panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emitter_error_maps_to_dispatch_error() {
        let invalid = EmitterError::InvalidTopicName {
            topic: "a..b".into(),
            reason: "empty segment",
        };
        assert_eq!(
            DispatchError::from(invalid),
            DispatchError::InvalidTopic {
                topic: "a..b".into(),
                reason: "empty segment",
            }
        );
        assert_eq!(
            DispatchError::from(EmitterError::EmitterClosed),
            DispatchError::EmitterClosed
        );
    }

    #[test]
    fn test_dispatch_error_listener_accessor() {
        let err = DispatchError::Panicked {
            listener: Arc::from("abc"),
            info: "boom".into(),
        };
        assert_eq!(err.listener(), Some("abc"));
        assert!(err.is_panic());
        assert_eq!(DispatchError::EmitterClosed.listener(), None);
    }

    #[test]
    fn test_only_fail_is_retryable() {
        assert!(ListenerError::fail("x").is_retryable());
        assert!(!ListenerError::fatal("x").is_retryable());
        assert!(!ListenerError::Decode {
            topic: "t".into(),
            expected: "u32"
        }
        .is_retryable());
    }

    #[test]
    fn test_panic_message_downcasts() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }

    #[test]
    fn test_display_messages() {
        let err = DispatchError::Listener {
            listener: Arc::from("l-1"),
            error: ListenerError::fail("db down"),
        };
        assert_eq!(err.to_string(), "listener l-1: listener failed: db down");
        assert_eq!(
            StoreError::backend("disk full").to_string(),
            "store backend error: disk full"
        );
    }
}
