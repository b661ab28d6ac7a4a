//! # Signal subscribers for the dispatcher.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and the built-in [`LogWriter`] for observing [`Signal`](crate::Signal)s
//! broadcast through the [`Bus`](crate::Bus).
//!
//! ## Architecture
//! ```text
//! Signal flow:
//!   dispatch task ── publish(Signal) ──► Bus ──► signal forwarder
//!                                                     │
//!                                                     ▼
//!                                               SubscriberSet
//!                                                     │
//!                                         ┌───────────┼───────────┐
//!                                         ▼           ▼           ▼
//!                                     LogWriter    Metrics     Custom ...
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use eventpool::{Subscribe, Signal, SignalKind};
//! use async_trait::async_trait;
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_signal(&self, signal: &Signal) {
//!         if signal.kind == SignalKind::ListenerFailed {
//!             // increment failure counter
//!         }
//!     }
//!     fn name(&self) -> &'static str { "failure-counter" }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
