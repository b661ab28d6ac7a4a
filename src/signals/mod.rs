//! Dispatcher signals: types and broadcast bus.
//!
//! This module groups the **observability data model** and the **bus** used to
//! publish/subscribe to what happens inside an [`EventPool`](crate::EventPool):
//! listener outcomes, scheduled retries, persistence failures, rejected emissions
//! and pool shutdown.
//!
//! ## Contents
//! - [`SignalKind`], [`Signal`] signal classification and metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `core::dispatch` (listener outcomes, retries, store failures),
//!   `EventPool` (rejections, close) and `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the pool's signal listener (fans out to `SubscriberSet`)
//!   and anything holding a receiver from [`EventPool::signals`](crate::EventPool::signals).

mod bus;
mod signal;

pub use bus::Bus;
pub use signal::{Signal, SignalKind};
