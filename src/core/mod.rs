//! Dispatcher core: registry, emission and lifecycle.
//!
//! The public API from this module is [`EventPool`] (with its
//! [`EventPoolBuilder`]) and the process-wide [`PoolRegistry`].
//!
//! Internal modules:
//! - [`event_pool`]: topic registry, emission entry points, settings, shutdown;
//! - [`dispatch`]: one emission fanned out to the worker pool (retry, panic recovery, persistence);
//! - [`builder`]: wiring of config, worker pool, handlers, subscribers and registry;
//! - [`registry`]: live pools and coordinated shutdown;
//! - [`replay`]: store-backed replay consumer.

mod builder;
mod dispatch;
mod event_pool;
mod registry;
mod replay;

pub use builder::EventPoolBuilder;
pub use event_pool::{ErrorHandler, EventPool, IdGenerator, Outcomes, PanicHandler, ShutdownMode};
pub use registry::{shutdown_all, PoolRegistry};
