//! # eventpool
//!
//! **EventPool** is an in-process, topic-based publish/subscribe dispatcher for tokio.
//!
//! Listeners subscribe with exact or wildcard topic patterns; producers emit
//! events either asynchronously (receiving a stream of per-listener outcomes)
//! or synchronously (awaiting every matched listener). All listener work runs
//! on a bounded worker pool, isolated from panics, optionally retried with
//! backoff and persisted through a pluggable event store.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer                                   listeners
//!      │ emit / emit_sync                  (registered with on / on_with)
//!      ▼                                          ▲
//! ┌───────────────────────────────────────────────┼───────────────────┐
//! │  EventPool                                    │                   │
//! │  - topics: DashMap<pattern, Topic>  ──────────┘                   │
//! │  - settings: pool, store, retry, error/panic handlers, id gen     │
//! │  - Bus (broadcast signals) ──► SubscriberSet (LogWriter, custom)  │
//! └──────┬──────────────────────────────────────────────┬─────────────┘
//!        ▼                                              ▼
//! ┌───────────────┐   submit(task)   ┌────────────────────────────────┐
//! │ EventStore    │ ◄─ save_event ── │ Pool (WorkerPool: semaphore +  │
//! │ (MemoryStore) │ ◄─ save_result ─ │ TaskTracker, panic-safe)       │
//! └───────────────┘                  └────────────────────────────────┘
//!
//! PoolRegistry::global() ── tracks every pool ── shutdown_all()
//! ```
//!
//! ### Wildcards
//! ```text
//! pattern            event.some.thing.run   event.some.thing.do   event.some.thing
//! event.some.*.*          ✓                      ✓                     ✗
//! event.some.*.run        ✓                      ✗                     ✗
//! event.some.**           ✓                      ✓                     ✓
//! **.thing.run            ✓                      ✗                     ✗
//! ```
//!
//! ### Invocation
//! ```text
//! for each matched listener (most specific topic first):
//!   ├─► skip if store says it already succeeded for this event id
//!   ├─► attempt 1..=max_attempts (sleep backoff between failed attempts)
//!   │     └─ catch_unwind: panic → panic handler, never retried
//!   ├─► store.save_handler_result(final outcome)
//!   └─► error handler → outcome (Ok / DispatchError)
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                         |
//! |-------------------|----------------------------------------------------------------|--------------------------------------------|
//! | **Dispatch**      | Register listeners, emit events, close pools.                  | [`EventPool`], [`EventPoolBuilder`]        |
//! | **Listeners**     | Closure or trait listeners, middleware, typed topics.          | [`Listener`], [`ListenerFn`], [`TypedTopic`] |
//! | **Policies**      | Retry with constant / exponential backoff and jitter.          | [`RetryPolicy`], [`BackoffPolicy`]         |
//! | **Worker pool**   | Bounded executor with introspection; pluggable.                | [`Pool`], [`WorkerPool`]                   |
//! | **Persistence**   | Durability hooks, dedup, replay.                               | [`EventStore`], [`EventQueue`], [`MemoryStore`] |
//! | **Observability** | Signals fanned out to subscribers.                             | [`Signal`], [`Subscribe`]                  |
//! | **Errors**        | Typed errors for operations, listeners and outcomes.           | [`EmitterError`], [`DispatchError`]        |
//! | **Configuration** | Centralize pool settings.                                      | [`Config`]                                 |
//!
//! ## Optional features
//! - `logging` (default): exports the built-in [`LogWriter`] subscriber (renders signals via `tracing`).
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use eventpool::{Config, Event, EventPool, ListenerError, ListenerFn};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let mut cfg = Config::default();
//!     cfg.max_workers = 4;
//!     cfg.max_attempts = 3;
//!     cfg.backoff.first = Duration::from_millis(10);
//!
//!     // Build subscribers (optional)
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn eventpool::Subscribe>> = vec![Arc::new(eventpool::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn eventpool::Subscribe>> = Vec::new();
//!
//!     let pool = EventPool::builder(cfg).with_subscribers(subs).build();
//!
//!     pool.on("order.*", ListenerFn::arc(|ev: Event| async move {
//!         let amount = ev.payload::<u64>().ok_or_else(|| ListenerError::fatal("no amount"))?;
//!         println!("order {} paid: {amount}", ev.topic());
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//!     // Async: one outcome per listener, then the channel closes.
//!     let mut outcomes = pool.emit("order.paid", 42u64);
//!     while let Some(outcome) = outcomes.recv().await {
//!         assert!(outcome.is_ok());
//!     }
//!
//!     // Sync: wait for every listener, collect failures.
//!     assert!(pool.emit_sync("order.refunded", 7u64).await.is_empty());
//!
//!     eventpool::shutdown_all().await;
//! }
//! ```

mod config;
mod core;
mod error;
mod event;
mod listeners;
mod policies;
mod pool;
mod signals;
mod store;
mod subscribers;
mod topics;

// ---- Public re-exports ----

pub use config::Config;
pub use crate::core::{
    shutdown_all, ErrorHandler, EventPool, EventPoolBuilder, IdGenerator, Outcomes,
    PanicHandler, PoolRegistry, ShutdownMode,
};
pub use error::{DispatchError, EmitterError, ListenerError, StoreError, SubmitError};
pub use event::{Event, Payload};
pub use listeners::{
    BoxListenerFuture, Listener, ListenerBinding, ListenerFn, ListenerId, ListenerOptions,
    ListenerRef, Middleware, TypedTopic,
};
pub use policies::{
    Backoff, BackoffFactory, BackoffPolicy, ConstantBackoff, ExponentialBackoff, JitterPolicy,
    RetryPolicy, StopBackoff,
};
pub use pool::{Pool, PoolTask, TaskStatus, WorkerPool};
pub use signals::{Bus, Signal, SignalKind};
pub use store::{EventQueue, EventStore, MemoryStore, StoredResult};
pub use subscribers::{Subscribe, SubscriberSet};
pub use topics::{
    compare_specificity, is_wildcard, matches, normalize, validate_name, validate_pattern, Topic,
};

// Optional: expose a built-in logger subscriber on top of `tracing`.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
