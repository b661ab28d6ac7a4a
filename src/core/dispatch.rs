//! # Dispatch: one emission, fanned out to its listeners.
//!
//! A [`Plan`] is built synchronously by the emit path (closed check, name
//! validation, id assignment, topic resolution) and then driven to submit one
//! [`Invocation`] per matched listener to the worker pool.
//!
//! ## Flow
//! ```text
//! Plan::run(tx)
//!   ├─► store.save_event(event)            (best effort; skipped for replayed events)
//!   │      └─ Enqueue and saved ──► return (the replay consumer dispatches)
//!   └─► for each listener (most specific topic first):
//!         pool.submit(Invocation::run) ──► tx.send(outcome)
//!           │                                  ▲
//!           └─ SubmitError ──► Rejected ───────┘
//!
//! Invocation::run
//!   ├─► store.handler_succeeded(event_id, listener)?  → skip, report success
//!   ├─► RetryPolicy::run(call_once)                   (or a single call)
//!   │      └─ call_once: catch_unwind(listener.call(event))
//!   ├─► store.save_handler_result(final outcome)       (best effort)
//!   └─► error_handler(event, err)                      (None swallows the error)
//! ```
//!
//! ## Rules
//! - A panic is never retried; the panic handler sees it exactly once.
//! - Only retryable listener errors ([`ListenerError::is_retryable`]) are retried.
//! - Store failures go to the error handler and a `StoreFailed` signal, never to the outcome.
//! - Outcomes are sent with `send().await`: a full channel parks the invocation (backpressure).

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;

use crate::core::event_pool::{ErrorHandler, PanicHandler};
use crate::error::{panic_message, DispatchError, ListenerError, StoreError};
use crate::event::Event;
use crate::listeners::ListenerId;
use crate::policies::RetryPolicy;
use crate::pool::{Pool, PoolTask, TaskStatus};
use crate::signals::{Bus, Signal, SignalKind};
use crate::store::EventStore;
use crate::topics::ListenerEntry;

pub(crate) type OutcomeSender = mpsc::Sender<Result<(), DispatchError>>;

/// Collaborators captured once per emission.
#[derive(Clone)]
pub(crate) struct Context {
    pub(crate) pool: Arc<dyn Pool>,
    pub(crate) store: Option<Arc<dyn EventStore>>,
    pub(crate) error_handler: ErrorHandler,
    pub(crate) panic_handler: PanicHandler,
    pub(crate) retry: Option<RetryPolicy>,
    pub(crate) bus: Bus,
}

impl Context {
    /// Reports a store failure without affecting dispatch.
    fn store_failed(&self, event: &Event, listener: Option<&ListenerId>, error: StoreError) {
        tracing::warn!(
            target: "eventpool",
            topic = event.topic(),
            listener = listener.map(|l| &**l),
            error = %error,
            "event store failed"
        );

        let mut signal = Signal::new(SignalKind::StoreFailed)
            .with_topic(event.topic())
            .with_reason(error.to_string());
        if let Some(l) = listener {
            signal = signal.with_listener(Arc::clone(l));
        }
        self.bus.publish(signal);

        let _ = (self.error_handler)(
            event,
            DispatchError::Store {
                listener: listener.cloned(),
                error,
            },
        );
    }
}

/// Where an accepted emission is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Save, then dispatch on this pool.
    Inline,
    /// Save only; the pool's own replay consumer dispatches.
    Enqueue,
    /// Taken from a replay queue: dispatch without saving.
    Replay,
}

/// One accepted emission.
pub(crate) struct Plan {
    pub(crate) event: Event,
    pub(crate) entries: Vec<ListenerEntry>,
    pub(crate) ctx: Context,
    pub(crate) delivery: Delivery,
}

impl Plan {
    pub(crate) fn replayed(mut self) -> Self {
        self.delivery = Delivery::Replay;
        self
    }

    /// Number of listener invocations this plan submits.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Persists the event and submits every invocation.
    ///
    /// Returns once everything is submitted; `tx` is dropped at the end, so the
    /// receiver closes after the last invocation reported.
    pub(crate) async fn run(self, tx: OutcomeSender) {
        let Plan {
            event,
            entries,
            ctx,
            delivery,
        } = self;

        if let Some(store) = ctx.store.as_ref().filter(|_| delivery != Delivery::Replay) {
            match store.save_event(&event).await {
                Ok(()) if delivery == Delivery::Enqueue => return,
                Ok(()) => {}
                Err(e) => ctx.store_failed(&event, None, e),
            }
        }

        for entry in entries {
            let listener = Arc::clone(&entry.id);
            let invocation = Invocation {
                event: event.clone(),
                retry: entry.retry.clone().or_else(|| ctx.retry.clone()),
                entry,
                ctx: ctx.clone(),
            };

            let tx_task = tx.clone();
            let task: PoolTask = Box::pin(async move {
                let outcome = invocation.run().await;
                let status = match outcome {
                    Ok(()) => TaskStatus::Succeeded,
                    Err(_) => TaskStatus::Failed,
                };
                let _ = tx_task.send(outcome).await;
                status
            });

            if ctx.pool.submit(task).is_err() {
                tracing::debug!(target: "eventpool", listener = &*listener, "worker pool rejected invocation");
                let _ = tx.send(Err(DispatchError::Rejected { listener })).await;
            }
        }
    }
}

/// Why a single attempt did not succeed.
enum Failure {
    Listener(ListenerError),
    Panic(Box<dyn Any + Send>),
}

impl Failure {
    fn is_retryable(&self) -> bool {
        matches!(self, Failure::Listener(e) if e.is_retryable())
    }
}

/// One listener invocation for one event.
pub(crate) struct Invocation {
    event: Event,
    entry: ListenerEntry,
    retry: Option<RetryPolicy>,
    ctx: Context,
}

impl Invocation {
    pub(crate) async fn run(self) -> Result<(), DispatchError> {
        if self.already_succeeded().await {
            self.publish(Signal::new(SignalKind::ListenerSucceeded).with_reason("deduplicated"));
            return Ok(());
        }

        let (attempts, failure) = self.attempts().await;
        let outcome = failure.map(|f| self.dispatch_error(f));

        if let Some(store) = &self.ctx.store {
            if let Err(e) = store
                .save_handler_result(&self.event, &self.entry.id, outcome.as_ref())
                .await
            {
                self.ctx.store_failed(&self.event, Some(&self.entry.id), e);
            }
        }

        let Some(err) = outcome else {
            self.publish(Signal::new(SignalKind::ListenerSucceeded).with_attempt(attempts));
            return Ok(());
        };

        let kind = if err.is_panic() {
            SignalKind::ListenerPanicked
        } else {
            SignalKind::ListenerFailed
        };
        self.publish(
            Signal::new(kind)
                .with_attempt(attempts)
                .with_reason(err.as_message()),
        );

        match (self.ctx.error_handler)(&self.event, err) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn already_succeeded(&self) -> bool {
        let (Some(store), Some(event_id)) = (&self.ctx.store, self.event.id()) else {
            return false;
        };
        match store.handler_succeeded(event_id, &self.entry.id).await {
            Ok(done) => done,
            Err(e) => {
                self.ctx.store_failed(&self.event, Some(&self.entry.id), e);
                false
            }
        }
    }

    /// Runs the attempts; returns how many were made and the final failure, if any.
    async fn attempts(&self) -> (u32, Option<Failure>) {
        let Some(retry) = &self.retry else {
            return (1, self.call_once().await.err());
        };

        let mut used = 0;
        let result = retry
            .run(
                |n| {
                    used = n;
                    self.call_once()
                },
                Failure::is_retryable,
                |n, delay, failure| {
                    let reason = match failure {
                        Failure::Listener(e) => e.as_message(),
                        Failure::Panic(_) => String::new(),
                    };
                    self.publish(
                        Signal::new(SignalKind::RetryScheduled)
                            .with_attempt(n)
                            .with_delay(delay)
                            .with_reason(reason),
                    );
                },
            )
            .await;
        (used, result.err())
    }

    /// One attempt inside a recovery boundary.
    ///
    /// Covers both a panic while building the future and a panic while polling it.
    fn call_once(&self) -> impl std::future::Future<Output = Result<(), Failure>> + Send + 'static {
        let listener = Arc::clone(&self.entry.listener);
        let event = self.event.clone();
        async move {
            let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| listener.call(event))) {
                Ok(fut) => fut,
                Err(panic) => return Err(Failure::Panic(panic)),
            };
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(Failure::Listener(e)),
                Err(panic) => Err(Failure::Panic(panic)),
            }
        }
    }

    fn dispatch_error(&self, failure: Failure) -> DispatchError {
        let listener = Arc::clone(&self.entry.id);
        match failure {
            Failure::Listener(error) => DispatchError::Listener { listener, error },
            Failure::Panic(panic) => {
                let info = panic_message(&*panic);
                let handler = &self.ctx.panic_handler;
                if std::panic::catch_unwind(AssertUnwindSafe(|| handler(&*panic))).is_err() {
                    tracing::error!(target: "eventpool", listener = &*listener, "panic handler panicked");
                }
                DispatchError::Panicked { listener, info }
            }
        }
    }

    fn publish(&self, signal: Signal) {
        self.ctx.bus.publish(
            signal
                .with_topic(self.event.topic())
                .with_listener(Arc::clone(&self.entry.id)),
        );
    }
}
