use std::sync::Arc;

use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::event_pool::{
    default_error_handler, default_id_generator, default_panic_handler, ErrorHandler,
    EventPool, IdGenerator, PanicHandler, Settings,
};
use super::registry::PoolRegistry;
use crate::{
    config::Config,
    error::DispatchError,
    event::Event,
    pool::{Pool, WorkerPool},
    signals::Bus,
    store::EventStore,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for constructing an [`EventPool`] with optional collaborators.
pub struct EventPoolBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    pool: Option<Arc<dyn Pool>>,
    store: Option<Arc<dyn EventStore>>,
    error_handler: Option<ErrorHandler>,
    panic_handler: Option<PanicHandler>,
    id_gen: Option<IdGenerator>,
    registry: Option<Arc<PoolRegistry>>,
}

impl EventPoolBuilder {
    /// Creates a new builder with the given configuration.
    ///
    /// By default the pool joins [`PoolRegistry::global`].
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            pool: None,
            store: None,
            error_handler: None,
            panic_handler: None,
            id_gen: None,
            registry: Some(PoolRegistry::global()),
        }
    }

    /// Sets signal subscribers for observability.
    ///
    /// Subscribers receive dispatcher signals (listener outcomes, retries,
    /// store failures) through dedicated workers with bounded queues.
    /// Requires a tokio runtime at [`build`](Self::build) time.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Uses `pool` instead of a [`WorkerPool`] derived from the config.
    pub fn with_pool(mut self, pool: Arc<dyn Pool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Attaches an event store.
    pub fn with_event_store(mut self, store: Arc<dyn EventStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the error handler (see [`EventPool::set_error_handler`]).
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Event, DispatchError) -> Option<DispatchError> + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(handler));
        self
    }

    /// Sets the panic handler (see [`EventPool::set_panic_handler`]).
    pub fn with_panic_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&(dyn std::any::Any + Send)) + Send + Sync + 'static,
    {
        self.panic_handler = Some(Arc::new(handler));
        self
    }

    /// Sets the id generator (see [`EventPool::set_id_generator`]).
    pub fn with_id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_gen = Some(Arc::new(generator));
        self
    }

    /// Registers the pool in `registry` instead of the global one.
    pub fn with_registry(mut self, registry: Arc<PoolRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Keeps the pool out of every registry.
    pub fn without_registry(mut self) -> Self {
        self.registry = None;
        self
    }

    /// Builds and returns the EventPool instance.
    ///
    /// This consumes the builder and initializes all components:
    /// - Signal bus for broadcasting
    /// - Worker pool (unless one was provided)
    /// - Retry policy from `max_attempts` / `backoff`
    /// - Subscriber workers and the signal forwarder (only with subscribers)
    /// - Registry membership
    pub fn build(self) -> EventPool {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());

        let pool: Arc<dyn Pool> = match self.pool {
            Some(pool) => pool,
            None => WorkerPool::arc(self.cfg.pool_name.clone(), self.cfg.concurrency_limit()),
        };

        let settings = Settings {
            pool,
            store: self.store,
            error_handler: self.error_handler.unwrap_or_else(default_error_handler),
            panic_handler: self.panic_handler.unwrap_or_else(default_panic_handler),
            id_gen: self.id_gen.unwrap_or_else(default_id_generator),
            retry: self.cfg.retry_policy(),
            replaying_own_store: false,
        };

        let forwarder = spawn_signal_forwarder(&bus, self.subscribers);
        let outcome_buffer = self.cfg.outcome_buffer_clamped();

        EventPool::from_parts(
            self.cfg.pool_name,
            settings,
            outcome_buffer,
            bus,
            forwarder,
            self.registry,
        )
    }
}

/// Subscribes to the bus and forwards signals to the subscriber set (fire-and-forget).
///
/// Stops once the returned token is cancelled and the signals already queued
/// in the bus are forwarded; then shuts the subscriber workers down.
fn spawn_signal_forwarder(
    bus: &Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
) -> Option<(JoinHandle<()>, CancellationToken)> {
    if subscribers.is_empty() {
        return None;
    }

    let set = SubscriberSet::new(subscribers, bus.clone());
    let mut rx = bus.subscribe();
    let token = CancellationToken::new();
    let stop = token.clone();

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                res = rx.recv() => match res {
                    Ok(signal) => set.emit(Arc::new(signal)),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                },
                _ = stop.cancelled() => {
                    loop {
                        match rx.try_recv() {
                            Ok(signal) => set.emit(Arc::new(signal)),
                            Err(TryRecvError::Lagged(_)) => continue,
                            Err(_) => break,
                        }
                    }
                    break;
                }
            }
        }
        set.shutdown().await;
    });

    Some((handle, token))
}
