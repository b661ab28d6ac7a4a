//! # EventPool: topic registry, emission and lifecycle.
//!
//! The [`EventPool`] owns the topic registry, the worker pool, the retry policy,
//! the optional event store and the error/panic handlers. It is a cheap
//! cloneable handle (`Arc` inside); every clone drives the same pool.
//!
//! ## High-level architecture
//! ```text
//! on(pattern, listener) ──► ensure_topic(pattern) ──► Topic.add(entry)
//!
//! emit(name, payload)                         emit_sync(name, payload).await
//!   │                                           │
//!   └──► prepare(event)  (sync) ◄───────────────┘
//!          ├─ closed?        → EmitterClosed
//!          ├─ validate_name  → InvalidTopic
//!          ├─ assign event id (id generator)
//!          └─ resolve topics matching name, most specific first
//!                │
//!                ▼
//!        Plan::run(tx) ──► store.save_event ──► pool.submit(one task per listener)
//!                                                   │
//!   Outcomes (mpsc::Receiver) ◄── one Result per listener ─┘
//!
//! Signals:
//!   dispatch tasks ── publish(Signal) ──► Bus ──► signal forwarder ──► SubscriberSet
//! ```
//!
//! ## Rules
//! - Registration and lookups are synchronous and never block on dispatch.
//! - `emit` returns immediately; it must be called from within a tokio runtime.
//! - Once closed, no topic can be created and every emission yields a single
//!   [`DispatchError::EmitterClosed`].
//! - No ordering is guaranteed across listeners of one emission.
//!
//! ## Example
//! ```rust
//! use eventpool::{EventPool, ListenerError, ListenerFn, Event};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let pool = EventPool::builder(Default::default()).without_registry().build();
//!
//!     pool.on("user.*", ListenerFn::arc(|ev: Event| async move {
//!         match ev.payload::<u32>() {
//!             Some(_) => Ok(()),
//!             None => Err(ListenerError::fatal("missing user id")),
//!         }
//!     }))
//!     .unwrap();
//!
//!     let errors = pool.emit_sync("user.created", 7u32).await;
//!     assert!(errors.is_empty());
//!
//!     pool.close().await.unwrap();
//! }
//! ```

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::builder::EventPoolBuilder;
use super::dispatch::{Context, Delivery, Plan};
use super::registry::PoolRegistry;
use crate::config::Config;
use crate::error::{panic_message, DispatchError, EmitterError};
use crate::event::Event;
use crate::listeners::{ListenerBinding, ListenerId, ListenerOptions, ListenerRef};
use crate::policies::RetryPolicy;
use crate::pool::Pool;
use crate::signals::{Bus, Signal, SignalKind};
use crate::store::EventStore;
use crate::topics::{
    compare_specificity, matches, normalize, validate_name, validate_pattern, ListenerEntry, Topic,
};

/// Converts a listener failure into the reported outcome; `None` swallows it.
///
/// Store failures are passed in as [`DispatchError::Store`]; the return value is ignored for them.
pub type ErrorHandler = Arc<dyn Fn(&Event, DispatchError) -> Option<DispatchError> + Send + Sync>;

/// Observes recovered listener panics.
pub type PanicHandler = Arc<dyn Fn(&(dyn Any + Send)) + Send + Sync>;

/// Generates listener and event ids.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Receiver of per-listener outcomes of one [`EventPool::emit`].
///
/// Yields one value per matched listener as each finishes, then closes.
pub type Outcomes = mpsc::Receiver<Result<(), DispatchError>>;

static NEXT_POOL_ID: AtomicU64 = AtomicU64::new(1);

/// How [`EventPool::shutdown`] treats work already handed to the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownMode {
    /// Wait for queued and running invocations to finish (`Pool::release`).
    #[default]
    Drain,
    /// Drop invocations that have not started yet (`Pool::stop`); their
    /// outcome channels simply close.
    Abandon,
}

impl ShutdownMode {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ShutdownMode::Drain => "drain",
            ShutdownMode::Abandon => "abandon",
        }
    }
}

pub(crate) struct Settings {
    pub(crate) pool: Arc<dyn Pool>,
    pub(crate) store: Option<Arc<dyn EventStore>>,
    pub(crate) error_handler: ErrorHandler,
    pub(crate) panic_handler: PanicHandler,
    pub(crate) id_gen: IdGenerator,
    pub(crate) retry: Option<RetryPolicy>,
    /// A replay consumer drains `store`: emissions only enqueue.
    pub(crate) replaying_own_store: bool,
}

pub(crate) struct Inner {
    pub(crate) id: u64,
    pub(crate) name: Arc<str>,
    topics: DashMap<String, Arc<Topic>>,
    closed: AtomicBool,
    settings: RwLock<Settings>,
    outcome_buffer: usize,
    bus: Bus,
    /// Emission coordinators and replay consumers.
    pub(crate) dispatchers: TaskTracker,
    /// Cancelled on close; stops replay consumers.
    pub(crate) runtime_token: CancellationToken,
    signals_token: CancellationToken,
    signal_forwarder: Mutex<Option<JoinHandle<()>>>,
    registry: Option<Arc<PoolRegistry>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.runtime_token.cancel();
        self.signals_token.cancel();
        if let Some(registry) = &self.registry {
            registry.remove(self.id);
        }
    }
}

/// In-process topic-based event dispatcher.
#[derive(Clone)]
pub struct EventPool {
    pub(crate) inner: Arc<Inner>,
}

pub(crate) fn default_error_handler() -> ErrorHandler {
    Arc::new(|_: &Event, err: DispatchError| Some(err))
}

pub(crate) fn default_panic_handler() -> PanicHandler {
    Arc::new(|panic: &(dyn Any + Send)| {
        tracing::error!(target: "eventpool", panic = %panic_message(panic), "listener panicked");
    })
}

pub(crate) fn default_id_generator() -> IdGenerator {
    Arc::new(|| uuid::Uuid::new_v4().to_string())
}

impl EventPool {
    /// Creates a pool with [`Config::default`], registered in [`PoolRegistry::global`].
    pub fn new() -> Self {
        Self::builder(Config::default()).build()
    }

    /// Starts building a pool from `cfg`.
    pub fn builder(cfg: Config) -> EventPoolBuilder {
        EventPoolBuilder::new(cfg)
    }

    pub(crate) fn from_parts(
        name: String,
        settings: Settings,
        outcome_buffer: usize,
        bus: Bus,
        signal_forwarder: Option<(JoinHandle<()>, CancellationToken)>,
        registry: Option<Arc<PoolRegistry>>,
    ) -> Self {
        let (forwarder, signals_token) = match signal_forwarder {
            Some((handle, token)) => (Some(handle), token),
            None => (None, CancellationToken::new()),
        };
        let pool = Self {
            inner: Arc::new(Inner {
                id: NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed),
                name: name.into(),
                topics: DashMap::new(),
                closed: AtomicBool::new(false),
                settings: RwLock::new(settings),
                outcome_buffer: outcome_buffer.max(1),
                bus,
                dispatchers: TaskTracker::new(),
                runtime_token: CancellationToken::new(),
                signals_token,
                signal_forwarder: Mutex::new(forwarder),
                registry,
            }),
        };
        if let Some(registry) = &pool.inner.registry {
            registry.register(&pool);
        }
        pool
    }

    pub(crate) fn downgrade(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Pool name (from [`Config::pool_name`]).
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns `true` once [`close`](Self::close) or [`shutdown`](Self::shutdown) ran.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Subscribes to dispatcher [`Signal`]s published after this call.
    pub fn signals(&self) -> broadcast::Receiver<Signal> {
        self.inner.bus.subscribe()
    }

    fn ensure_open(&self) -> Result<(), EmitterError> {
        if self.is_closed() {
            return Err(EmitterError::EmitterClosed);
        }
        Ok(())
    }

    fn next_id(&self) -> String {
        (self.inner.settings.read().id_gen)()
    }

    // === Topics ===

    /// Returns the topic registered under `pattern`, creating it if absent.
    ///
    /// ### Errors
    /// - [`EmitterError::EmitterClosed`] once the pool is closed
    /// - [`EmitterError::InvalidTopicName`] for a malformed pattern
    pub fn ensure_topic(&self, pattern: &str) -> Result<Arc<Topic>, EmitterError> {
        self.ensure_open()?;
        let pattern = normalize(pattern);
        validate_pattern(pattern)?;

        let topic = Arc::clone(
            self.inner
                .topics
                .entry(pattern.to_string())
                .or_insert_with(|| Arc::new(Topic::new(pattern)))
                .value(),
        );

        // Lost a race with close: undo.
        if self.is_closed() {
            self.inner.topics.remove(pattern);
            return Err(EmitterError::EmitterClosed);
        }
        Ok(topic)
    }

    /// Looks up an existing topic.
    pub fn get_topic(&self, pattern: &str) -> Result<Arc<Topic>, EmitterError> {
        let pattern = normalize(pattern);
        self.inner
            .topics
            .get(pattern)
            .map(|t| Arc::clone(t.value()))
            .ok_or_else(|| EmitterError::TopicNotFound {
                topic: pattern.to_string(),
            })
    }

    /// Registered topic patterns, sorted.
    pub fn topics(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.topics.iter().map(|t| t.key().clone()).collect();
        names.sort();
        names
    }

    /// Reports whether an emission of `name` would reach at least one listener.
    pub fn interested_in(&self, name: &str) -> bool {
        let name = normalize(name);
        self.inner
            .topics
            .iter()
            .any(|t| !t.value().is_empty() && matches(t.key(), name))
    }

    fn resolve(&self, name: &str) -> Vec<ListenerEntry> {
        let mut matched: Vec<Arc<Topic>> = self
            .inner
            .topics
            .iter()
            .filter(|t| matches(t.key(), name))
            .map(|t| Arc::clone(t.value()))
            .collect();
        matched.sort_by(|a, b| compare_specificity(a.pattern(), b.pattern()));
        matched.iter().flat_map(|t| t.snapshot()).collect()
    }

    // === Listeners ===

    /// Registers `listener` under `pattern` and returns its id.
    pub fn on(&self, pattern: &str, listener: ListenerRef) -> Result<ListenerId, EmitterError> {
        self.on_with(pattern, listener, ListenerOptions::default())
    }

    /// Registers `listener` under `pattern` with middleware and/or a retry override.
    pub fn on_with(
        &self,
        pattern: &str,
        listener: ListenerRef,
        options: ListenerOptions,
    ) -> Result<ListenerId, EmitterError> {
        let topic = self.ensure_topic(pattern)?;
        let id: ListenerId = self.next_id().into();
        topic.add(ListenerEntry {
            id: Arc::clone(&id),
            listener: options.wrap(listener),
            retry: options.retry().cloned(),
        })?;
        Ok(id)
    }

    /// Registers bindings in order, stopping at the first failure.
    ///
    /// Returns the ids registered so far together with the outcome; listeners
    /// registered before a failure stay registered.
    pub fn register_listeners(
        &self,
        bindings: impl IntoIterator<Item = ListenerBinding>,
    ) -> (Vec<ListenerId>, Result<(), EmitterError>) {
        let mut ids = Vec::new();
        for binding in bindings {
            let (pattern, listener, options) = binding.into_parts();
            let Some(listener) = listener else {
                return (ids, Err(EmitterError::NilListener));
            };
            match self.on_with(&pattern, listener, options) {
                Ok(id) => ids.push(id),
                Err(e) => return (ids, Err(e)),
            }
        }
        (ids, Ok(()))
    }

    /// Removes listener `id` from the topic registered under `pattern`.
    pub fn off(&self, pattern: &str, id: &str) -> Result<(), EmitterError> {
        self.get_topic(pattern)?.remove(id)
    }

    // === Settings ===

    /// Replaces the error handler. Returning `None` swallows the error.
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&Event, DispatchError) -> Option<DispatchError> + Send + Sync + 'static,
    {
        self.inner.settings.write().error_handler = Arc::new(handler);
    }

    /// Replaces the panic handler.
    pub fn set_panic_handler<F>(&self, handler: F)
    where
        F: Fn(&(dyn Any + Send)) + Send + Sync + 'static,
    {
        self.inner.settings.write().panic_handler = Arc::new(handler);
    }

    /// Replaces the worker pool used by subsequent emissions.
    ///
    /// The previous pool is neither released nor stopped.
    pub fn set_pool(&self, pool: Arc<dyn Pool>) {
        self.inner.settings.write().pool = pool;
    }

    /// Attaches an event store.
    ///
    /// Emissions dispatch inline again until [`replay_from`](Self::replay_from)
    /// is pointed at the new store.
    pub fn set_event_store(&self, store: Arc<dyn EventStore>) {
        let mut settings = self.inner.settings.write();
        settings.store = Some(store);
        settings.replaying_own_store = false;
    }

    pub(crate) fn attached_store(&self) -> Option<Arc<dyn EventStore>> {
        self.inner.settings.read().store.clone()
    }

    pub(crate) fn set_replaying_own_store(&self) {
        self.inner.settings.write().replaying_own_store = true;
    }

    /// Sets the pool-wide retry policy (listener options may override it).
    pub fn set_retry(&self, retry: RetryPolicy) {
        self.inner.settings.write().retry = Some(retry);
    }

    /// Disables the pool-wide retry policy.
    pub fn clear_retry(&self) {
        self.inner.settings.write().retry = None;
    }

    /// Replaces the listener/event id generator.
    pub fn set_id_generator<F>(&self, generator: F)
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.inner.settings.write().id_gen = Arc::new(generator);
    }

    /// Current worker pool.
    pub fn pool(&self) -> Arc<dyn Pool> {
        Arc::clone(&self.inner.settings.read().pool)
    }

    // === Emission ===

    /// Publishes `payload` on `topic` and returns the outcome stream.
    ///
    /// The receiver yields one `Result` per matched listener as each finishes,
    /// then closes. Invocations wait when the channel is full, so either drain
    /// it or drop it.
    ///
    /// ### Notes
    /// - Must be called from within a tokio runtime.
    /// - While the pool replays its own store (see [`replay_from`](Self::replay_from)),
    ///   the event is only saved and the receiver closes empty; the replay
    ///   consumer dispatches it. If saving fails, the event is dispatched inline.
    pub fn emit<T: Any + Send + Sync>(&self, topic: &str, payload: T) -> Outcomes {
        self.emit_event(Event::new(topic, payload))
    }

    /// Publishes a pre-built event. See [`emit`](Self::emit).
    pub fn emit_event(&self, event: Event) -> Outcomes {
        let (tx, rx) = mpsc::channel(self.inner.outcome_buffer);
        match self.prepare(event) {
            Ok(plan) => {
                self.inner.dispatchers.spawn(plan.run(tx));
            }
            Err(err) => {
                let _ = tx.try_send(Err(err));
            }
        }
        rx
    }

    /// Publishes `payload` on `topic` and waits for every matched listener.
    ///
    /// Returns the errors of failed listeners in completion order (empty on success,
    /// and empty when the event is handed to the pool's own replay consumer).
    pub async fn emit_sync<T: Any + Send + Sync>(
        &self,
        topic: &str,
        payload: T,
    ) -> Vec<DispatchError> {
        self.emit_event_sync(Event::new(topic, payload)).await
    }

    /// Publishes a pre-built event and waits. See [`emit_sync`](Self::emit_sync).
    pub async fn emit_event_sync(&self, event: Event) -> Vec<DispatchError> {
        match self.prepare(event) {
            Ok(plan) => self.run_to_completion(plan).await,
            Err(err) => vec![err],
        }
    }

    /// Dispatches an event taken from a replay queue; it is not saved again.
    pub(crate) async fn dispatch_replayed(&self, event: Event) -> Vec<DispatchError> {
        match self.prepare(event) {
            Ok(plan) => self.run_to_completion(plan.replayed()).await,
            Err(err) => vec![err],
        }
    }

    async fn run_to_completion(&self, plan: Plan) -> Vec<DispatchError> {
        // One slot per invocation: reporting never waits.
        let (tx, mut rx) = mpsc::channel(plan.len().max(1));
        self.inner.dispatchers.track_future(plan.run(tx)).await;

        let mut errors = Vec::new();
        while let Some(outcome) = rx.recv().await {
            if let Err(err) = outcome {
                errors.push(err);
            }
        }
        errors
    }

    fn prepare(&self, mut event: Event) -> Result<Plan, DispatchError> {
        let name = normalize(event.topic()).to_string();

        if let Err(err) = self.ensure_open().and_then(|()| validate_name(&name)) {
            let err = DispatchError::from(err);
            self.inner.bus.publish(
                Signal::new(SignalKind::EmitRejected)
                    .with_pool(Arc::clone(&self.inner.name))
                    .with_topic(name.as_str())
                    .with_reason(err.as_message()),
            );
            return Err(err);
        }

        if name != event.topic() {
            event = event.retarget(name.as_str());
        }

        let delivery;
        let ctx = {
            let settings = self.inner.settings.read();
            if event.id().is_none() {
                event = event.with_id((settings.id_gen)());
            }
            delivery = if settings.replaying_own_store && settings.store.is_some() {
                Delivery::Enqueue
            } else {
                Delivery::Inline
            };
            Context {
                pool: Arc::clone(&settings.pool),
                store: settings.store.clone(),
                error_handler: Arc::clone(&settings.error_handler),
                panic_handler: Arc::clone(&settings.panic_handler),
                retry: settings.retry.clone(),
                bus: self.inner.bus.clone(),
            }
        };

        Ok(Plan {
            entries: self.resolve(&name),
            event,
            ctx,
            delivery,
        })
    }

    // === Lifecycle ===

    /// Closes the pool, draining in-flight work. Same as `shutdown(ShutdownMode::Drain)`.
    pub async fn close(&self) -> Result<(), EmitterError> {
        self.shutdown(ShutdownMode::Drain).await
    }

    /// Closes the pool.
    ///
    /// ### Order
    /// 1. flip the closed flag (new emissions fail fast)
    /// 2. stop replay consumers and wait for emission coordinators (drain only)
    /// 3. release (drain) or stop (abandon) the worker pool
    /// 4. remove all topics
    /// 5. leave the registry, publish `PoolClosed`, stop signal subscribers
    ///
    /// ### Errors
    /// [`EmitterError::AlreadyClosed`] on every call after the first.
    ///
    /// ### Notes
    /// In drain mode, invocations blocked on a full, undrained outcome channel
    /// keep close waiting until the receiver is drained or dropped.
    pub async fn shutdown(&self, mode: ShutdownMode) -> Result<(), EmitterError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Err(EmitterError::AlreadyClosed);
        }
        let pool = self.pool();

        self.inner.runtime_token.cancel();
        self.inner.dispatchers.close();
        match mode {
            ShutdownMode::Drain => {
                self.inner.dispatchers.wait().await;
                pool.release().await;
            }
            ShutdownMode::Abandon => pool.stop(),
        }

        for topic in self.inner.topics.iter() {
            topic.value().clear();
        }
        self.inner.topics.clear();

        if let Some(registry) = &self.inner.registry {
            registry.remove(self.inner.id);
        }

        tracing::debug!(target: "eventpool", pool = %self.inner.name, mode = mode.as_label(), "pool closed");
        self.inner.bus.publish(
            Signal::new(SignalKind::PoolClosed)
                .with_pool(Arc::clone(&self.inner.name))
                .with_reason(mode.as_label()),
        );

        self.inner.signals_token.cancel();
        let forwarder = self.inner.signal_forwarder.lock().take();
        if let Some(handle) = forwarder {
            let _ = handle.await;
        }
        Ok(())
    }
}

impl Default for EventPool {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventPool")
            .field("name", &self.inner.name)
            .field("topics", &self.inner.topics.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::ListenerError;
    use crate::listeners::{ListenerFn, TypedTopic};
    use crate::policies::ConstantBackoff;
    use crate::pool::WorkerPool;
    use crate::store::MemoryStore;
    use crate::subscribers::Subscribe;

    type Log = Arc<Mutex<Vec<String>>>;

    fn test_pool() -> EventPool {
        EventPool::builder(Config::default()).without_registry().build()
    }

    fn recorder(log: &Log, tag: &'static str) -> ListenerRef {
        let log = Arc::clone(log);
        ListenerFn::arc(move |_ev: Event| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push(tag.to_string());
                Ok(())
            }
        })
    }

    fn counter(calls: &Arc<AtomicU32>) -> ListenerRef {
        let calls = Arc::clone(calls);
        ListenerFn::arc(move |_ev: Event| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
    }

    fn explode(msg: &'static str) -> Result<(), ListenerError> {
        panic!("{msg}")
    }

    fn sorted(log: &Log) -> Vec<String> {
        let mut v = log.lock().clone();
        v.sort();
        v
    }

    #[tokio::test]
    async fn test_wildcard_routing() {
        let pool = test_pool();
        let log: Log = Arc::default();
        for pattern in ["event.some.*.*", "event.some.*.run", "event.some.**", "**.thing.run"] {
            pool.on(pattern, recorder(&log, pattern)).unwrap();
        }

        assert!(pool.emit_sync("event.some.thing.run", ()).await.is_empty());
        assert_eq!(
            sorted(&log),
            vec!["**.thing.run", "event.some.**", "event.some.*.*", "event.some.*.run"]
        );

        log.lock().clear();
        assert!(pool.emit_sync("event.some.thing.do", ()).await.is_empty());
        assert_eq!(sorted(&log), vec!["event.some.**", "event.some.*.*"]);

        log.lock().clear();
        assert!(pool.emit_sync("event.some.thing", ()).await.is_empty());
        assert_eq!(sorted(&log), vec!["event.some.**"]);

        log.lock().clear();
        assert!(pool.emit_sync("other.topic", ()).await.is_empty());
        assert!(log.lock().is_empty());
        assert!(!pool.interested_in("other.topic"));
        assert!(pool.interested_in(" event.some "));
    }

    #[tokio::test]
    async fn test_resolve_orders_most_specific_first() {
        let pool = test_pool();
        let log: Log = Arc::default();
        for pattern in [
            "**.thing.run",
            "event.some.**",
            "event.some.*.*",
            "event.some.thing.run",
            "event.some.*.run",
        ] {
            pool.on(pattern, recorder(&log, "x")).unwrap();
        }

        let order: Vec<String> = pool
            .resolve("event.some.thing.run")
            .iter()
            .map(|entry| {
                pool.topics()
                    .into_iter()
                    .find(|t| pool.get_topic(t).unwrap().listener_ids().contains(&entry.id))
                    .unwrap()
            })
            .collect();
        assert_eq!(
            order,
            vec![
                "event.some.thing.run",
                "event.some.*.run",
                "event.some.*.*",
                "event.some.**",
                "**.thing.run",
            ]
        );
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_everything() {
        let pool = test_pool();
        let calls = Arc::new(AtomicU32::new(0));
        pool.on("a.b", counter(&calls)).unwrap();

        pool.close().await.unwrap();
        assert!(pool.is_closed());
        assert_eq!(pool.close().await, Err(EmitterError::AlreadyClosed));

        assert_eq!(pool.emit_sync("a.b", ()).await, vec![DispatchError::EmitterClosed]);

        let mut rx = pool.emit("a.b", ());
        assert_eq!(rx.recv().await, Some(Err(DispatchError::EmitterClosed)));
        assert_eq!(rx.recv().await, None);

        assert_eq!(pool.ensure_topic("a.b").err(), Some(EmitterError::EmitterClosed));
        assert!(matches!(
            pool.get_topic("a.b"),
            Err(EmitterError::TopicNotFound { .. })
        ));
        assert!(pool.topics().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let pool = test_pool();
        assert!(matches!(
            pool.on("a..b", counter(&Arc::default())),
            Err(EmitterError::InvalidTopicName { .. })
        ));

        let mut signals = pool.signals();
        let errors = pool.emit_sync("a.*", ()).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].as_label(), "dispatch_invalid_topic");

        let signal = signals.try_recv().unwrap();
        assert_eq!(signal.kind, SignalKind::EmitRejected);
        assert_eq!(signal.topic.as_deref(), Some("a.*"));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let pool = test_pool();
        let panics = Arc::new(AtomicU32::new(0));
        {
            let panics = Arc::clone(&panics);
            pool.set_panic_handler(move |_| {
                panics.fetch_add(1, Ordering::SeqCst);
            });
        }

        let ok_calls = Arc::new(AtomicU32::new(0));
        let ok = pool.on("job.run", counter(&ok_calls)).unwrap();
        let failing = pool
            .on(
                "job.run",
                ListenerFn::arc(|_ev: Event| async { Err(ListenerError::fail("boom")) }),
            )
            .unwrap();
        let panicking = pool
            .on(
                "job.*",
                ListenerFn::arc(|_ev: Event| async { explode("listener exploded") }),
            )
            .unwrap();

        let errors = pool.emit_sync("job.run", ()).await;
        assert_eq!(errors.len(), 2);
        assert_eq!(ok_calls.load(Ordering::SeqCst), 1);
        assert_eq!(panics.load(Ordering::SeqCst), 1);

        let failed = errors.iter().find(|e| !e.is_panic()).unwrap();
        assert_eq!(failed.listener(), Some(&*failing));
        let panicked = errors.iter().find(|e| e.is_panic()).unwrap();
        assert_eq!(panicked.listener(), Some(&*panicking));
        assert_eq!(panicked.as_message(), "panic: listener exploded");
        assert!(errors.iter().all(|e| e.listener() != Some(&*ok)));

        // The pool keeps working afterwards.
        assert_eq!(pool.emit_sync("job.run", ()).await.len(), 2);
        assert_eq!(ok_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_error_handler_can_swallow() {
        let pool = test_pool();
        let seen = Arc::new(AtomicU32::new(0));
        {
            let seen = Arc::clone(&seen);
            pool.set_error_handler(move |ev, _err| {
                assert_eq!(ev.topic(), "a.b");
                seen.fetch_add(1, Ordering::SeqCst);
                None
            });
        }
        pool.on("a.b", ListenerFn::arc(|_ev: Event| async { Err(ListenerError::fatal("no")) }))
            .unwrap();

        assert!(pool.emit_sync("a.b", ()).await.is_empty());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_converges() {
        let pool = test_pool();
        pool.set_retry(RetryPolicy::new(
            3,
            ConstantBackoff::factory(Duration::from_millis(10)),
        ));
        let mut signals = pool.signals();

        let calls = Arc::new(AtomicU32::new(0));
        {
            let calls = Arc::clone(&calls);
            pool.on(
                "flaky.op",
                ListenerFn::arc(move |_ev: Event| {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(ListenerError::fail("not yet"))
                        } else {
                            Ok(())
                        }
                    }
                }),
            )
            .unwrap();
        }

        assert!(pool.emit_sync("flaky.op", ()).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let kinds: Vec<SignalKind> = std::iter::from_fn(|| signals.try_recv().ok())
            .map(|s| s.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                SignalKind::RetryScheduled,
                SignalKind::RetryScheduled,
                SignalKind::ListenerSucceeded,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_errors_and_panics_are_not_retried() {
        let pool = test_pool();
        pool.set_retry(RetryPolicy::new(
            5,
            ConstantBackoff::factory(Duration::from_millis(10)),
        ));
        pool.set_panic_handler(|_| {});

        let fatal_calls = Arc::new(AtomicU32::new(0));
        {
            let calls = Arc::clone(&fatal_calls);
            pool.on(
                "x.y",
                ListenerFn::arc(move |_ev: Event| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(ListenerError::fatal("bad input")) }
                }),
            )
            .unwrap();
        }
        let panic_calls = Arc::new(AtomicU32::new(0));
        {
            let calls = Arc::clone(&panic_calls);
            pool.on(
                "x.y",
                ListenerFn::arc(move |_ev: Event| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { explode("once") }
                }),
            )
            .unwrap();
        }

        assert_eq!(pool.emit_sync("x.y", ()).await.len(), 2);
        assert_eq!(fatal_calls.load(Ordering::SeqCst), 1);
        assert_eq!(panic_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listener_retry_overrides_pool_retry() {
        let pool = test_pool();
        let calls = Arc::new(AtomicU32::new(0));
        {
            let calls = Arc::clone(&calls);
            let opts = ListenerOptions::new().with_retry(RetryPolicy::new(
                2,
                ConstantBackoff::factory(Duration::from_millis(5)),
            ));
            pool.on_with(
                "r.s",
                ListenerFn::arc(move |_ev: Event| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(ListenerError::fail("down")) }
                }),
                opts,
            )
            .unwrap();
        }

        let errors = pool.emit_sync("r.s", ()).await;
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].as_message(), "error: down");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_records_event_and_final_result() {
        let store = Arc::new(MemoryStore::new());
        let pool = EventPool::builder(Config::default())
            .without_registry()
            .with_event_store(store.clone())
            .build();
        let id = pool
            .on("order.paid", ListenerFn::arc(|_ev: Event| async { Ok(()) }))
            .unwrap();

        assert!(pool.emit_sync("order.paid", 10u64).await.is_empty());

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert!(events[0].id().is_some());
        let results = store.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].handler_id, &*id);
        assert_eq!(results[0].event_id.as_deref(), events[0].id());
        assert!(results[0].is_success());
    }

    #[tokio::test]
    async fn test_store_skips_listeners_that_already_succeeded() {
        let store = Arc::new(MemoryStore::new());
        let pool = EventPool::builder(Config::default())
            .without_registry()
            .with_event_store(store.clone())
            .build();
        let calls = Arc::new(AtomicU32::new(0));
        pool.on("pay.done", counter(&calls)).unwrap();

        let event = Event::new("pay.done", 1u8).with_id("evt-1");
        assert!(pool.emit_event_sync(event.clone()).await.is_empty());
        assert!(pool.emit_event_sync(event).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A fresh id is dispatched again.
        assert!(pool.emit_sync("pay.done", 1u8).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_store_failures_reach_error_handler_only() {
        let store = Arc::new(MemoryStore::new());
        store.close();

        let reported: Arc<Mutex<Vec<&'static str>>> = Arc::default();
        let pool = {
            let reported = Arc::clone(&reported);
            EventPool::builder(Config::default())
                .without_registry()
                .with_event_store(store)
                .with_error_handler(move |_ev, err| {
                    reported.lock().push(err.as_label());
                    Some(err)
                })
                .build()
        };
        let calls = Arc::new(AtomicU32::new(0));
        pool.on("s.t", counter(&calls)).unwrap();

        assert!(pool.emit_sync("s.t", ()).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *reported.lock(),
            vec!["dispatch_store_failed", "dispatch_store_failed"]
        );
    }

    #[tokio::test]
    async fn test_typed_topic_round_trip() {
        #[derive(Clone, Debug, PartialEq)]
        struct UserCreated {
            id: u64,
        }

        let pool = test_pool();
        let topic = TypedTopic::<UserCreated>::new("user.created");
        let seen: Arc<Mutex<Vec<u64>>> = Arc::default();
        {
            let seen = Arc::clone(&seen);
            let (ids, res) = pool.register_listeners([topic.bind(move |u: UserCreated| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().push(u.id);
                    Ok(())
                }
            })]);
            res.unwrap();
            assert_eq!(ids.len(), 1);
        }

        assert!(pool.emit_event_sync(topic.wrap(UserCreated { id: 7 })).await.is_empty());
        assert_eq!(*seen.lock(), vec![7]);

        let errors = pool.emit_sync("user.created", "not a user").await;
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            DispatchError::Listener {
                error: ListenerError::Decode { .. },
                ..
            }
        ));
        assert_eq!(*seen.lock(), vec![7]);
    }

    #[tokio::test]
    async fn test_emit_reports_one_outcome_per_listener() {
        let pool = test_pool();
        for _ in 0..3 {
            pool.on("n.m", ListenerFn::arc(|_ev: Event| async { Ok(()) })).unwrap();
        }
        pool.on("n.*", ListenerFn::arc(|_ev: Event| async { Err(ListenerError::fail("x")) }))
            .unwrap();

        let mut rx = pool.emit("n.m", ());
        let mut ok = 0;
        let mut failed = 0;
        while let Some(outcome) = rx.recv().await {
            match outcome {
                Ok(()) => ok += 1,
                Err(_) => failed += 1,
            }
        }
        assert_eq!((ok, failed), (3, 1));

        // No listener: the channel closes without values.
        let mut rx = pool.emit("nobody.home", ());
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_off_and_lookups() {
        let pool = test_pool();
        let calls = Arc::new(AtomicU32::new(0));
        let id = pool.on(" a.b ", counter(&calls)).unwrap();

        assert_eq!(pool.topics(), vec!["a.b".to_string()]);
        assert_eq!(pool.get_topic("a.b").unwrap().len(), 1);

        pool.off("a.b", &id).unwrap();
        assert!(matches!(
            pool.off("a.b", &id),
            Err(EmitterError::ListenerNotFound { .. })
        ));
        assert!(matches!(
            pool.off("missing", &id),
            Err(EmitterError::TopicNotFound { .. })
        ));

        assert!(pool.emit_sync("a.b", ()).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!pool.interested_in("a.b"));
    }

    #[tokio::test]
    async fn test_register_listeners_stops_at_missing_listener() {
        let pool = test_pool();
        let log: Log = Arc::default();

        let (ids, res) = pool.register_listeners([
            ListenerBinding::new("a.one").listener(recorder(&log, "one")),
            ListenerBinding::new("a.two"),
            ListenerBinding::new("a.three").listener(recorder(&log, "three")),
        ]);
        assert_eq!(res, Err(EmitterError::NilListener));
        assert_eq!(ids.len(), 1);
        assert_eq!(pool.topics(), vec!["a.one".to_string()]);
    }

    #[tokio::test]
    async fn test_middleware_wraps_in_order() {
        fn tagging(
            log: Log,
            tag: &'static str,
        ) -> impl Fn(ListenerRef) -> ListenerRef + Send + Sync + 'static {
            move |inner: ListenerRef| -> ListenerRef {
                let log = Arc::clone(&log);
                ListenerFn::arc(move |ev: Event| {
                    log.lock().push(tag.to_string());
                    inner.call(ev)
                })
            }
        }

        let pool = test_pool();
        let log: Log = Arc::default();
        let opts = ListenerOptions::new()
            .with_middleware(tagging(Arc::clone(&log), "outer"))
            .with_middleware(tagging(Arc::clone(&log), "inner"));
        pool.on_with("m.w", recorder(&log, "listener"), opts).unwrap();

        assert!(pool.emit_sync("m.w", ()).await.is_empty());
        assert_eq!(*log.lock(), vec!["outer", "inner", "listener"]);
    }

    #[tokio::test]
    async fn test_custom_id_generator() {
        let next = Arc::new(AtomicU32::new(0));
        let pool = {
            let next = Arc::clone(&next);
            EventPool::builder(Config::default())
                .without_registry()
                .with_id_generator(move || format!("id-{}", next.fetch_add(1, Ordering::SeqCst)))
                .build()
        };
        assert_eq!(&*pool.on("a", counter(&Arc::default())).unwrap(), "id-0");
        assert_eq!(&*pool.on("b", counter(&Arc::default())).unwrap(), "id-1");
    }

    #[tokio::test]
    async fn test_replay_dispatches_queued_events() {
        let store = Arc::new(MemoryStore::queued());
        let producer = EventPool::builder(Config::default())
            .without_registry()
            .with_event_store(store.clone())
            .build();
        let consumer = test_pool();

        let (tx, mut rx) = mpsc::channel::<String>(4);
        consumer
            .on(
                "audit.*",
                ListenerFn::arc(move |ev: Event| {
                    let tx = tx.clone();
                    async move {
                        let _ = tx.send(ev.topic().to_string()).await;
                        Ok(())
                    }
                }),
            )
            .unwrap();
        consumer.replay_from(store.clone()).unwrap();

        assert!(producer.emit_sync("audit.login", ()).await.is_empty());
        assert_eq!(rx.recv().await.as_deref(), Some("audit.login"));

        consumer.close().await.unwrap();
        assert_eq!(
            consumer.replay_from(store).err(),
            Some(EmitterError::EmitterClosed)
        );
    }

    #[tokio::test]
    async fn test_replaying_own_store_dispatches_once() {
        let store = Arc::new(MemoryStore::queued());
        let pool = EventPool::builder(Config::default())
            .without_registry()
            .with_event_store(store.clone())
            .build();
        let calls = Arc::new(AtomicU32::new(0));
        pool.on("audit.*", counter(&calls)).unwrap();
        pool.replay_from(store.clone()).unwrap();

        assert!(pool.emit_sync("audit.login", ()).await.is_empty());

        tokio::time::timeout(Duration::from_secs(5), async {
            while store.results().is_empty() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.events().len(), 1);
        assert_eq!(store.results().len(), 1);
        assert_eq!(store.queue_len(), 0);

        pool.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsaved_event_falls_back_to_inline_dispatch() {
        let store = Arc::new(MemoryStore::queued());
        let pool = EventPool::builder(Config::default())
            .without_registry()
            .with_event_store(store.clone())
            .build();
        let calls = Arc::new(AtomicU32::new(0));
        pool.on("audit.*", counter(&calls)).unwrap();
        pool.replay_from(store.clone()).unwrap();
        store.close();

        assert!(pool.emit_sync("audit.login", ()).await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.events().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandon_drops_waiting_invocations() {
        let workers = WorkerPool::arc("serial", Some(1));
        let pool = EventPool::builder(Config::default())
            .without_registry()
            .with_pool(workers.clone())
            .build();
        for _ in 0..3 {
            pool.on(
                "slow.job",
                ListenerFn::arc(|_ev: Event| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(())
                }),
            )
            .unwrap();
        }

        let mut rx = pool.emit("slow.job", ());
        tokio::time::sleep(Duration::from_millis(1)).await;
        pool.shutdown(ShutdownMode::Abandon).await.unwrap();

        assert_eq!(rx.recv().await, Some(Ok(())));
        assert_eq!(rx.recv().await, None);
        assert_eq!(workers.abandoned_tasks(), 2);
    }

    struct KindRecorder(Mutex<Vec<SignalKind>>);

    #[async_trait]
    impl Subscribe for KindRecorder {
        async fn on_signal(&self, signal: &Signal) {
            self.0.lock().push(signal.kind);
        }
    }

    #[tokio::test]
    async fn test_subscribers_see_signals_until_close() {
        let rec = Arc::new(KindRecorder(Mutex::new(Vec::new())));
        let pool = EventPool::builder(Config::default())
            .without_registry()
            .with_subscribers(vec![rec.clone()])
            .build();
        pool.on("a.b", ListenerFn::arc(|_ev: Event| async { Err(ListenerError::fail("x")) }))
            .unwrap();

        assert_eq!(pool.emit_sync("a.b", ()).await.len(), 1);
        pool.close().await.unwrap();

        assert_eq!(
            *rec.0.lock(),
            vec![SignalKind::ListenerFailed, SignalKind::PoolClosed]
        );
    }
}
