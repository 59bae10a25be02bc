//! # Rexlist Runtime
//!
//! Runtime implementation for the rexlist unidirectional architecture.
//!
//! This crate provides the Store runtime that serializes every state change
//! through the middleware pipeline and the reducer, publishes snapshots, and
//! executes the effects middleware hands back.
//!
//! ## Core Components
//!
//! - **Store**: Owns the state tree and is the single entry point for dispatch
//! - **Effect Executor**: Runs effect descriptions and feeds produced actions back
//! - **Snapshots**: Every fold publishes an immutable, versioned `Arc<S>`
//! - **`ViewStore`**: Projection of a store onto a narrower state/action pair
//!
//! ## Example
//!
//! ```
//! use rexlist_core::reducer::Reducer;
//! use rexlist_runtime::Store;
//!
//! #[derive(Clone, Debug, Default)]
//! struct Counter {
//!     count: i64,
//! }
//!
//! #[derive(Clone, Debug)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = Counter;
//!     type Action = CounterAction;
//!
//!     fn reduce(&self, state: &mut Counter, action: &CounterAction) {
//!         match action {
//!             CounterAction::Increment => state.count += 1,
//!         }
//!     }
//! }
//!
//! # let result: Result<(), rexlist_runtime::StoreError> = tokio_test::block_on(async {
//! let store = Store::new(Counter::default(), CounterReducer);
//! store.send(CounterAction::Increment).await?;
//! assert_eq!(store.state(|s| s.count), 1);
//! # Ok(())
//! # });
//! # assert!(result.is_ok());
//! ```

use rexlist_core::cancellation::{CancellationSignal, SubscriptionHandle};
use rexlist_core::effect::Effect;
use rexlist_core::middleware::{Middleware, Pipeline};
use rexlist_core::reducer::Reducer;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::watch;

/// Retry logic with exponential backoff
pub mod retry;

/// Prometheus metrics for observability
pub mod metrics;

/// Action logging middleware
pub mod logger;

/// Projections of a store onto narrower state and action types
pub mod view;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        ///
        /// Some effects were still running when the timeout elapsed.
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a terminal action or state
        ///
        /// Returned by `send_and_wait_for`, `wait_for_state` and
        /// `EffectHandle::wait_with_timeout` when the timeout expires first.
        #[error("Timeout waiting for store")]
        Timeout,

        /// Action broadcast or snapshot channel closed
        #[error("Store channel closed")]
        ChannelClosed,
    }
}

pub use error::StoreError;
pub use logger::LoggerMiddleware;
pub use retry::RetryPolicy;
pub use store::{Snapshot, Store, Subscription};
pub use view::ViewStore;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use rexlist_runtime::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_broadcast_capacity(64)
///     .with_shutdown_timeout(Duration::from_secs(5));
/// assert_eq!(config.action_broadcast_capacity, 64);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Capacity of the broadcast channel behind `subscribe_actions`
    pub action_broadcast_capacity: usize,
    /// Default timeout for graceful shutdown
    pub default_shutdown_timeout: Duration,
}

impl StoreConfig {
    /// Create a new configuration with custom values
    #[must_use]
    pub const fn new(action_broadcast_capacity: usize, default_shutdown_timeout: Duration) -> Self {
        Self {
            action_broadcast_capacity,
            default_shutdown_timeout,
        }
    }

    /// Set the action broadcast capacity (at least 1)
    #[must_use]
    pub const fn with_broadcast_capacity(mut self, capacity: usize) -> Self {
        self.action_broadcast_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Set the default shutdown timeout
    #[must_use]
    pub const fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.default_shutdown_timeout = timeout;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            action_broadcast_capacity: 16,
            default_shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects of that one
/// action to complete. Actions those effects feed back get their own handles;
/// they are not tracked here.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(Action::Start).await?;
/// handle.wait_with_timeout(Duration::from_secs(5)).await?;
/// // All effects from Action::Start are now complete
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a new effect handle and the tracking half the executor uses
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: Arc::new(tx),
        };

        (handle, tracking)
    }

    /// Create a handle that's already complete
    ///
    /// Useful for initialization in loops where you need a `last_handle`.
    #[must_use]
    pub fn completed() -> Self {
        let (handle, _tracking) = Self::new();
        handle
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            // Every tracking half is gone, so nothing can still be running
            if self.completion.changed().await.is_err() {
                break;
            }
        }
    }

    /// Wait for all effects to complete with a timeout
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if the timeout expires before all
    /// effects complete.
    pub async fn wait_with_timeout(&mut self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: Effect tracking context passed through effect execution
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: Arc<watch::Sender<()>>,
}

impl EffectTracking {
    /// Increment the effect counter (effect started)
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the effect counter (effect completed)
    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            self.notifier.send_replace(());
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Ensures the effect counter is always decremented, even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Guard that decrements an atomic counter on drop (for shutdown tracking)
struct AtomicCounterGuard(Arc<AtomicUsize>);

impl Drop for AtomicCounterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Internal: the cancellation signals an effect runs under
///
/// Empty for plain effects; every `Effect::Cancellable` on the way down adds
/// its signal. Cancelled as soon as any signal fires.
#[derive(Clone, Default)]
struct Gate {
    signals: Vec<CancellationSignal>,
}

impl Gate {
    fn with(&self, signal: CancellationSignal) -> Self {
        let mut signals = self.signals.clone();
        signals.push(signal);
        Self { signals }
    }

    fn is_cancelled(&self) -> bool {
        self.signals.iter().any(CancellationSignal::is_cancelled)
    }

    async fn cancelled(&self) {
        if self.signals.is_empty() {
            std::future::pending::<()>().await;
            return;
        }

        let waits = self
            .signals
            .iter()
            .map(|signal| Box::pin(signal.cancelled()));
        futures::future::select_all(waits).await;
    }
}

/// Internal: where an action entered the store from
#[derive(Clone, Copy)]
enum Origin<'a> {
    /// `Store::send` from outside
    External,
    /// Produced by an effect running under `gate`
    Effect(&'a Gate),
}

/// Store module - The runtime for reducers and middleware
pub mod store {
    use super::{
        Arc, AtomicBool, AtomicCounterGuard, AtomicUsize, CancellationSignal, DecrementGuard,
        Duration, Effect, EffectHandle, EffectTracking, Gate, Middleware, Ordering, Origin,
        Pipeline, Reducer, StoreConfig, StoreError, SubscriptionHandle,
    };
    use futures::StreamExt;
    use std::sync::{Mutex, PoisonError, Weak};
    use tokio::sync::{broadcast, watch};

    /// One committed state of the store
    ///
    /// Versions start at 0 for the initial state and grow by exactly one per
    /// fold, so observers can detect gaps and duplicates.
    #[derive(Debug)]
    pub struct Snapshot<S> {
        /// Number of folds committed before this snapshot
        pub version: u64,
        /// The immutable state
        pub state: Arc<S>,
    }

    impl<S> Clone for Snapshot<S> {
        fn clone(&self) -> Self {
            Self {
                version: self.version,
                state: Arc::clone(&self.state),
            }
        }
    }

    type Observer<S> = Arc<dyn Fn(&Snapshot<S>) + Send + Sync>;

    struct ObserverRegistry<S> {
        next_id: u64,
        observers: Vec<(u64, Observer<S>)>,
    }

    /// Keeps an observer registered
    ///
    /// Dropping the subscription (or calling [`Subscription::unsubscribe`])
    /// removes the observer; it is not called for any fold that starts after
    /// that.
    #[must_use = "dropping a Subscription unsubscribes immediately"]
    pub struct Subscription {
        remove: Option<Box<dyn FnOnce() + Send + Sync>>,
    }

    impl Subscription {
        pub(crate) fn new<F>(remove: F) -> Self
        where
            F: FnOnce() + Send + Sync + 'static,
        {
            Self {
                remove: Some(Box::new(remove)),
            }
        }

        /// Stop observing
        pub fn unsubscribe(mut self) {
            if let Some(remove) = self.remove.take() {
                remove();
            }
        }
    }

    impl Drop for Subscription {
        fn drop(&mut self) {
            if let Some(remove) = self.remove.take() {
                remove();
            }
        }
    }

    impl std::fmt::Debug for Subscription {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Subscription")
                .field("active", &self.remove.is_some())
                .finish()
        }
    }

    /// Everything the fold lock protects
    pub(crate) struct FoldCore<S, A, R> {
        state: Arc<S>,
        reducer: R,
        middleware: Pipeline<S, A>,
        version: u64,
    }

    /// The Store - runtime coordinator for a reducer and its middleware
    ///
    /// The Store manages:
    /// 1. State (an `Arc<S>` snapshot, replaced copy-on-write on every fold)
    /// 2. The fold lock serializing middleware observation and reduction
    /// 3. Effect execution (with feedback loop)
    /// 4. Snapshot publication to observers
    ///
    /// Cloning a store is cheap and every clone dispatches into the same state.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, R> {
        pub(crate) core: Arc<tokio::sync::Mutex<FoldCore<S, A, R>>>,
        snapshots: Arc<watch::Sender<Snapshot<S>>>,
        observers: Arc<Mutex<ObserverRegistry<S>>>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
        halt: Arc<Mutex<Option<SubscriptionHandle>>>,
        halt_signal: CancellationSignal,
        /// Action broadcast channel for observing actions produced by effects.
        action_broadcast: broadcast::Sender<A>,
        config: StoreConfig,
    }

    impl<S, A, R> Store<S, A, R>
    where
        S: Clone + Send + Sync + 'static,
        A: Clone + Send + 'static,
        R: Reducer<State = S, Action = A> + Send + 'static,
    {
        /// Create a new store with no middleware
        #[must_use]
        pub fn new(initial_state: S, reducer: R) -> Self {
            Self::with_config(initial_state, reducer, Pipeline::default(), StoreConfig::default())
        }

        /// Create a new store with a middleware pipeline
        ///
        /// # Example
        ///
        /// ```ignore
        /// let store = Store::with_middleware(
        ///     AppState::default(),
        ///     app_reducer(),
        ///     compose_middleware(vec![Box::new(LoggerMiddleware::new("app"))]),
        /// );
        /// ```
        #[must_use]
        pub fn with_middleware(initial_state: S, reducer: R, middleware: Pipeline<S, A>) -> Self {
            Self::with_config(initial_state, reducer, middleware, StoreConfig::default())
        }

        /// Create a new store with custom configuration
        #[must_use]
        pub fn with_config(
            initial_state: S,
            reducer: R,
            middleware: Pipeline<S, A>,
            config: StoreConfig,
        ) -> Self {
            let (action_broadcast, _) = broadcast::channel(config.action_broadcast_capacity.max(1));
            let state = Arc::new(initial_state);
            let (snapshots, _) = watch::channel(Snapshot {
                version: 0,
                state: Arc::clone(&state),
            });
            let halt = SubscriptionHandle::new();
            let halt_signal = halt.signal();

            Self {
                core: Arc::new(tokio::sync::Mutex::new(FoldCore {
                    state,
                    reducer,
                    middleware,
                    version: 0,
                })),
                snapshots: Arc::new(snapshots),
                observers: Arc::new(Mutex::new(ObserverRegistry {
                    next_id: 0,
                    observers: Vec::new(),
                })),
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
                halt: Arc::new(Mutex::new(Some(halt))),
                halt_signal,
                action_broadcast,
                config,
            }
        }

        /// The configuration this store was built with
        #[must_use]
        pub const fn config(&self) -> &StoreConfig {
            &self.config
        }

        /// Initiate graceful shutdown
        ///
        /// New actions are rejected, long-running stream effects are stopped,
        /// and the call waits for in-flight effects to finish.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still
        /// running when `timeout` elapses.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            metrics::counter!("store.shutdown.initiated").increment(1);

            // Set shutdown flag to reject new actions
            self.shutdown.store(true, Ordering::Release);

            if let Some(halt) = self
                .halt
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take()
            {
                halt.cancel();
            }

            // Wait for pending effects with timeout
            let start = std::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);

                if pending == 0 {
                    tracing::info!("All effects completed, shutdown successful");
                    metrics::counter!("store.shutdown.completed").increment(1);
                    return Ok(());
                }

                if start.elapsed() >= timeout {
                    tracing::error!(
                        pending_effects = pending,
                        "Shutdown timeout: {} effects still running",
                        pending
                    );
                    metrics::counter!("store.shutdown.timeout").increment(1);
                    return Err(StoreError::ShutdownTimeout(pending));
                }

                tracing::debug!(
                    pending_effects = pending,
                    elapsed_ms = start.elapsed().as_millis(),
                    "Waiting for effects to complete"
                );

                tokio::time::sleep(poll_interval).await;
            }
        }

        /// Send an action to the store
        ///
        /// This is the primary way to interact with the store:
        /// 1. Acquires the fold lock (FIFO, so folds happen in arrival order)
        /// 2. Shows the action to every middleware, in order
        /// 3. Folds the action into a copy-on-write clone of the state
        /// 4. Publishes the new snapshot and notifies observers
        /// 5. Executes the middleware effects asynchronously
        ///
        /// `send()` returns once the fold is committed, not when the effects
        /// finish; use the returned [`EffectHandle`] for that.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
            self.send_internal(action, Origin::External).await
        }

        /// Send an action and wait for a matching result action
        ///
        /// Designed for request-response interactions. It subscribes to the
        /// action broadcast, sends the initial action, then waits for an
        /// effect-produced action matching the predicate.
        ///
        /// # Errors
        ///
        /// - [`StoreError::Timeout`]: Timeout expired before matching action received
        /// - [`StoreError::ChannelClosed`]: Action broadcast channel closed
        /// - [`StoreError::ShutdownInProgress`]: Store is shutting down
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            // Subscribe BEFORE sending to avoid race condition
            let mut rx = self.action_broadcast.subscribe();

            self.send(action).await?;

            tokio::time::timeout(timeout, async {
                loop {
                    match rx.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // If the terminal action was dropped, the timeout catches it
                            tracing::warn!(skipped, "Action observer lagged, {} actions skipped", skipped);
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            })
            .await
            .map_err(|_| StoreError::Timeout)?
        }

        /// Subscribe to all actions produced by effects
        ///
        /// Only actions produced by effects are broadcast (not initial
        /// actions sent via `send`), in fold order. Actions from a cancelled
        /// effect are never broadcast.
        #[must_use]
        pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Register an observer for every committed snapshot
        ///
        /// The observer runs synchronously after each fold, under the fold
        /// lock, so it sees snapshots in commit order with no gaps or
        /// duplicates. It must return quickly and must not block on the
        /// store; spawn a task if it needs to dispatch.
        pub fn subscribe<F>(&self, observer: F) -> Subscription
        where
            F: Fn(&Snapshot<S>) + Send + Sync + 'static,
        {
            let id = {
                let mut registry = self
                    .observers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let id = registry.next_id;
                registry.next_id += 1;
                registry.observers.push((id, Arc::new(observer)));
                id
            };
            tracing::trace!(observer = id, "Observer registered");

            let registry: Weak<Mutex<ObserverRegistry<S>>> = Arc::downgrade(&self.observers);
            Subscription::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .observers
                        .retain(|(observer, _)| *observer != id);
                    tracing::trace!(observer = id, "Observer removed");
                }
            })
        }

        /// A receiver that always holds the latest snapshot
        ///
        /// Unlike [`Store::subscribe`], a slow receiver only ever sees the
        /// most recent snapshot.
        #[must_use]
        pub fn watch(&self) -> watch::Receiver<Snapshot<S>> {
            self.snapshots.subscribe()
        }

        /// The latest committed state
        #[must_use]
        pub fn current_state(&self) -> Arc<S> {
            Arc::clone(&self.snapshots.borrow().state)
        }

        /// The latest committed snapshot, with its version
        #[must_use]
        pub fn snapshot(&self) -> Snapshot<S> {
            self.snapshots.borrow().clone()
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let task_count = store.state(|s| s.tasks.len());
        /// ```
        pub fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.current_state();
            f(&state)
        }

        /// Wait until the committed state satisfies `predicate`
        ///
        /// Returns immediately if the current state already does.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Timeout`] if no matching state is committed
        /// within `timeout`.
        pub async fn wait_for_state<F>(&self, predicate: F, timeout: Duration) -> Result<Arc<S>, StoreError>
        where
            F: Fn(&S) -> bool,
        {
            let mut rx = self.snapshots.subscribe();
            let waited = tokio::time::timeout(timeout, rx.wait_for(|snapshot| predicate(&snapshot.state))).await;

            match waited {
                Ok(Ok(snapshot)) => Ok(Arc::clone(&snapshot.state)),
                Ok(Err(_)) => Err(StoreError::ChannelClosed),
                Err(_) => Err(StoreError::Timeout),
            }
        }

        /// Internal send implementation
        ///
        /// `origin` carries the cancellation gate of the effect that produced
        /// the action; the gate is checked under the fold lock so nothing from
        /// a cancelled effect is folded once the cancelling fold committed.
        async fn send_internal(&self, action: A, origin: Origin<'_>) -> Result<EffectHandle, StoreError> {
            self.reject_if_shutting_down()?;

            metrics::counter!("store.commands.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let effect = {
                let mut guard = self.core.lock().await;
                tracing::trace!("Acquired fold lock");

                // Shutdown may have started while this action waited for the lock
                self.reject_if_shutting_down()?;

                if let Origin::Effect(gate) = origin {
                    if gate.is_cancelled() {
                        tracing::trace!("Dropping action from a cancelled effect");
                        metrics::counter!("store.subscription.dropped_actions").increment(1);
                        return Ok(EffectHandle::completed());
                    }
                    let _ = self.action_broadcast.send(action.clone());
                }

                let core = &mut *guard;
                let start = std::time::Instant::now();

                let effect = core.middleware.handle(&action, &core.state);
                core.reducer.reduce(Arc::make_mut(&mut core.state), &action);
                core.version += 1;

                metrics::histogram!("store.reducer.duration_seconds").record(start.elapsed().as_secs_f64());

                let snapshot = Snapshot {
                    version: core.version,
                    state: Arc::clone(&core.state),
                };
                self.snapshots.send_replace(snapshot.clone());
                self.notify(&snapshot);

                tracing::debug!(version = core.version, "Fold committed");
                effect
            };

            self.execute_effect_internal(effect, &tracking, &Gate::default());

            Ok(handle)
        }

        fn reject_if_shutting_down(&self) -> Result<(), StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }
            Ok(())
        }

        /// Call every registered observer with a freshly committed snapshot
        fn notify(&self, snapshot: &Snapshot<S>) {
            let observers: Vec<Observer<S>> = {
                let registry = self
                    .observers
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                registry
                    .observers
                    .iter()
                    .map(|(_, observer)| Arc::clone(observer))
                    .collect()
            };

            for observer in observers {
                observer(snapshot);
            }
        }

        #[allow(clippy::too_many_lines)]
        #[tracing::instrument(skip_all, name = "execute_effect")]
        fn execute_effect_internal(&self, effect: Effect<A>, tracking: &EffectTracking, gate: &Gate) {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let guards = self.track(tracking);
                    let store = self.clone();
                    let gate = gate.clone();

                    tokio::spawn(async move {
                        let _guards = guards;

                        let produced = tokio::select! {
                            biased;
                            () = gate.cancelled() => None,
                            action = fut => action,
                        };

                        if let Some(action) = produced {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            let _ = store.send_internal(action, Origin::Effect(&gate)).await;
                        } else {
                            tracing::trace!("Effect::Future completed with no action");
                        }
                    });
                },
                Effect::Delay { duration, action } => {
                    tracing::trace!("Executing Effect::Delay (duration: {:?})", duration);
                    metrics::counter!("store.effects.executed", "type" => "delay").increment(1);
                    let guards = self.track(tracking);
                    let store = self.clone();
                    let gate = gate.clone();

                    tokio::spawn(async move {
                        let _guards = guards;

                        tokio::select! {
                            biased;
                            () = gate.cancelled() => {
                                tracing::trace!("Effect::Delay cancelled");
                            },
                            () = tokio::time::sleep(duration) => {
                                tracing::trace!("Effect::Delay completed, sending action");
                                let _ = store.send_internal(*action, Origin::Effect(&gate)).await;
                            },
                        }
                    });
                },
                Effect::Parallel(effects) => {
                    tracing::trace!("Executing Effect::Parallel with {} effects", effects.len());
                    metrics::counter!("store.effects.executed", "type" => "parallel").increment(1);

                    for effect in effects {
                        self.execute_effect_internal(effect, tracking, gate);
                    }
                },
                Effect::Sequential(effects) => {
                    let effect_count = effects.len();
                    tracing::trace!("Executing Effect::Sequential with {} effects", effect_count);
                    metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);
                    let guards = self.track(tracking);
                    let store = self.clone();
                    let gate = gate.clone();

                    tokio::spawn(async move {
                        let _guards = guards;

                        // Execute effects one by one, waiting for each to complete
                        for (idx, effect) in effects.into_iter().enumerate() {
                            if gate.is_cancelled() {
                                tracing::trace!("Effect::Sequential cancelled");
                                break;
                            }
                            tracing::trace!("Executing sequential effect {} of {}", idx + 1, effect_count);

                            let (mut sub_handle, sub_tracking) = EffectHandle::new();
                            store.execute_effect_internal(effect, &sub_tracking, &gate);
                            drop(sub_tracking);
                            sub_handle.wait().await;
                        }
                        tracing::trace!("Effect::Sequential completed");
                    });
                },
                Effect::Stream(mut stream) => {
                    tracing::trace!("Executing Effect::Stream");
                    metrics::counter!("store.effects.executed", "type" => "stream").increment(1);
                    let guards = self.track(tracking);
                    let store = self.clone();
                    // Streams are open-ended, so shutdown has to be able to stop them
                    let gate = gate.with(self.halt_signal.clone());

                    tokio::spawn(async move {
                        let _guards = guards;
                        let mut items: u64 = 0;

                        loop {
                            let next = tokio::select! {
                                biased;
                                () = gate.cancelled() => {
                                    tracing::debug!(items, "Effect::Stream cancelled");
                                    break;
                                },
                                next = stream.next() => next,
                            };

                            let Some(action) = next else {
                                tracing::debug!(items, "Effect::Stream completed");
                                break;
                            };

                            items += 1;
                            if let Err(error) = store.send_internal(action, Origin::Effect(&gate)).await {
                                tracing::debug!(error = %error, "Effect::Stream stopped");
                                break;
                            }
                        }
                    });
                },
                Effect::Cancellable { signal, effect } => {
                    if signal.is_cancelled() {
                        tracing::trace!("Skipping already cancelled effect");
                        metrics::counter!("store.effects.executed", "type" => "cancelled").increment(1);
                        return;
                    }
                    self.execute_effect_internal(*effect, tracking, &gate.with(signal));
                },
            }
        }

        /// Count a spawned effect against its handle and the shutdown drain
        fn track(&self, tracking: &EffectTracking) -> (DecrementGuard, AtomicCounterGuard) {
            tracking.increment();
            self.pending_effects.fetch_add(1, Ordering::SeqCst);
            (
                DecrementGuard(tracking.clone()),
                AtomicCounterGuard(Arc::clone(&self.pending_effects)),
            )
        }
    }

    impl<S, A, R> Clone for Store<S, A, R> {
        fn clone(&self) -> Self {
            Self {
                core: Arc::clone(&self.core),
                snapshots: Arc::clone(&self.snapshots),
                observers: Arc::clone(&self.observers),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
                halt: Arc::clone(&self.halt),
                halt_signal: self.halt_signal.clone(),
                action_broadcast: self.action_broadcast.clone(),
                config: self.config.clone(),
            }
        }
    }

    impl<S, A, R> std::fmt::Debug for Store<S, A, R> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("Store")
                .field("version", &self.snapshots.borrow().version)
                .field("pending_effects", &self.pending_effects.load(Ordering::SeqCst))
                .field("shutdown", &self.shutdown.load(Ordering::SeqCst))
                .finish_non_exhaustive()
        }
    }
}
