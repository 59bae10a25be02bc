//! # Rexlist Core
//!
//! Core traits and types for the rexlist unidirectional architecture.
//!
//! This crate provides the fundamental abstractions for building applications
//! around a single state tree that is only ever changed by pure reducers, with
//! all side effects pushed out into middleware.
//!
//! ## Core Concepts
//!
//! - **State**: The application's state tree
//! - **Action**: Immutable messages describing an intended change or an event
//! - **Reducer**: Pure function `(State, Action) → State`
//! - **Middleware**: Observes every action before the reducer and may emit
//!   further actions asynchronously, described as [`Effect`](effect::Effect) values
//! - **Lens / Prism**: Reversible projections used to lift reducers and
//!   middleware written for a slice of the state or a category of actions
//!
//! ## Architecture Principles
//!
//! - Functional Core, Imperative Shell
//! - Unidirectional Data Flow
//! - Explicit Effects (no hidden I/O in reducers)
//! - Dependency Injection through middleware constructors and environment traits
//!
//! ## Example
//!
//! ```
//! use rexlist_core::reducer::Reducer;
//!
//! #[derive(Clone, Debug, Default)]
//! struct CounterState {
//!     count: i64,
//! }
//!
//! enum CounterAction {
//!     Increment,
//!     Reset,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = CounterState;
//!     type Action = CounterAction;
//!
//!     fn reduce(&self, state: &mut CounterState, action: &CounterAction) {
//!         match action {
//!             CounterAction::Increment => state.count += 1,
//!             CounterAction::Reset => state.count = 0,
//!         }
//!     }
//! }
//!
//! let mut state = CounterState::default();
//! CounterReducer.reduce(&mut state, &CounterAction::Increment);
//! assert_eq!(state.count, 1);
//! ```

pub use smallvec::{smallvec, SmallVec};

/// Cancellation primitives for long-running effects
pub mod cancellation;

/// Reducer composition utilities
pub mod composition;

/// Lenses and prisms over state and actions
pub mod lens;

/// Middleware trait, lifting and composition
pub mod middleware;

/// Reducer module - The core trait for business logic
///
/// Reducers are pure functions: `(State, Action) → State`.
///
/// They contain all state transitions and are deterministic and testable.
/// A reducer never performs I/O, never blocks and never fails: anything that
/// talks to the outside world lives in a [`Middleware`](crate::middleware::Middleware).
pub mod reducer {
    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state (or state slice) this reducer folds into
    /// - `Action`: The action type this reducer processes
    ///
    /// # Example
    ///
    /// ```
    /// use rexlist_core::reducer::Reducer;
    ///
    /// struct NameReducer;
    ///
    /// impl Reducer for NameReducer {
    ///     type State = String;
    ///     type Action = String;
    ///
    ///     fn reduce(&self, state: &mut String, action: &String) {
    ///         state.clone_from(action);
    ///     }
    /// }
    ///
    /// let mut name = String::from("old");
    /// NameReducer.reduce(&mut name, &"new".to_string());
    /// assert_eq!(name, "new");
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// Fold an action into the state
        ///
        /// This is a pure, total function: it must not panic, block or
        /// perform I/O. Actions the reducer does not care about leave the
        /// state untouched.
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to the current state
        /// - `action`: The action to fold
        fn reduce(&self, state: &mut Self::State, action: &Self::Action);
    }

    impl<R> Reducer for Box<R>
    where
        R: Reducer + ?Sized,
    {
        type State = R::State;
        type Action = R::Action;

        fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
            (**self).reduce(state, action);
        }
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable and cancellable.
/// Middleware returns them; the `Store` runtime executes them after the fold
/// and dispatches whatever actions they produce back into the store.
pub mod effect {
    use crate::cancellation::CancellationSignal;
    use futures::{FutureExt, Stream, StreamExt};
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::time::Duration;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from middleware and executed by the Store runtime.
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Run effects sequentially
        Sequential(Vec<Effect<Action>>),

        /// Delayed action (for timeouts, retries)
        Delay {
            /// How long to wait
            duration: Duration,
            /// Action to dispatch after delay
            action: Box<Action>,
        },

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the store
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),

        /// Long-lived stream of actions
        ///
        /// Every item is fed back into the store, in order, until the stream ends.
        Stream(Pin<Box<dyn Stream<Item = Action> + Send>>),

        /// An effect that stops producing actions once its signal fires
        ///
        /// The runtime checks the signal again right before folding every
        /// action the inner effect produced, under the same lock the fold
        /// uses, so nothing derived from a cancelled effect is ever folded
        /// after the cancellation was processed.
        Cancellable {
            /// Fires when the owner of the matching handle cancels
            signal: CancellationSignal,
            /// The effect being guarded
            effect: Box<Effect<Action>>,
        },
    }

    // Manual Debug implementation since Future and Stream don't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Delay { duration, action } => f
                    .debug_struct("Effect::Delay")
                    .field("duration", duration)
                    .field("action", action)
                    .finish(),
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
                Effect::Stream(_) => write!(f, "Effect::Stream(<stream>)"),
                Effect::Cancellable { signal, effect } => f
                    .debug_struct("Effect::Cancellable")
                    .field("cancelled", &signal.is_cancelled())
                    .field("effect", effect)
                    .finish(),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Whether this effect does nothing at all
        #[must_use]
        pub const fn is_none(&self) -> bool {
            matches!(self, Effect::None)
        }
    }

    impl<Action> Effect<Action>
    where
        Action: Send + 'static,
    {
        /// Dispatch `action` on the next dispatch cycle
        ///
        /// This is the loopback used by middleware that turns one action into
        /// another: the derived action is folded after the current one, never
        /// inside it.
        #[must_use]
        pub fn send(action: Action) -> Effect<Action> {
            Effect::Future(Box::pin(futures::future::ready(Some(action))))
        }

        /// Wrap an async block that may produce an action
        #[must_use]
        pub fn future<F>(future: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(future))
        }

        /// Wrap a stream whose items are all dispatched
        #[must_use]
        pub fn stream<S>(stream: S) -> Effect<Action>
        where
            S: Stream<Item = Action> + Send + 'static,
        {
            Effect::Stream(Box::pin(stream))
        }

        /// Guard this effect with a cancellation signal
        #[must_use]
        pub fn cancellable(self, signal: CancellationSignal) -> Effect<Action> {
            Effect::Cancellable {
                signal,
                effect: Box::new(self),
            }
        }

        /// Transform every action this effect produces
        ///
        /// Used to wrap a middleware's private output actions into the global
        /// action type.
        #[must_use]
        pub fn map<B, F>(self, f: F) -> Effect<B>
        where
            F: Fn(Action) -> B + Send + Sync + 'static,
            B: Send + 'static,
        {
            self.map_shared(&Arc::new(f))
        }

        fn map_shared<B, F>(self, f: &Arc<F>) -> Effect<B>
        where
            F: Fn(Action) -> B + Send + Sync + 'static,
            B: Send + 'static,
        {
            match self {
                Effect::None => Effect::None,
                Effect::Parallel(effects) => {
                    Effect::Parallel(effects.into_iter().map(|e| e.map_shared(f)).collect())
                },
                Effect::Sequential(effects) => {
                    Effect::Sequential(effects.into_iter().map(|e| e.map_shared(f)).collect())
                },
                Effect::Delay { duration, action } => Effect::Delay {
                    duration,
                    action: Box::new((**f)(*action)),
                },
                Effect::Future(fut) => {
                    let f = Arc::clone(f);
                    Effect::Future(Box::pin(fut.map(move |action| action.map(|a| (*f)(a)))))
                },
                Effect::Stream(stream) => {
                    let f = Arc::clone(f);
                    Effect::Stream(Box::pin(stream.map(move |a| (*f)(a))))
                },
                Effect::Cancellable { signal, effect } => Effect::Cancellable {
                    signal,
                    effect: Box::new(effect.map_shared(f)),
                },
            }
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies that influence domain values are abstracted
/// behind traits so tests can swap in deterministic implementations.
pub mod environment {
    use uuid::Uuid;

    /// Identifier generator - abstracts id allocation for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use rexlist_core::environment::{IdGenerator, UuidGenerator};
    ///
    /// let ids = UuidGenerator;
    /// assert_ne!(ids.next_id(), ids.next_id());
    /// ```
    pub trait IdGenerator: Send + Sync {
        /// Allocate a fresh, never reused identifier
        fn next_id(&self) -> Uuid;
    }

    /// Production id generator backed by random v4 UUIDs
    #[derive(Debug, Clone, Copy, Default)]
    pub struct UuidGenerator;

    impl IdGenerator for UuidGenerator {
        fn next_id(&self) -> Uuid {
            Uuid::new_v4()
        }
    }
}
