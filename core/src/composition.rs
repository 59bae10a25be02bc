//! Reducer composition utilities
//!
//! This module provides utilities for composing reducers in various ways:
//! - **`combine_reducers`**: Run multiple reducers on the same state/action, in order
//! - **`lift_reducer`**: Run a reducer written for one action category and one
//!   state slot inside the global state/action types
//! - **`scope_reducer`**: Focus a reducer on a slot of a larger state
//!
//! # Examples
//!
//! ## Lifting and combining
//!
//! ```
//! use rexlist_core::composition::{combine_reducers, lift_reducer};
//! use rexlist_core::lens::{Lens, Prism};
//! use rexlist_core::reducer::Reducer;
//! use rexlist_core::{lens_for, prism};
//!
//! #[derive(Clone, Default)]
//! struct AppState {
//!     count: i32,
//!     name: String,
//! }
//!
//! #[derive(Clone)]
//! enum AppAction {
//!     Counter(CounterAction),
//!     Rename(String),
//! }
//!
//! #[derive(Clone)]
//! enum CounterAction {
//!     Increment,
//! }
//!
//! struct CounterReducer;
//!
//! impl Reducer for CounterReducer {
//!     type State = i32;
//!     type Action = CounterAction;
//!
//!     fn reduce(&self, state: &mut i32, action: &CounterAction) {
//!         match action {
//!             CounterAction::Increment => *state += 1,
//!         }
//!     }
//! }
//!
//! struct RenameReducer;
//!
//! impl Reducer for RenameReducer {
//!     type State = String;
//!     type Action = String;
//!
//!     fn reduce(&self, state: &mut String, action: &String) {
//!         state.clone_from(action);
//!     }
//! }
//!
//! const COUNTER: Prism<AppAction, CounterAction> = prism!(AppAction::Counter => CounterAction);
//! const RENAME: Prism<AppAction, String> = prism!(AppAction::Rename => String);
//! const COUNT: Lens<AppState, i32> = lens_for!(AppState.count: i32);
//! const NAME: Lens<AppState, String> = lens_for!(AppState.name: String);
//!
//! let app = combine_reducers(vec![
//!     Box::new(lift_reducer(CounterReducer, COUNTER, COUNT)),
//!     Box::new(lift_reducer(RenameReducer, RENAME, NAME)),
//! ]);
//!
//! let mut state = AppState::default();
//! app.reduce(&mut state, &AppAction::Counter(CounterAction::Increment));
//! app.reduce(&mut state, &AppAction::Rename("Alice".into()));
//! assert_eq!(state.count, 1);
//! assert_eq!(state.name, "Alice");
//! ```

use crate::lens::{Lens, Prism};
use crate::reducer::Reducer;

/// Boxed reducer over the global state and action types
pub type BoxedReducer<S, A> = Box<dyn Reducer<State = S, Action = A> + Send + Sync>;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer is run in the declared order, every time. This order is part
/// of the contract: when two reducers touch the same slot, the later one sees
/// the earlier one's result.
///
/// # Type Parameters
///
/// - `S`: The state type
/// - `A`: The action type
#[must_use]
pub fn combine_reducers<S, A>(reducers: Vec<BoxedReducer<S, A>>) -> CombinedReducer<S, A>
where
    S: 'static,
    A: 'static,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A>
where
    S: 'static,
    A: 'static,
{
    reducers: Vec<BoxedReducer<S, A>>,
}

impl<S, A> CombinedReducer<S, A>
where
    S: 'static,
    A: 'static,
{
    /// Number of reducers in the chain
    #[must_use]
    pub fn len(&self) -> usize {
        self.reducers.len()
    }

    /// Whether the chain is empty (and therefore the identity)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reducers.is_empty()
    }
}

impl<S, A> Reducer for CombinedReducer<S, A>
where
    S: 'static,
    A: 'static,
{
    type State = S;
    type Action = A;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        for reducer in &self.reducers {
            reducer.reduce(state, action);
        }
    }
}

/// Lifts a reducer over one action category and one state slot into the
/// global action and state types.
///
/// When `action` does not match, the lifted reducer is the identity on the
/// whole state. When it matches, the inner reducer folds the extracted payload
/// into the slot `state` focuses on, and nothing outside that slot changes.
///
/// # Type Parameters
///
/// - `S`: The global state type
/// - `A`: The global action type
/// - `R`: The reducer being lifted
pub fn lift_reducer<S, A, R>(
    reducer: R,
    action: Prism<A, R::Action>,
    state: Lens<S, R::State>,
) -> LiftedReducer<S, A, R>
where
    R: Reducer,
{
    LiftedReducer {
        reducer,
        action,
        state,
    }
}

/// A reducer running on a projection of the global state and action.
///
/// Created by [`lift_reducer`].
pub struct LiftedReducer<S, A, R>
where
    R: Reducer,
{
    reducer: R,
    action: Prism<A, R::Action>,
    state: Lens<S, R::State>,
}

impl<S, A, R> Reducer for LiftedReducer<S, A, R>
where
    R: Reducer,
{
    type State = S;
    type Action = A;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        let Some(sub_action) = self.action.extract(action) else {
            return;
        };

        // Fold straight into the focused slot
        self.reducer.reduce(self.state.get_mut(state), sub_action);
    }
}

/// Scopes a reducer to operate on a slot of a larger state, keeping the same
/// action type.
///
/// # Examples
///
/// ```
/// use rexlist_core::composition::scope_reducer;
/// use rexlist_core::lens::Lens;
/// use rexlist_core::lens_for;
/// use rexlist_core::reducer::Reducer;
///
/// #[derive(Clone, Default)]
/// struct CounterState {
///     count: i32,
/// }
///
/// enum CounterAction {
///     Increment,
/// }
///
/// struct CounterReducer;
///
/// impl Reducer for CounterReducer {
///     type State = CounterState;
///     type Action = CounterAction;
///
///     fn reduce(&self, state: &mut CounterState, action: &CounterAction) {
///         match action {
///             CounterAction::Increment => state.count += 1,
///         }
///     }
/// }
///
/// #[derive(Clone, Default)]
/// struct AppState {
///     counter: CounterState,
///     other_data: String,
/// }
///
/// const COUNTER: Lens<AppState, CounterState> = lens_for!(AppState.counter: CounterState);
///
/// let scoped = scope_reducer(CounterReducer, COUNTER);
/// let mut state = AppState::default();
/// scoped.reduce(&mut state, &CounterAction::Increment);
/// assert_eq!(state.counter.count, 1);
/// ```
pub fn scope_reducer<S, R>(reducer: R, state: Lens<S, R::State>) -> ScopedReducer<S, R>
where
    R: Reducer,
{
    ScopedReducer { reducer, state }
}

/// A scoped reducer that operates on a slot of the state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, R>
where
    R: Reducer,
{
    reducer: R,
    state: Lens<S, R::State>,
}

impl<S, R> Reducer for ScopedReducer<S, R>
where
    R: Reducer,
{
    type State = S;
    type Action = R::Action;

    fn reduce(&self, state: &mut Self::State, action: &Self::Action) {
        self.reducer.reduce(self.state.get_mut(state), action);
    }
}
