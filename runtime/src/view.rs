//! Projections of a store onto narrower state and action types.
//!
//! A [`ViewStore`] is what a view holds: it dispatches its own small action
//! vocabulary and reads a derived view state, without knowing the global
//! types. Projections are recomputed from each committed snapshot, so they
//! are always consistent with the store.
//!
//! # Example
//!
//! ```
//! use rexlist_core::reducer::Reducer;
//! use rexlist_runtime::Store;
//!
//! #[derive(Clone, Default)]
//! struct State {
//!     names: Vec<String>,
//! }
//!
//! #[derive(Clone)]
//! enum Action {
//!     Add(String),
//! }
//!
//! struct Names;
//!
//! impl Reducer for Names {
//!     type State = State;
//!     type Action = Action;
//!
//!     fn reduce(&self, state: &mut State, action: &Action) {
//!         let Action::Add(name) = action;
//!         state.names.push(name.clone());
//!     }
//! }
//!
//! # let result: Result<(), rexlist_runtime::StoreError> = tokio_test::block_on(async {
//! let store = Store::new(State::default(), Names);
//! let count = store.scope(Action::Add, |s: &State| s.names.len());
//!
//! count.send("a".to_string()).await?;
//! assert_eq!(count.state(), 1);
//! # Ok(())
//! # });
//! # assert!(result.is_ok());
//! ```

use crate::store::{Store, Subscription};
use crate::{EffectHandle, StoreError};
use futures::future::{BoxFuture, FutureExt};
use rexlist_core::reducer::Reducer;
use std::sync::{Arc, Mutex, PoisonError};

type SendFn<VA> = Arc<dyn Fn(VA) -> BoxFuture<'static, Result<EffectHandle, StoreError>> + Send + Sync>;
type StateFn<VS> = Arc<dyn Fn() -> VS + Send + Sync>;
type ViewObserver<VS> = Arc<dyn Fn(&VS) + Send + Sync>;
type SubscribeFn<VS> = Arc<dyn Fn(ViewObserver<VS>) -> Subscription + Send + Sync>;

/// A store seen through a state projection and an action embedding
///
/// Cheap to clone; every clone talks to the same underlying store.
pub struct ViewStore<VS, VA> {
    send: SendFn<VA>,
    state: StateFn<VS>,
    subscribe: SubscribeFn<VS>,
}

impl<S, A, R> Store<S, A, R>
where
    S: Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
    R: Reducer<State = S, Action = A> + Send + 'static,
{
    /// Project this store onto a view state and a view action type
    ///
    /// `action_map` embeds view actions into store actions; `state_map`
    /// derives the view state from a store state.
    pub fn scope<VS, VA, FA, FS>(&self, action_map: FA, state_map: FS) -> ViewStore<VS, VA>
    where
        VS: 'static,
        VA: 'static,
        FA: Fn(VA) -> A + Send + Sync + 'static,
        FS: Fn(&S) -> VS + Send + Sync + 'static,
    {
        let state_map = Arc::new(state_map);

        let send: SendFn<VA> = {
            let store = self.clone();
            Arc::new(move |action: VA| {
                let store = store.clone();
                let action = action_map(action);
                async move { store.send(action).await }.boxed()
            })
        };

        let state: StateFn<VS> = {
            let store = self.clone();
            let state_map = Arc::clone(&state_map);
            Arc::new(move || store.state(|s| state_map(s)))
        };

        let subscribe: SubscribeFn<VS> = {
            let store = self.clone();
            Arc::new(move |observer: ViewObserver<VS>| {
                let state_map = Arc::clone(&state_map);
                store.subscribe(move |snapshot| observer(&state_map(snapshot.state.as_ref())))
            })
        };

        ViewStore {
            send,
            state,
            subscribe,
        }
    }
}

impl<VS, VA> ViewStore<VS, VA>
where
    VS: 'static,
    VA: 'static,
{
    /// Dispatch a view action into the underlying store
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
    pub async fn send(&self, action: VA) -> Result<EffectHandle, StoreError> {
        (self.send)(action).await
    }

    /// The view state derived from the latest committed snapshot
    #[must_use]
    pub fn state(&self) -> VS {
        (self.state)()
    }

    /// Observe the view state after every fold
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&VS) + Send + Sync + 'static,
    {
        (self.subscribe)(Arc::new(observer))
    }

    /// Observe the view state only when it differs from the last one seen
    ///
    /// The view state at the time of subscribing counts as seen.
    pub fn subscribe_distinct<F>(&self, observer: F) -> Subscription
    where
        VS: Clone + PartialEq + Send,
        F: Fn(&VS) + Send + Sync + 'static,
    {
        let last: Mutex<Option<VS>> = Mutex::new(Some(self.state()));
        self.subscribe(move |view| {
            let mut last = last.lock().unwrap_or_else(PoisonError::into_inner);
            if last.as_ref() != Some(view) {
                *last = Some(view.clone());
                drop(last);
                observer(view);
            }
        })
    }

    /// Narrow this view further
    pub fn scope<WS, WA, FA, FS>(&self, action_map: FA, state_map: FS) -> ViewStore<WS, WA>
    where
        WS: 'static,
        WA: 'static,
        FA: Fn(WA) -> VA + Send + Sync + 'static,
        FS: Fn(&VS) -> WS + Send + Sync + 'static,
    {
        let state_map = Arc::new(state_map);

        let send: SendFn<WA> = {
            let parent = Arc::clone(&self.send);
            Arc::new(move |action: WA| parent(action_map(action)))
        };

        let state: StateFn<WS> = {
            let parent = Arc::clone(&self.state);
            let state_map = Arc::clone(&state_map);
            Arc::new(move || state_map(&parent()))
        };

        let subscribe: SubscribeFn<WS> = {
            let parent = Arc::clone(&self.subscribe);
            Arc::new(move |observer: ViewObserver<WS>| {
                let state_map = Arc::clone(&state_map);
                parent(Arc::new(move |view: &VS| observer(&state_map(view))))
            })
        };

        ViewStore {
            send,
            state,
            subscribe,
        }
    }
}

impl<VS, VA> Clone for ViewStore<VS, VA> {
    fn clone(&self) -> Self {
        Self {
            send: Arc::clone(&self.send),
            state: Arc::clone(&self.state),
            subscribe: Arc::clone(&self.subscribe),
        }
    }
}

impl<VS, VA> std::fmt::Debug for ViewStore<VS, VA> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewStore")
            .field("state", &std::any::type_name::<VS>())
            .field("action", &std::any::type_name::<VA>())
            .finish()
    }
}
