//! Middleware: the side-effect half of the architecture.
//!
//! Every dispatched action is shown to every middleware, in declared order,
//! before the reducer folds it. A middleware may keep private state (open
//! subscriptions, connection handles) and answers with an [`Effect`] that the
//! runtime executes after the fold. Whatever actions that effect produces are
//! dispatched back into the store from the top.
//!
//! Middleware written for a private action vocabulary is adapted to the
//! application types with [`lift_middleware`], and the adapted stages are
//! chained with [`compose_middleware`].
//!
//! # Example
//!
//! ```
//! use rexlist_core::effect::Effect;
//! use rexlist_core::middleware::{compose_middleware, Middleware};
//!
//! /// Echoes every even number back as its half
//! struct Halver;
//!
//! impl Middleware for Halver {
//!     type InputAction = u32;
//!     type OutputAction = u32;
//!     type State = ();
//!
//!     fn handle(&mut self, action: &u32, _state: &()) -> Effect<u32> {
//!         if *action > 0 && action % 2 == 0 {
//!             Effect::send(action / 2)
//!         } else {
//!             Effect::None
//!         }
//!     }
//! }
//!
//! let mut pipeline = compose_middleware(vec![Box::new(Halver)]);
//! assert!(pipeline.handle(&3, &()).is_none());
//! assert!(!pipeline.handle(&4, &()).is_none());
//! ```

use crate::effect::Effect;
use smallvec::SmallVec;

/// A side-effect handler observing every action before the reducer
///
/// `handle` is called with the store's fold lock held, so it must return
/// promptly: any I/O belongs inside the returned effect. Because the lock
/// is held, `&mut self` is safe to use for private bookkeeping and is
/// serialized with every fold.
pub trait Middleware: Send {
    /// Actions this middleware understands
    type InputAction;

    /// Actions this middleware emits
    type OutputAction;

    /// The state (or state slice) visible to this middleware
    type State;

    /// Observe an action about to be folded
    ///
    /// `state` is the snapshot the action is about to be folded into.
    fn handle(
        &mut self,
        action: &Self::InputAction,
        state: &Self::State,
    ) -> Effect<Self::OutputAction>;
}

impl<M> Middleware for Box<M>
where
    M: Middleware + ?Sized,
{
    type InputAction = M::InputAction;
    type OutputAction = M::OutputAction;
    type State = M::State;

    fn handle(
        &mut self,
        action: &Self::InputAction,
        state: &Self::State,
    ) -> Effect<Self::OutputAction> {
        (**self).handle(action, state)
    }
}

/// Middleware already adapted to the global state and action types
pub type BoxedMiddleware<S, A> = Box<dyn Middleware<InputAction = A, OutputAction = A, State = S>>;

/// Adapt a middleware to the global action and state types
///
/// - `input` picks the actions the middleware cares about; anything it maps
///   to `None` never reaches the middleware.
/// - `output` wraps every action the middleware emits.
/// - `state` projects the global state onto the slice the middleware reads.
///
/// Prisms and lenses supply all three through
/// [`Prism::extractor`](crate::lens::Prism::extractor),
/// [`Prism::embedder`](crate::lens::Prism::embedder) and
/// [`Lens::getter`](crate::lens::Lens::getter).
pub fn lift_middleware<M, GA, GS>(
    middleware: M,
    input: fn(&GA) -> Option<&M::InputAction>,
    output: fn(M::OutputAction) -> GA,
    state: fn(&GS) -> &M::State,
) -> LiftedMiddleware<M, GA, GS>
where
    M: Middleware,
{
    LiftedMiddleware {
        middleware,
        input,
        output,
        state,
    }
}

/// A middleware running on projections of the global types
///
/// Created by [`lift_middleware`].
pub struct LiftedMiddleware<M, GA, GS>
where
    M: Middleware,
{
    middleware: M,
    input: fn(&GA) -> Option<&M::InputAction>,
    output: fn(M::OutputAction) -> GA,
    state: fn(&GS) -> &M::State,
}

impl<M, GA, GS> LiftedMiddleware<M, GA, GS>
where
    M: Middleware,
{
    /// The wrapped middleware
    pub fn inner(&self) -> &M {
        &self.middleware
    }
}

impl<M, GA, GS> Middleware for LiftedMiddleware<M, GA, GS>
where
    M: Middleware,
    M::OutputAction: Send + 'static,
    GA: Send + 'static,
{
    type InputAction = GA;
    type OutputAction = GA;
    type State = GS;

    fn handle(&mut self, action: &GA, state: &GS) -> Effect<GA> {
        let Some(local) = (self.input)(action) else {
            return Effect::None;
        };

        self.middleware
            .handle(local, (self.state)(state))
            .map(self.output)
    }
}

/// Chain middleware into one ordered pipeline
///
/// Every stage sees every action exactly once, in the order given here.
/// The effects they return are merged and run concurrently after the fold.
#[must_use]
pub fn compose_middleware<S, A>(stages: Vec<BoxedMiddleware<S, A>>) -> Pipeline<S, A> {
    Pipeline { stages }
}

/// An ordered chain of middleware
///
/// Created by [`compose_middleware`]. An empty pipeline emits nothing.
pub struct Pipeline<S, A> {
    stages: Vec<BoxedMiddleware<S, A>>,
}

impl<S, A> Pipeline<S, A> {
    /// Append a stage at the end of the chain
    pub fn push(&mut self, stage: BoxedMiddleware<S, A>) {
        self.stages.push(stage);
    }

    /// Number of stages
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl<S, A> Default for Pipeline<S, A> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<S, A> std::fmt::Debug for Pipeline<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl<S, A> Middleware for Pipeline<S, A> {
    type InputAction = A;
    type OutputAction = A;
    type State = S;

    fn handle(&mut self, action: &A, state: &S) -> Effect<A> {
        let mut effects: SmallVec<[Effect<A>; 4]> = SmallVec::new();

        for stage in &mut self.stages {
            let effect = stage.handle(action, state);
            if !effect.is_none() {
                effects.push(effect);
            }
        }

        match effects.len() {
            0 => Effect::None,
            1 => effects.pop().unwrap_or(Effect::None),
            _ => Effect::merge(effects.into_vec()),
        }
    }
}
