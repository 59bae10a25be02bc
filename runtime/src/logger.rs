//! Action logging middleware.
//!
//! Usually the first stage of a pipeline so every action is logged before
//! any other middleware reacts to it.

use rexlist_core::effect::Effect;
use rexlist_core::middleware::Middleware;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Logs every dispatched action through `tracing`
///
/// Actions are logged at `debug`; with [`LoggerMiddleware::with_state`] the
/// state the action is about to be folded into is logged at `trace` too.
pub struct LoggerMiddleware<S, A> {
    label: &'static str,
    log_state: bool,
    dispatched: u64,
    _types: PhantomData<fn(&S, &A)>,
}

impl<S, A> LoggerMiddleware<S, A> {
    /// Create a logger tagged with `label`
    #[must_use]
    pub const fn new(label: &'static str) -> Self {
        Self {
            label,
            log_state: false,
            dispatched: 0,
            _types: PhantomData,
        }
    }

    /// Also log the pre-fold state at `trace`
    #[must_use]
    pub const fn with_state(mut self) -> Self {
        self.log_state = true;
        self
    }

    /// Number of actions seen so far
    #[must_use]
    pub const fn dispatched(&self) -> u64 {
        self.dispatched
    }
}

impl<S, A> Middleware for LoggerMiddleware<S, A>
where
    S: Debug,
    A: Debug,
{
    type InputAction = A;
    type OutputAction = A;
    type State = S;

    fn handle(&mut self, action: &A, state: &S) -> Effect<A> {
        self.dispatched += 1;
        tracing::debug!(
            store = self.label,
            sequence = self.dispatched,
            action = ?action,
            "Dispatching action"
        );
        if self.log_state {
            tracing::trace!(store = self.label, state = ?state, "State before fold");
        }
        Effect::None
    }
}
