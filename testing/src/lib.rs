//! # Rexlist Testing
//!
//! Testing utilities and helpers for the rexlist architecture.
//!
//! This crate provides:
//! - Deterministic implementations of environment traits
//! - Given-When-Then harnesses for reducers and middleware
//! - Helpers that drive an [`Effect`](rexlist_core::effect::Effect) to completion
//! - Assertion helpers for effects and stores
//!
//! ## Example
//!
//! ```
//! use rexlist_core::reducer::Reducer;
//! use rexlist_testing::ReducerTest;
//!
//! struct Doubler;
//!
//! impl Reducer for Doubler {
//!     type State = u32;
//!     type Action = ();
//!
//!     fn reduce(&self, state: &mut u32, _action: &()) {
//!         *state *= 2;
//!     }
//! }
//!
//! ReducerTest::new(Doubler)
//!     .given_state(3)
//!     .when_action(())
//!     .then_state(|state| assert_eq!(*state, 6))
//!     .run();
//! ```



/// Driving effects outside a store
pub mod effects;

/// Mock implementations of Environment traits
pub mod mocks {
    use rexlist_core::environment::IdGenerator;
    use std::sync::atomic::{AtomicU64, Ordering};
    use uuid::Uuid;

    /// Predictable id generator
    ///
    /// Hands out `00000000-0000-0000-0000-000000000001`, `…02`, … in order,
    /// so tests can name ids before they are allocated.
    ///
    /// # Example
    ///
    /// ```
    /// use rexlist_core::environment::IdGenerator;
    /// use rexlist_testing::mocks::SequentialIdGenerator;
    ///
    /// let ids = SequentialIdGenerator::new();
    /// assert_eq!(ids.next_id(), SequentialIdGenerator::nth(1));
    /// assert_eq!(ids.next_id(), SequentialIdGenerator::nth(2));
    /// ```
    #[derive(Debug, Default)]
    pub struct SequentialIdGenerator {
        next: AtomicU64,
    }

    impl SequentialIdGenerator {
        /// Create a generator whose first id is [`SequentialIdGenerator::nth(1)`](Self::nth)
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(0),
            }
        }

        /// The `n`-th id this generator hands out (1-based)
        #[must_use]
        pub const fn nth(n: u64) -> Uuid {
            Uuid::from_u128(n as u128)
        }
    }

    impl IdGenerator for SequentialIdGenerator {
        fn next_id(&self) -> Uuid {
            let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
            Self::nth(n)
        }
    }
}

/// Test helpers and utilities
pub mod helpers {
    use rexlist_core::reducer::Reducer;
    use rexlist_runtime::{Snapshot, Store, Subscription};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Every snapshot a store committed while the recorder was alive
    pub struct SnapshotRecorder<S> {
        snapshots: Arc<Mutex<Vec<Snapshot<S>>>>,
        _subscription: Subscription,
    }

    impl<S> SnapshotRecorder<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        /// Start recording `store`
        pub fn attach<A, R>(store: &Store<S, A, R>) -> Self
        where
            A: Clone + Send + 'static,
            R: Reducer<State = S, Action = A> + Send + 'static,
        {
            let snapshots = Arc::new(Mutex::new(Vec::new()));
            let sink = Arc::clone(&snapshots);
            let subscription = store.subscribe(move |snapshot| {
                sink.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(snapshot.clone());
            });

            Self {
                snapshots,
                _subscription: subscription,
            }
        }

        /// The recorded snapshots, oldest first
        #[must_use]
        pub fn snapshots(&self) -> Vec<Snapshot<S>> {
            self.snapshots
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// The recorded versions, oldest first
        #[must_use]
        pub fn versions(&self) -> Vec<u64> {
            self.snapshots().iter().map(|s| s.version).collect()
        }

        /// The recorded states, oldest first
        #[must_use]
        pub fn states(&self) -> Vec<Arc<S>> {
            self.snapshots()
                .into_iter()
                .map(|s| s.state)
                .collect()
        }
    }

    /// Install a test-friendly `tracing` subscriber once
    ///
    /// Honors `RUST_LOG`; safe to call from every test.
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use effects::{collect_actions, effect_stream, take_actions};
pub use middleware_test::{assertions, MiddlewareTest};
pub use mocks::SequentialIdGenerator;
pub use reducer_test::ReducerTest;

#[cfg(test)]
mod tests {
    use super::*;
    use rexlist_core::environment::IdGenerator;

    #[test]
    fn test_sequential_ids_are_predictable() {
        let ids = SequentialIdGenerator::new();
        let first = ids.next_id();
        let second = ids.next_id();
        assert_eq!(first, SequentialIdGenerator::nth(1));
        assert_eq!(second, SequentialIdGenerator::nth(2));
        assert_ne!(first, second);
    }
}
