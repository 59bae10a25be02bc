//! Integration tests for Store action broadcasting
//!
//! Actions produced by effects are broadcast to `subscribe_actions`
//! receivers in fold order; `send_and_wait_for` builds request-response
//! interactions on top of that.

#![allow(clippy::expect_used, clippy::panic)] // Test code can use expect/panic

use rexlist_core::effect::Effect;
use rexlist_core::middleware::{compose_middleware, Middleware};
use rexlist_core::reducer::Reducer;
use rexlist_runtime::{Store, StoreConfig, StoreError};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

// ============================================================================
// Test Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum TestAction {
    /// Start a three step saga
    StartSaga { id: u64 },
    /// Saga step completed
    StepCompleted { id: u64, step: u32 },
    /// Saga finished (terminal action)
    SagaCompleted { id: u64 },
    /// Start a saga that fails after its first step
    StartFailingSaga { id: u64 },
    /// Saga failed (terminal action)
    SagaFailed { id: u64, error: String },
    /// Emit `n` increments at once
    Burst { n: u32 },
    /// Emit increments through a delay, a merge and a chain
    Shapes,
    /// Counter increment
    Incremented,
}

#[derive(Debug, Clone, Default)]
struct TestState {
    counter: u32,
    saga_steps: Vec<u32>,
    completed: Vec<u64>,
}

struct TestReducer;

impl Reducer for TestReducer {
    type State = TestState;
    type Action = TestAction;

    fn reduce(&self, state: &mut TestState, action: &TestAction) {
        match action {
            TestAction::StartSaga { .. } => state.saga_steps.clear(),
            TestAction::StepCompleted { step, .. } => state.saga_steps.push(*step),
            TestAction::SagaCompleted { id } => state.completed.push(*id),
            TestAction::Incremented => state.counter += 1,
            _ => {},
        }
    }
}

/// Drives sagas and emits increments
struct SagaMiddleware;

impl Middleware for SagaMiddleware {
    type InputAction = TestAction;
    type OutputAction = TestAction;
    type State = TestState;

    fn handle(&mut self, action: &TestAction, _state: &TestState) -> Effect<TestAction> {
        match action {
            TestAction::StartSaga { id } => step_after(*id, 1, Duration::from_millis(10)),
            TestAction::StepCompleted { id, step } if *step < 3 => {
                step_after(*id, step + 1, Duration::from_millis(10))
            },
            TestAction::StepCompleted { id, .. } => Effect::send(TestAction::SagaCompleted { id: *id }),
            TestAction::StartFailingSaga { id } => {
                let id = *id;
                Effect::future(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Some(TestAction::SagaFailed {
                        id,
                        error: "payment declined".to_string(),
                    })
                })
            },
            TestAction::Burst { n } => Effect::merge((0..*n).map(|_| Effect::send(TestAction::Incremented)).collect()),
            TestAction::Shapes => Effect::merge(vec![
                Effect::Delay {
                    duration: Duration::from_millis(20),
                    action: Box::new(TestAction::Incremented),
                },
                Effect::chain(vec![
                    Effect::send(TestAction::Incremented),
                    Effect::send(TestAction::Incremented),
                ]),
            ]),
            _ => Effect::None,
        }
    }
}

fn step_after(id: u64, step: u32, delay: Duration) -> Effect<TestAction> {
    Effect::future(async move {
        tokio::time::sleep(delay).await;
        Some(TestAction::StepCompleted { id, step })
    })
}

fn create_store(config: StoreConfig) -> Store<TestState, TestAction, TestReducer> {
    Store::with_config(
        TestState::default(),
        TestReducer,
        compose_middleware(vec![Box::new(SagaMiddleware)]),
        config,
    )
}

// ============================================================================
// send_and_wait_for
// ============================================================================

#[tokio::test]
async fn test_send_and_wait_for_saga() {
    let store = create_store(StoreConfig::default());

    let result = store
        .send_and_wait_for(
            TestAction::StartSaga { id: 7 },
            |a| matches!(a, TestAction::SagaCompleted { id: 7 }),
            Duration::from_secs(1),
        )
        .await;

    assert_eq!(result.expect("saga completes"), TestAction::SagaCompleted { id: 7 });
    assert_eq!(store.state(|s| s.saga_steps.clone()), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_send_and_wait_for_failure() {
    let store = create_store(StoreConfig::default());

    let result = store
        .send_and_wait_for(
            TestAction::StartFailingSaga { id: 3 },
            |a| matches!(a, TestAction::SagaCompleted { .. } | TestAction::SagaFailed { .. }),
            Duration::from_secs(1),
        )
        .await;

    match result {
        Ok(TestAction::SagaFailed { id, error }) => {
            assert_eq!(id, 3);
            assert_eq!(error, "payment declined");
        },
        other => panic!("expected SagaFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn test_send_and_wait_for_timeout() {
    let store = create_store(StoreConfig::default());

    let result = store
        .send_and_wait_for(
            TestAction::Incremented,
            |a| matches!(a, TestAction::SagaCompleted { .. }),
            Duration::from_millis(50),
        )
        .await;

    assert!(matches!(result, Err(StoreError::Timeout)));
}

#[tokio::test]
async fn test_send_and_wait_for_after_shutdown() {
    let store = create_store(StoreConfig::default());
    store.shutdown(Duration::from_secs(1)).await.expect("shutdown");

    let result = store
        .send_and_wait_for(TestAction::StartSaga { id: 1 }, |_| true, Duration::from_millis(50))
        .await;

    assert!(matches!(result, Err(StoreError::ShutdownInProgress)));
}

// ============================================================================
// subscribe_actions
// ============================================================================

#[tokio::test]
async fn test_initial_actions_not_broadcast() {
    let store = create_store(StoreConfig::default());
    let mut rx = store.subscribe_actions();

    let _ = store.send(TestAction::Incremented).await.expect("send");

    assert!(matches!(rx.try_recv(), Err(tokio::sync::broadcast::error::TryRecvError::Empty)));
}

#[tokio::test]
async fn test_subscribers_see_saga_in_fold_order() {
    let store = create_store(StoreConfig::default());
    let mut first = store.subscribe_actions();
    let mut second = store.subscribe_actions();

    let _ = store
        .send_and_wait_for(
            TestAction::StartSaga { id: 1 },
            |a| matches!(a, TestAction::SagaCompleted { .. }),
            Duration::from_secs(1),
        )
        .await
        .expect("saga completes");

    let expected = vec![
        TestAction::StepCompleted { id: 1, step: 1 },
        TestAction::StepCompleted { id: 1, step: 2 },
        TestAction::StepCompleted { id: 1, step: 3 },
        TestAction::SagaCompleted { id: 1 },
    ];
    for rx in [&mut first, &mut second] {
        let mut seen = Vec::new();
        while let Ok(action) = rx.try_recv() {
            seen.push(action);
        }
        assert_eq!(seen, expected);
    }
}

#[tokio::test]
async fn test_concurrent_sagas_filtered_by_id() {
    let store = create_store(StoreConfig::default());

    let (a, b) = tokio::join!(
        store.send_and_wait_for(
            TestAction::StartSaga { id: 10 },
            |a| matches!(a, TestAction::SagaCompleted { id: 10 }),
            Duration::from_secs(1),
        ),
        store.send_and_wait_for(
            TestAction::StartSaga { id: 20 },
            |a| matches!(a, TestAction::SagaCompleted { id: 20 }),
            Duration::from_secs(1),
        ),
    );

    assert!(matches!(a, Ok(TestAction::SagaCompleted { id: 10 })));
    assert!(matches!(b, Ok(TestAction::SagaCompleted { id: 20 })));

    let mut completed = store.state(|s| s.completed.clone());
    completed.sort_unstable();
    assert_eq!(completed, vec![10, 20]);
}

#[tokio::test]
async fn test_delay_parallel_and_sequential_are_broadcast() {
    let store = create_store(StoreConfig::default());
    let mut rx = store.subscribe_actions();

    let mut handle = store.send(TestAction::Shapes).await.expect("send");
    handle
        .wait_with_timeout(Duration::from_secs(1))
        .await
        .expect("effects finish");

    let mut broadcast = 0;
    while let Ok(action) = rx.try_recv() {
        assert_eq!(action, TestAction::Incremented);
        broadcast += 1;
    }
    assert_eq!(broadcast, 3);
    assert_eq!(store.state(|s| s.counter), 3);
}

#[tokio::test]
async fn test_lagging_subscriber() {
    let store = create_store(StoreConfig::default().with_broadcast_capacity(2));
    let mut rx = store.subscribe_actions();

    let _ = store.send(TestAction::Burst { n: 10 }).await.expect("send");
    store
        .wait_for_state(|s| s.counter == 10, Duration::from_secs(1))
        .await
        .expect("burst folded");

    assert!(matches!(rx.recv().await, Err(RecvError::Lagged(8))));
    assert_eq!(rx.recv().await.ok(), Some(TestAction::Incremented));
}

#[tokio::test]
async fn test_custom_broadcast_capacity() {
    let store = create_store(StoreConfig::default().with_broadcast_capacity(0));
    assert_eq!(store.config().action_broadcast_capacity, 1);

    let store = create_store(StoreConfig::default().with_broadcast_capacity(256));
    let mut rx = store.subscribe_actions();

    let _ = store.send(TestAction::Burst { n: 100 }).await.expect("send");
    store
        .wait_for_state(|s| s.counter == 100, Duration::from_secs(1))
        .await
        .expect("burst folded");

    let mut received = 0;
    while rx.try_recv().is_ok() {
        received += 1;
    }
    assert_eq!(received, 100);
}
