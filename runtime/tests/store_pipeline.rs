//! Integration tests for middleware-driven effects in the Store runtime
//!
//! A middleware opens a long-lived feed on `Start` and cancels it on `Stop`.
//! The tests check that feed items fold in order, that nothing from a
//! cancelled feed is folded after the cancelling fold committed, and that
//! shutdown stops open feeds.

#![allow(clippy::expect_used)] // Tests can use expect
#![allow(clippy::panic)] // Tests can panic

use futures::channel::mpsc;
use futures::StreamExt;
use rexlist_core::cancellation::SubscriptionHandle;
use rexlist_core::effect::Effect;
use rexlist_core::middleware::{compose_middleware, lift_middleware, BoxedMiddleware, Middleware};
use rexlist_core::reducer::Reducer;
use rexlist_core::{lens_for, prism};
use rexlist_runtime::{LoggerMiddleware, Store};
use rexlist_testing::helpers::SnapshotRecorder;
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq)]
struct FeedState {
    live: bool,
    items: Vec<u32>,
}

#[derive(Clone, Debug, PartialEq)]
enum FeedAction {
    Start,
    Stop,
    Item(u32),
}

struct FeedReducer;

impl Reducer for FeedReducer {
    type State = FeedState;
    type Action = FeedAction;

    fn reduce(&self, state: &mut FeedState, action: &FeedAction) {
        match action {
            FeedAction::Start => state.live = true,
            FeedAction::Stop => state.live = false,
            FeedAction::Item(n) => state.items.push(*n),
        }
    }
}

/// Opens the feed once and owns the only handle able to cancel it
struct FeedMiddleware {
    source: Option<mpsc::UnboundedReceiver<u32>>,
    handle: Option<SubscriptionHandle>,
}

impl FeedMiddleware {
    fn new() -> (Self, mpsc::UnboundedSender<u32>) {
        let (tx, rx) = mpsc::unbounded();
        (
            Self {
                source: Some(rx),
                handle: None,
            },
            tx,
        )
    }
}

impl Middleware for FeedMiddleware {
    type InputAction = FeedAction;
    type OutputAction = FeedAction;
    type State = FeedState;

    fn handle(&mut self, action: &FeedAction, _state: &FeedState) -> Effect<FeedAction> {
        match action {
            FeedAction::Start => {
                let Some(source) = self.source.take() else {
                    return Effect::None;
                };
                let handle = SubscriptionHandle::new();
                let signal = handle.signal();
                self.handle = Some(handle);
                Effect::stream(source.map(FeedAction::Item)).cancellable(signal)
            },
            FeedAction::Stop => {
                if let Some(handle) = self.handle.take() {
                    handle.cancel();
                }
                Effect::None
            },
            FeedAction::Item(_) => Effect::None,
        }
    }
}

fn feed_store() -> (
    Store<FeedState, FeedAction, FeedReducer>,
    mpsc::UnboundedSender<u32>,
) {
    let (feed, tx) = FeedMiddleware::new();
    let stages: Vec<BoxedMiddleware<FeedState, FeedAction>> = vec![
        Box::new(LoggerMiddleware::new("feed")),
        Box::new(feed),
    ];
    let store = Store::with_middleware(FeedState::default(), FeedReducer, compose_middleware(stages));
    (store, tx)
}

#[tokio::test]
async fn test_feed_items_fold_in_order() {
    let (store, tx) = feed_store();
    store.send(FeedAction::Start).await.expect("start");

    for n in 1..=5 {
        tx.unbounded_send(n).expect("feed open");
    }

    let state = store
        .wait_for_state(|s| s.items.len() == 5, Duration::from_secs(1))
        .await
        .expect("all items folded");
    assert_eq!(state.items, vec![1, 2, 3, 4, 5]);
    assert!(state.live);
}

#[tokio::test]
async fn test_nothing_folds_after_cancellation() {
    let (store, tx) = feed_store();
    store.send(FeedAction::Start).await.expect("start");

    tx.unbounded_send(1).expect("feed open");
    store
        .wait_for_state(|s| s.items == [1], Duration::from_secs(1))
        .await
        .expect("first item folded");

    // Buffered items race the Stop; some may fold first, none may fold after
    for n in 2..100 {
        let _ = tx.unbounded_send(n);
    }
    store.send(FeedAction::Stop).await.expect("stop");
    let at_stop = store.snapshot();

    for n in 100..200 {
        let _ = tx.unbounded_send(n);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    let after = store.snapshot();
    assert_eq!(after.version, at_stop.version);
    assert_eq!(after.state.items, at_stop.state.items);
    assert!(!after.state.live);
    assert!(after.state.items.iter().all(|n| *n < 100));
}

#[tokio::test]
async fn test_cancelled_actions_are_not_broadcast() {
    let (store, tx) = feed_store();
    let mut actions = store.subscribe_actions();
    store.send(FeedAction::Start).await.expect("start");

    tx.unbounded_send(7).expect("feed open");
    let first = tokio::time::timeout(Duration::from_secs(1), actions.recv())
        .await
        .expect("broadcast in time")
        .expect("channel open");
    assert_eq!(first, FeedAction::Item(7));

    store.send(FeedAction::Stop).await.expect("stop");
    let _ = tx.unbounded_send(8);

    let silent = tokio::time::timeout(Duration::from_millis(50), actions.recv()).await;
    assert!(silent.is_err(), "no action may be broadcast after Stop");
}

#[tokio::test]
async fn test_observers_see_every_fold_once() {
    let (store, tx) = feed_store();
    let recorder = SnapshotRecorder::attach(&store);

    store.send(FeedAction::Start).await.expect("start");
    tx.unbounded_send(1).expect("feed open");
    tx.unbounded_send(2).expect("feed open");
    store
        .wait_for_state(|s| s.items.len() == 2, Duration::from_secs(1))
        .await
        .expect("items folded");

    assert_eq!(recorder.versions(), vec![1, 2, 3]);
    let states = recorder.states();
    assert!(states[0].items.is_empty());
    assert_eq!(states[2].items, vec![1, 2]);
}

#[tokio::test]
async fn test_shutdown_stops_open_feeds() {
    let (store, _tx) = feed_store();
    store.send(FeedAction::Start).await.expect("start");

    let result = store.shutdown(Duration::from_secs(1)).await;
    assert!(result.is_ok());
    assert!(store.send(FeedAction::Stop).await.is_err());
}

// Lifted middleware on a private vocabulary

#[derive(Clone, Debug, Default)]
struct AppState {
    threshold: u32,
    alerts: Vec<u32>,
}

#[derive(Clone, Debug)]
enum Reading {
    Measured(u32),
}

#[derive(Clone, Debug)]
enum Alert {
    Raised(u32),
}

#[derive(Clone, Debug)]
enum AppAction {
    Reading(Reading),
    Alert(Alert),
}

const READING: rexlist_core::lens::Prism<AppAction, Reading> = prism!(AppAction::Reading => Reading);
const ALERT: rexlist_core::lens::Prism<AppAction, Alert> = prism!(AppAction::Alert => Alert);
const THRESHOLD: rexlist_core::lens::Lens<AppState, u32> = lens_for!(AppState.threshold: u32);

/// Raises an alert for every reading above the threshold
struct Watchdog;

impl Middleware for Watchdog {
    type InputAction = Reading;
    type OutputAction = Alert;
    type State = u32;

    fn handle(&mut self, action: &Reading, threshold: &u32) -> Effect<Alert> {
        let Reading::Measured(value) = action;
        if value > threshold {
            Effect::send(Alert::Raised(*value))
        } else {
            Effect::None
        }
    }
}

struct AppReducer;

impl Reducer for AppReducer {
    type State = AppState;
    type Action = AppAction;

    fn reduce(&self, state: &mut AppState, action: &AppAction) {
        if let AppAction::Alert(Alert::Raised(value)) = action {
            state.alerts.push(*value);
        }
    }
}

#[tokio::test]
async fn test_lifted_middleware_loops_back_through_the_store() {
    let watchdog = lift_middleware(
        Watchdog,
        READING.extractor(),
        ALERT.embedder(),
        THRESHOLD.getter(),
    );
    let stages: Vec<BoxedMiddleware<AppState, AppAction>> = vec![Box::new(watchdog)];
    let store = Store::with_middleware(
        AppState {
            threshold: 10,
            alerts: Vec::new(),
        },
        AppReducer,
        compose_middleware(stages),
    );

    let raised = store
        .send_and_wait_for(
            AppAction::Reading(Reading::Measured(42)),
            |a| matches!(a, AppAction::Alert(_)),
            Duration::from_secs(1),
        )
        .await
        .expect("alert raised");
    assert!(matches!(raised, AppAction::Alert(Alert::Raised(42))));

    let mut quiet = store
        .send(AppAction::Reading(Reading::Measured(3)))
        .await
        .expect("send");
    quiet.wait().await;

    let state = store
        .wait_for_state(|s| s.alerts == [42], Duration::from_secs(1))
        .await
        .expect("alert folded");
    assert_eq!(state.alerts, vec![42]);
}
