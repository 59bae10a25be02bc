//! Store performance benchmarks
//!
//! - Fold cost of a lifted reducer chain (pure, no runtime)
//! - Store throughput with and without a middleware pipeline
//! - Snapshot observer fan-out
//!
//! Run with: `cargo bench -p rexlist-runtime`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rexlist_core::composition::{combine_reducers, lift_reducer};
use rexlist_core::effect::Effect;
use rexlist_core::lens::{Lens, Prism};
use rexlist_core::middleware::{compose_middleware, BoxedMiddleware, Middleware};
use rexlist_core::reducer::Reducer;
use rexlist_core::{lens_for, prism};
use rexlist_runtime::{LoggerMiddleware, Store};

#[derive(Clone, Debug)]
struct BenchState {
    counter: i64,
    names: Vec<String>,
    data: Vec<u8>, // For testing state size impact
}

impl Default for BenchState {
    fn default() -> Self {
        Self {
            counter: 0,
            names: Vec::new(),
            data: vec![0; 1024], // 1KB of data
        }
    }
}

#[derive(Clone, Debug)]
enum CounterAction {
    Add(i64),
}

#[derive(Clone, Debug)]
enum NameAction {
    Rename(String),
}

#[derive(Clone, Debug)]
enum BenchAction {
    Counter(CounterAction),
    Name(NameAction),
}

const COUNTER: Prism<BenchAction, CounterAction> = prism!(BenchAction::Counter => CounterAction);
const NAME: Prism<BenchAction, NameAction> = prism!(BenchAction::Name => NameAction);
const COUNT: Lens<BenchState, i64> = lens_for!(BenchState.counter: i64);
const NAMES: Lens<BenchState, Vec<String>> = lens_for!(BenchState.names: Vec<String>);

struct CounterReducer;

impl Reducer for CounterReducer {
    type State = i64;
    type Action = CounterAction;

    fn reduce(&self, state: &mut i64, action: &CounterAction) {
        let CounterAction::Add(by) = action;
        *state += by;
    }
}

struct NameReducer;

impl Reducer for NameReducer {
    type State = Vec<String>;
    type Action = NameAction;

    fn reduce(&self, state: &mut Vec<String>, action: &NameAction) {
        let NameAction::Rename(name) = action;
        if let Some(first) = state.first_mut() {
            first.clone_from(name);
        } else {
            state.push(name.clone());
        }
    }
}

type AppReducer = rexlist_core::composition::CombinedReducer<BenchState, BenchAction>;

fn app_reducer() -> AppReducer {
    combine_reducers(vec![
        Box::new(lift_reducer(CounterReducer, COUNTER, COUNT)),
        Box::new(lift_reducer(NameReducer, NAME, NAMES)),
    ])
}

/// Counts actions without emitting effects
struct Tally(u64);

impl Middleware for Tally {
    type InputAction = BenchAction;
    type OutputAction = BenchAction;
    type State = BenchState;

    fn handle(&mut self, _action: &BenchAction, _state: &BenchState) -> Effect<BenchAction> {
        self.0 += 1;
        Effect::None
    }
}

fn bench_reducer(c: &mut Criterion) {
    let mut group = c.benchmark_group("reducer");
    group.throughput(Throughput::Elements(1));

    let reducer = app_reducer();

    group.bench_function("lifted_counter", |b| {
        let mut state = BenchState::default();
        b.iter(|| {
            reducer.reduce(&mut state, black_box(&BenchAction::Counter(CounterAction::Add(1))));
        });
    });

    group.bench_function("lifted_rename", |b| {
        let mut state = BenchState::default();
        let action = BenchAction::Name(NameAction::Rename("bench".to_string()));
        b.iter(|| {
            reducer.reduce(&mut state, black_box(&action));
        });
    });

    group.finish();
}

fn bench_store_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_throughput");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Runtime::new().expect("Failed to create runtime");

    group.bench_function("send_action", |b| {
        let store = Store::new(BenchState::default(), app_reducer());
        b.to_async(&runtime).iter(|| async {
            let _ = store
                .send(black_box(BenchAction::Counter(CounterAction::Add(1))))
                .await;
        });
    });

    group.bench_function("send_through_pipeline", |b| {
        let stages: Vec<BoxedMiddleware<BenchState, BenchAction>> = vec![
            Box::new(LoggerMiddleware::new("bench")),
            Box::new(Tally(0)),
        ];
        let store = Store::with_middleware(BenchState::default(), app_reducer(), compose_middleware(stages));
        b.to_async(&runtime).iter(|| async {
            let _ = store
                .send(black_box(BenchAction::Counter(CounterAction::Add(1))))
                .await;
        });
    });

    group.bench_function("send_with_observers", |b| {
        let store = Store::new(BenchState::default(), app_reducer());
        let subscriptions: Vec<_> = (0..8)
            .map(|_| {
                store.subscribe(|snapshot| {
                    black_box(snapshot.version);
                })
            })
            .collect();
        b.to_async(&runtime).iter(|| async {
            let _ = store
                .send(black_box(BenchAction::Counter(CounterAction::Add(1))))
                .await;
        });
        drop(subscriptions);
    });

    group.finish();
}

fn bench_state_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("state_read");

    let store = Store::new(BenchState::default(), app_reducer());

    group.bench_function("read_closure", |b| {
        b.iter(|| black_box(store.state(|s| s.counter + s.data.len() as i64)));
    });

    group.bench_function("snapshot", |b| {
        b.iter(|| black_box(store.snapshot().version));
    });

    group.finish();
}

criterion_group!(benches, bench_reducer, bench_store_throughput, bench_state_read);
criterion_main!(benches);
