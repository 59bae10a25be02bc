//! Demo driver for the rexlist to-do store.
//!
//! Walks the store through one app session: becomes active, edits the list
//! through the views, and shuts down after going inactive.
//!
//! Configure with `REXLIST_*` environment variables (see [`AppConfig`]);
//! `REXLIST_DATA_FILE` keeps the list between runs.

use anyhow::Context;
use rexlist_core::environment::UuidGenerator;
use rexlist_runtime::metrics::MetricsServer;
use rexlist_todo::views::{self, TaskCellViewAction, TaskListViewAction};
use rexlist_todo::{
    build_store, AppAction, AppConfig, AppStore, LifecycleAction, PersistentStoreAction, TaskDatabase,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SETTLE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    config.validate()?;
    init_tracing(&config);

    let mut metrics = config.metrics_addr.map(MetricsServer::new);
    if let Some(server) = metrics.as_mut() {
        server.start()?;
    }

    let database = match &config.data_file {
        Some(path) => TaskDatabase::open(path, Arc::new(UuidGenerator))
            .await
            .with_context(|| format!("opening {}", path.display()))?,
        None => TaskDatabase::in_memory(),
    };

    let store = build_store(Arc::new(database), &config);
    let diagnostics = tokio::spawn(report_diagnostics(store.subscribe_actions()));

    store
        .send(AppAction::PersistentStore(PersistentStoreAction::ConnectToStore))
        .await?;
    store
        .send(AppAction::Lifecycle(LifecycleAction::DidBecomeActive))
        .await?;

    run_session(&store).await?;

    store
        .send(AppAction::Lifecycle(LifecycleAction::WillBecomeInactive))
        .await?;
    store.shutdown(config.shutdown_timeout()).await?;
    diagnostics.abort();

    tracing::info!("Session finished");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

async fn run_session(store: &AppStore) -> anyhow::Result<()> {
    let list = views::task_list(store);
    let start = list.state().tasks.len();

    for name in ["Buy milk", "Walk the dog", "Write report"] {
        list.send(TaskListViewAction::Add(name.to_string())).await?;
    }
    store
        .wait_for_state(|state| state.tasks.len() >= start + 3, SETTLE)
        .await
        .context("waiting for added tasks")?;
    print_list(store, "after adding");

    list.send(TaskListViewAction::Move {
        from: BTreeSet::from([start]),
        to: start + 2,
    })
    .await?;

    let Some(first) = store.state(|state| state.tasks.get(start).map(|task| task.id)) else {
        return Ok(());
    };
    let cell = views::task_cell(store, first);
    cell.send(TaskCellViewAction::Toggle).await?;
    store
        .wait_for_state(
            |state| state.task(first).is_some_and(|task| task.completed),
            SETTLE,
        )
        .await
        .context("waiting for toggle")?;
    print_list(store, "after moving and toggling");

    list.send(TaskListViewAction::ClearCompleted).await?;
    store
        .wait_for_state(|state| state.task(first).is_none(), SETTLE)
        .await
        .context("waiting for clear")?;
    print_list(store, "after clearing completed");

    Ok(())
}

async fn report_diagnostics(mut actions: broadcast::Receiver<AppAction>) {
    loop {
        match actions.recv().await {
            Ok(AppAction::PersistentStore(action)) if action.is_diagnostic() => {
                tracing::warn!(?action, "Storage diagnostic");
            },
            Ok(_) => {},
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Diagnostic reporter lagged");
            },
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_list(store: &AppStore, label: &str) {
    let state = store.current_state();
    println!("{label}:");
    for task in &state.tasks {
        let mark = if task.completed { "x" } else { " " };
        println!("  {:>2}. [{mark}] {}", task.index, task.name);
    }
}
