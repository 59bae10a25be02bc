//! The persistence middleware.
//!
//! [`PersistentStoreMiddleware`] is the only part of the application that
//! talks to storage. It turns lifecycle events into subscription directives
//! through the store (so the directive itself is an observable action), owns
//! the change-stream subscription, and forwards every list and task edit to
//! storage.
//!
//! Writes are chained: each write waits for the one dispatched before it, so
//! storage applies them in dispatch order even though each runs in its own
//! effect. A write that still fails after its retries is dropped and
//! reported with a diagnostic action; nothing here ever stops the pipeline.

use crate::actions::{
    AppAction, LifecycleAction, ListAction, PersistentStoreAction, TaskAction, TaskPatch,
    PERSISTENCE_ACTION,
};
use crate::persistence::{PersistenceError, PersistenceService, TaskFilter};
use crate::types::{AppState, Task, TaskId, TASKS};
use futures::StreamExt;
use rexlist_core::cancellation::SubscriptionHandle;
use rexlist_core::effect::Effect;
use rexlist_core::middleware::{compose_middleware, lift_middleware, BoxedMiddleware, Middleware, Pipeline};
use rexlist_runtime::metrics::PersistenceMetrics;
use rexlist_runtime::retry::{retry_with_predicate, RetryPolicy};
use rexlist_runtime::LoggerMiddleware;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;

/// How the persistence middleware reacts to failures
#[derive(Debug, Clone)]
pub struct PersistenceSettings {
    /// Retries for writes and the availability check
    pub retry: RetryPolicy,
    /// Reopen the change stream after it fails
    pub resubscribe_on_failure: bool,
    /// Emit `TaskNotFound` for writes that name an unknown task
    pub report_missing_tasks: bool,
    /// Which tasks the change stream carries
    pub filter: TaskFilter,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            resubscribe_on_failure: true,
            report_missing_tasks: false,
            filter: TaskFilter::All,
        }
    }
}

/// Where the change-stream subscription stands
#[derive(Debug, Default)]
enum Subscription {
    #[default]
    Unsubscribed,
    /// Streaming; the handle cancels the stream
    Subscribed(SubscriptionHandle),
    /// Waiting to reopen a failed stream; the handle cancels the wait
    Reconnecting(SubscriptionHandle),
}

/// A storage write, queued in dispatch order
#[derive(Debug, Clone)]
enum Write {
    Add(String),
    Delete(TaskId),
    Move { from: BTreeSet<usize>, to: usize },
    Update { id: TaskId, patch: TaskPatch },
    Toggle(TaskId),
    ClearCompleted,
}

impl Write {
    const fn operation(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Delete(_) => "delete",
            Self::Move { .. } => "move",
            Self::Update { .. } => "update",
            Self::Toggle(_) => "toggle",
            Self::ClearCompleted => "clear_completed",
        }
    }

    async fn apply(&self, service: &dyn PersistenceService) -> Result<(), PersistenceError> {
        match self {
            Self::Add(name) => service.add(name.clone()).await.map(drop),
            Self::Delete(id) => service.delete(*id).await.map(drop),
            Self::Move { from, to } => service.move_task(from.clone(), *to).await.map(drop),
            Self::Update { id, patch } => service.update(*id, patch.clone()).await.map(drop),
            Self::Toggle(id) => service.toggle(*id).await.map(drop),
            Self::ClearCompleted => service.clear_completed().await.map(drop),
        }
    }
}

/// Mediates between the store and storage
///
/// Sees every [`AppAction`] and the task list the action is about to be
/// folded into; emits [`PersistentStoreAction`]s.
pub struct PersistentStoreMiddleware {
    service: Arc<dyn PersistenceService>,
    settings: PersistenceSettings,
    subscription: Subscription,
    stream_failures: u32,
    /// The open stream has not yet delivered its initial list
    awaiting_initial_list: bool,
    last_write: Option<oneshot::Receiver<()>>,
}

impl PersistentStoreMiddleware {
    /// Create a middleware writing to `service`
    #[must_use]
    pub fn new(service: Arc<dyn PersistenceService>, settings: PersistenceSettings) -> Self {
        Self {
            service,
            settings,
            subscription: Subscription::Unsubscribed,
            stream_failures: 0,
            awaiting_initial_list: false,
            last_write: None,
        }
    }

    /// Whether a change stream is currently open
    #[must_use]
    pub const fn is_subscribed(&self) -> bool {
        matches!(self.subscription, Subscription::Subscribed(_))
    }

    /// Consecutive change-stream failures
    ///
    /// A reopened stream always starts with the current list, so only a
    /// later list proves the stream healthy and resets the count.
    #[must_use]
    pub const fn stream_failures(&self) -> u32 {
        self.stream_failures
    }

    fn handle_store_action(&mut self, action: &PersistentStoreAction) -> Effect<PersistentStoreAction> {
        match action {
            PersistentStoreAction::ConnectToStore => self.check_store(),
            PersistentStoreAction::SubscribeToChanges => self.subscribe(),
            PersistentStoreAction::CancelSubscription => {
                self.cancel_subscription();
                Effect::None
            },
            PersistentStoreAction::TaskListModified(_) => {
                if std::mem::take(&mut self.awaiting_initial_list) {
                    tracing::trace!("Initial task list received");
                } else {
                    self.stream_failures = 0;
                }
                Effect::None
            },
            PersistentStoreAction::ChangeStreamFailed { reason } => self.stream_failed(reason),
            PersistentStoreAction::StoreUnavailable { .. }
            | PersistentStoreAction::OperationFailed { .. }
            | PersistentStoreAction::TaskNotFound { .. } => Effect::None,
        }
    }

    fn handle_list_action(&mut self, action: &ListAction) -> Effect<PersistentStoreAction> {
        match action {
            ListAction::Add { name } => self.enqueue(Write::Add(name.clone())),
            ListAction::Delete { id } => self.enqueue(Write::Delete(*id)),
            ListAction::Move { from, to } => self.enqueue(Write::Move {
                from: from.clone(),
                to: *to,
            }),
            ListAction::Update { id, patch } => self.enqueue(Write::Update {
                id: *id,
                patch: patch.clone(),
            }),
            ListAction::ClearCompleted => self.enqueue(Write::ClearCompleted),
            ListAction::Select { .. } => Effect::None,
        }
    }

    fn handle_task_action(&mut self, action: &TaskAction, tasks: &[Task]) -> Effect<PersistentStoreAction> {
        match action {
            TaskAction::Update { id, name } => self.enqueue(Write::Update {
                id: *id,
                patch: TaskPatch::rename(name.clone()),
            }),
            // Storage flips its own flag; the local list may be stale
            TaskAction::Toggle { id } if tasks.iter().any(|task| task.id == *id) => {
                self.enqueue(Write::Toggle(*id))
            },
            TaskAction::Toggle { id } => {
                tracing::warn!(%id, "Toggle of an unknown task ignored");
                self.missing_task("toggle", *id)
            },
        }
    }

    fn missing_task(&self, operation: &str, id: TaskId) -> Effect<PersistentStoreAction> {
        if self.settings.report_missing_tasks {
            Effect::send(PersistentStoreAction::TaskNotFound {
                operation: operation.to_string(),
                id,
            })
        } else {
            Effect::None
        }
    }

    fn check_store(&self) -> Effect<PersistentStoreAction> {
        let service = Arc::clone(&self.service);
        let retry = self.settings.retry.clone();

        Effect::future(async move {
            let checked = retry_with_predicate(
                &retry,
                "check_available",
                || service.check_available(),
                PersistenceError::is_retryable,
            )
            .await;

            match checked {
                Ok(()) => {
                    tracing::info!("Task storage reachable");
                    None
                },
                Err(error) => {
                    tracing::error!(error = %error, "Task storage unreachable");
                    Some(PersistentStoreAction::StoreUnavailable {
                        reason: error.to_string(),
                    })
                },
            }
        })
    }

    fn subscribe(&mut self) -> Effect<PersistentStoreAction> {
        if self.is_subscribed() {
            tracing::debug!("Already subscribed to task changes");
            return Effect::None;
        }

        let handle = SubscriptionHandle::new();
        let signal = handle.signal();
        // Replacing a pending reconnect drops, and so cancels, its handle
        self.subscription = Subscription::Subscribed(handle);
        self.awaiting_initial_list = true;
        tracing::info!(filter = ?self.settings.filter, "Subscribing to task changes");

        let service = Arc::clone(&self.service);
        let filter = self.settings.filter.clone();
        let changes = async_stream::stream! {
            match service.all(filter).await {
                Ok(mut snapshots) => {
                    while let Some(snapshot) = snapshots.next().await {
                        match snapshot {
                            Ok(tasks) => yield PersistentStoreAction::TaskListModified(tasks),
                            Err(error) => {
                                yield PersistentStoreAction::ChangeStreamFailed {
                                    reason: error.to_string(),
                                };
                                break;
                            },
                        }
                    }
                },
                Err(error) => {
                    yield PersistentStoreAction::ChangeStreamFailed {
                        reason: error.to_string(),
                    };
                },
            }
        };

        Effect::stream(changes).cancellable(signal)
    }

    fn cancel_subscription(&mut self) {
        match std::mem::take(&mut self.subscription) {
            Subscription::Subscribed(handle) => {
                handle.cancel();
                tracing::info!("Task change subscription cancelled");
            },
            Subscription::Reconnecting(handle) => {
                handle.cancel();
                tracing::info!("Pending resubscription cancelled");
            },
            Subscription::Unsubscribed => {
                tracing::debug!("No task change subscription to cancel");
            },
        }
    }

    fn stream_failed(&mut self, reason: &str) -> Effect<PersistentStoreAction> {
        tracing::warn!(reason, "Task change stream failed");
        if !self.is_subscribed() {
            return Effect::None;
        }
        // The failed stream has ended; release its handle
        self.cancel_subscription();
        self.stream_failures += 1;

        if !self.settings.resubscribe_on_failure {
            tracing::warn!("Keeping the last task list; resubscription is disabled");
            return Effect::None;
        }
        if !self.settings.retry.should_retry(self.stream_failures) {
            tracing::error!(failures = self.stream_failures, "Giving up on the task change stream");
            return Effect::None;
        }

        let delay = self.settings.retry.delay_for_attempt(self.stream_failures - 1);
        let handle = SubscriptionHandle::new();
        let signal = handle.signal();
        self.subscription = Subscription::Reconnecting(handle);
        tracing::info!(?delay, failures = self.stream_failures, "Resubscribing to task changes");

        Effect::Delay {
            duration: delay,
            action: Box::new(PersistentStoreAction::SubscribeToChanges),
        }
        .cancellable(signal)
    }

    /// Queue `write` behind every write dispatched before it
    fn enqueue(&mut self, write: Write) -> Effect<PersistentStoreAction> {
        let (done, finished) = oneshot::channel::<()>();
        let previous = self.last_write.replace(finished);
        let service = Arc::clone(&self.service);
        let retry = self.settings.retry.clone();
        let report_missing = self.settings.report_missing_tasks;

        tracing::debug!(operation = write.operation(), "Queueing storage write");

        Effect::future(async move {
            if let Some(previous) = previous {
                // Err only means the previous write is gone, which also frees the queue
                let _ = previous.await;
            }

            let operation = write.operation();
            let start = Instant::now();
            let result = retry_with_predicate(
                &retry,
                operation,
                || write.apply(service.as_ref()),
                PersistenceError::is_retryable,
            )
            .await;
            PersistenceMetrics::record_operation(operation, start.elapsed(), result.is_ok());
            let _ = done.send(());

            match result {
                Ok(()) => None,
                Err(PersistenceError::NotFound(id)) => {
                    tracing::warn!(operation, %id, "Storage write skipped: unknown task");
                    report_missing.then(|| PersistentStoreAction::TaskNotFound {
                        operation: operation.to_string(),
                        id,
                    })
                },
                Err(PersistenceError::Unavailable(reason)) => {
                    tracing::error!(operation, reason = %reason, "Storage write dropped: storage unavailable");
                    Some(PersistentStoreAction::StoreUnavailable { reason })
                },
                Err(error) => {
                    tracing::error!(operation, error = %error, "Storage write dropped");
                    Some(PersistentStoreAction::OperationFailed {
                        operation: operation.to_string(),
                        reason: error.to_string(),
                    })
                },
            }
        })
    }
}

impl Middleware for PersistentStoreMiddleware {
    type InputAction = AppAction;
    type OutputAction = PersistentStoreAction;
    type State = Vec<Task>;

    fn handle(&mut self, action: &AppAction, tasks: &Vec<Task>) -> Effect<PersistentStoreAction> {
        match action {
            AppAction::Lifecycle(LifecycleAction::DidBecomeActive) => {
                Effect::send(PersistentStoreAction::SubscribeToChanges)
            },
            AppAction::Lifecycle(LifecycleAction::WillBecomeInactive) => {
                Effect::send(PersistentStoreAction::CancelSubscription)
            },
            AppAction::Lifecycle(_) => Effect::None,
            AppAction::PersistentStore(action) => self.handle_store_action(action),
            AppAction::List(action) => self.handle_list_action(action),
            AppAction::Task(action) => self.handle_task_action(action, tasks),
        }
    }
}

const fn every_action(action: &AppAction) -> Option<&AppAction> {
    Some(action)
}

/// The persistence middleware lifted into the application types
#[must_use]
pub fn persistence_middleware(
    service: Arc<dyn PersistenceService>,
    settings: PersistenceSettings,
) -> BoxedMiddleware<AppState, AppAction> {
    Box::new(lift_middleware(
        PersistentStoreMiddleware::new(service, settings),
        every_action,
        PERSISTENCE_ACTION.embedder(),
        TASKS.getter(),
    ))
}

/// The application pipeline: action logging, then persistence
#[must_use]
pub fn app_pipeline(
    service: Arc<dyn PersistenceService>,
    settings: PersistenceSettings,
) -> Pipeline<AppState, AppAction> {
    compose_middleware(vec![
        Box::new(LoggerMiddleware::new("app")),
        persistence_middleware(service, settings),
    ])
}

#[cfg(test)]
#[allow(clippy::panic)] // Tests can panic
mod tests {
    use super::*;
    use crate::database::TaskDatabase;
    use rexlist_testing::{assertions, collect_actions, take_actions, MiddlewareTest, SequentialIdGenerator};
    use std::time::Duration;

    fn quick_retry() -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(1))
            .with_jitter(false)
    }

    fn settings() -> PersistenceSettings {
        PersistenceSettings {
            retry: quick_retry(),
            ..PersistenceSettings::default()
        }
    }

    fn database() -> TaskDatabase {
        TaskDatabase::with_tasks(Arc::new(SequentialIdGenerator::new()), Vec::new(), None)
    }

    fn middleware(db: &TaskDatabase, settings: PersistenceSettings) -> PersistentStoreMiddleware {
        PersistentStoreMiddleware::new(Arc::new(db.clone()), settings)
    }

    fn store_action(action: PersistentStoreAction) -> AppAction {
        AppAction::PersistentStore(action)
    }

    #[test]
    fn lifecycle_events_loop_back_as_directives() {
        let _ = MiddlewareTest::new(middleware(&database(), settings()))
            .given_state(Vec::new())
            .when_action(AppAction::Lifecycle(LifecycleAction::DidBecomeActive))
            .when_action(AppAction::Lifecycle(LifecycleAction::WillBecomeInactive))
            .when_action(AppAction::Lifecycle(LifecycleAction::DidEnterBackground))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 3);
                assertions::assert_has_future_effect(&effects[..1]);
                assertions::assert_has_future_effect(&effects[1..2]);
                assertions::assert_no_effects(&effects[2..]);
            })
            .run();
    }

    #[tokio::test]
    async fn lifecycle_directives_carry_the_right_action() {
        let mut mw = middleware(&database(), settings());
        let subscribe = mw.handle(&AppAction::Lifecycle(LifecycleAction::DidBecomeActive), &Vec::new());
        let cancel = mw.handle(&AppAction::Lifecycle(LifecycleAction::WillBecomeInactive), &Vec::new());

        assert_eq!(collect_actions(subscribe).await, vec![PersistentStoreAction::SubscribeToChanges]);
        assert_eq!(collect_actions(cancel).await, vec![PersistentStoreAction::CancelSubscription]);
    }

    #[test]
    fn subscribing_twice_opens_one_stream() {
        let _ = MiddlewareTest::new(middleware(&database(), settings()))
            .given_state(Vec::new())
            .when_action(store_action(PersistentStoreAction::SubscribeToChanges))
            .when_action(store_action(PersistentStoreAction::SubscribeToChanges))
            .then_effects(|effects| {
                assertions::assert_has_live_cancellable(&effects[..1]);
                assertions::assert_has_stream_effect(&effects[..1]);
                assertions::assert_no_effects(&effects[1..]);
            })
            .then_middleware(|mw| assert!(mw.is_subscribed()))
            .run();
    }

    #[tokio::test]
    async fn stream_maps_snapshots_to_task_list_modified() {
        let db = database();
        let _ = db.add("A".to_string()).await;
        let mut mw = middleware(&db, settings());

        let effect = mw.handle(&store_action(PersistentStoreAction::SubscribeToChanges), &Vec::new());
        let first = take_actions(effect, 1, Duration::from_secs(1)).await;

        assert!(matches!(
            first.as_slice(),
            [PersistentStoreAction::TaskListModified(tasks)] if tasks.len() == 1 && tasks[0].name == "A"
        ));
    }

    #[tokio::test]
    async fn cancel_ends_the_stream_effect() {
        let db = database();
        let mut mw = middleware(&db, settings());

        let effect = mw.handle(&store_action(PersistentStoreAction::SubscribeToChanges), &Vec::new());
        let _ = mw.handle(&store_action(PersistentStoreAction::CancelSubscription), &Vec::new());
        assert!(!mw.is_subscribed());

        let _ = db.add("late".to_string()).await;
        assert!(collect_actions(effect).await.is_empty());
    }

    #[tokio::test]
    async fn writes_reach_storage_in_dispatch_order() {
        let db = database();
        let mut mw = middleware(&db, settings());

        let effects: Vec<_> = ["A", "B", "C"]
            .iter()
            .map(|name| {
                mw.handle(
                    &AppAction::List(ListAction::Add {
                        name: (*name).to_string(),
                    }),
                    &Vec::new(),
                )
            })
            .collect();

        // Start the last write first; it still waits for the earlier ones
        let running: Vec<_> = effects
            .into_iter()
            .rev()
            .map(|effect| tokio::spawn(collect_actions(effect)))
            .collect();
        for write in running {
            assert!(matches!(write.await, Ok(ref actions) if actions.is_empty()));
        }

        let names: Vec<String> = db.snapshot().await.into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn toggle_flips_the_stored_flag_not_the_local_one() {
        let db = database();
        let task = match db.add("A".to_string()).await {
            Ok(task) => task,
            Err(error) => panic!("add failed: {error}"),
        };
        let id = task.id;
        let mut mw = middleware(&db, settings());
        let toggle = AppAction::Task(TaskAction::Toggle { id });

        let effect = mw.handle(&toggle, &vec![task.clone()]);
        assert!(collect_actions(effect).await.is_empty());
        assert!(db.snapshot().await[0].completed);

        // The local list still shows the task as open
        let effect = mw.handle(&toggle, &vec![task]);
        assert!(collect_actions(effect).await.is_empty());
        assert!(!db.snapshot().await[0].completed);
    }

    #[tokio::test]
    async fn unknown_ids_are_reported_only_when_asked() {
        let db = database();
        let ghost = TaskId::from_uuid(SequentialIdGenerator::nth(77));
        let delete = AppAction::List(ListAction::Delete { id: ghost });

        let mut quiet = middleware(&db, settings());
        assert!(collect_actions(quiet.handle(&delete, &Vec::new())).await.is_empty());

        let mut loud = middleware(
            &db,
            PersistenceSettings {
                report_missing_tasks: true,
                ..settings()
            },
        );
        let reported = collect_actions(loud.handle(&delete, &Vec::new())).await;
        assert_eq!(
            reported,
            vec![PersistentStoreAction::TaskNotFound {
                operation: "delete".to_string(),
                id: ghost,
            }]
        );
    }

    #[tokio::test]
    async fn unavailable_storage_is_reported_after_retries() {
        let db = database();
        db.set_available(false);
        let mut mw = middleware(&db, settings());

        let add = collect_actions(mw.handle(
            &AppAction::List(ListAction::Add { name: "A".to_string() }),
            &Vec::new(),
        ))
        .await;
        assert!(matches!(add.as_slice(), [PersistentStoreAction::StoreUnavailable { .. }]));

        let check = collect_actions(mw.handle(&store_action(PersistentStoreAction::ConnectToStore), &Vec::new())).await;
        assert!(matches!(check.as_slice(), [PersistentStoreAction::StoreUnavailable { .. }]));
    }

    #[tokio::test]
    async fn bad_move_is_reported_as_failed_operation() {
        let db = database();
        let mut mw = middleware(&db, settings());

        let reported = collect_actions(mw.handle(
            &AppAction::List(ListAction::Move {
                from: BTreeSet::from([3]),
                to: 0,
            }),
            &Vec::new(),
        ))
        .await;
        assert!(matches!(
            reported.as_slice(),
            [PersistentStoreAction::OperationFailed { operation, .. }] if operation == "move"
        ));
    }

    #[tokio::test]
    async fn stream_failure_schedules_a_cancellable_resubscription() {
        let db = database();
        let mut mw = middleware(&db, settings());
        let _stream = mw.handle(&store_action(PersistentStoreAction::SubscribeToChanges), &Vec::new());

        let failed = store_action(PersistentStoreAction::ChangeStreamFailed {
            reason: "gone".to_string(),
        });
        let retry = mw.handle(&failed, &Vec::new());
        assert!(!mw.is_subscribed());
        assert_eq!(mw.stream_failures(), 1);
        assert_eq!(collect_actions(retry).await, vec![PersistentStoreAction::SubscribeToChanges]);

        // A failure reported while not subscribed is stale
        assert!(mw.handle(&failed, &Vec::new()).is_none());

        let _stream = mw.handle(&store_action(PersistentStoreAction::SubscribeToChanges), &Vec::new());
        let retry = mw.handle(&failed, &Vec::new());
        let _ = mw.handle(&store_action(PersistentStoreAction::CancelSubscription), &Vec::new());
        assert!(collect_actions(retry).await.is_empty());
    }

    #[test]
    fn initial_lists_do_not_reset_the_failure_count() {
        let mut mw = middleware(&database(), settings());
        let failed = store_action(PersistentStoreAction::ChangeStreamFailed {
            reason: "flaky".to_string(),
        });
        let delivered = store_action(PersistentStoreAction::TaskListModified(Vec::new()));

        for attempt in 1..=2 {
            let _ = mw.handle(&store_action(PersistentStoreAction::SubscribeToChanges), &Vec::new());
            let _ = mw.handle(&delivered, &Vec::new());
            assert!(!mw.handle(&failed, &Vec::new()).is_none());
            assert_eq!(mw.stream_failures(), attempt);
        }

        // The third stream also fails after its initial list: give up
        let _ = mw.handle(&store_action(PersistentStoreAction::SubscribeToChanges), &Vec::new());
        let _ = mw.handle(&delivered, &Vec::new());
        assert!(mw.handle(&failed, &Vec::new()).is_none());
        assert_eq!(mw.stream_failures(), 3);
        assert!(!mw.is_subscribed());
    }

    #[test]
    fn later_lists_reset_the_failure_count() {
        let mut mw = middleware(&database(), settings());
        let delivered = store_action(PersistentStoreAction::TaskListModified(Vec::new()));

        let _ = mw.handle(&store_action(PersistentStoreAction::SubscribeToChanges), &Vec::new());
        let _ = mw.handle(
            &store_action(PersistentStoreAction::ChangeStreamFailed {
                reason: "flaky".to_string(),
            }),
            &Vec::new(),
        );
        let _ = mw.handle(&store_action(PersistentStoreAction::SubscribeToChanges), &Vec::new());
        let _ = mw.handle(&delivered, &Vec::new());
        assert_eq!(mw.stream_failures(), 1);

        let _ = mw.handle(&delivered, &Vec::new());
        assert_eq!(mw.stream_failures(), 0);
    }

    #[test]
    fn disabled_resubscription_keeps_the_last_list() {
        let _ = MiddlewareTest::new(middleware(
            &database(),
            PersistenceSettings {
                resubscribe_on_failure: false,
                ..settings()
            },
        ))
        .given_state(Vec::new())
        .when_action(store_action(PersistentStoreAction::SubscribeToChanges))
        .when_action(store_action(PersistentStoreAction::ChangeStreamFailed {
            reason: "gone".to_string(),
        }))
        .then_effects(|effects| assertions::assert_no_effects(&effects[1..]))
        .then_middleware(|mw| {
            assert!(!mw.is_subscribed());
            assert_eq!(mw.stream_failures(), 1);
        })
        .run();
    }
}
