//! Reducers of the to-do application.
//!
//! Each sub-reducer only knows its own action category and state slot; the
//! app reducer lifts them into [`AppState`]/[`AppAction`] and runs them in a
//! fixed order: lifecycle, persistence, list, task. Replacing the task list
//! from storage therefore always happens before local task edits of the same
//! action.

use crate::actions::{
    AppAction, LifecycleAction, ListAction, PersistentStoreAction, TaskAction, LIFECYCLE_ACTION,
    LIST_ACTION, PERSISTENCE_ACTION, TASK_ACTION,
};
use crate::types::{AppLifecycle, AppState, Task, TaskListState, LIFECYCLE, TASKS, TASK_LIST};
use rexlist_core::composition::{combine_reducers, lift_reducer, CombinedReducer};
use rexlist_core::reducer::Reducer;

/// The composed reducer of the application
pub type AppReducer = CombinedReducer<AppState, AppAction>;

/// Build the application reducer
#[must_use]
pub fn app_reducer() -> AppReducer {
    combine_reducers(vec![
        Box::new(lift_reducer(LifecycleReducer, LIFECYCLE_ACTION, LIFECYCLE)),
        Box::new(lift_reducer(PersistenceReducer, PERSISTENCE_ACTION, TASKS)),
        Box::new(lift_reducer(ListReducer, LIST_ACTION, TASK_LIST)),
        Box::new(lift_reducer(TaskReducer, TASK_ACTION, TASKS)),
    ])
}

/// Tracks the host lifecycle phase
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleReducer;

impl Reducer for LifecycleReducer {
    type State = AppLifecycle;
    type Action = LifecycleAction;

    fn reduce(&self, state: &mut AppLifecycle, action: &LifecycleAction) {
        *state = match action {
            LifecycleAction::DidEnterBackground => AppLifecycle::BackgroundActive,
            LifecycleAction::WillEnterForeground | LifecycleAction::WillBecomeInactive => {
                AppLifecycle::Inactive
            },
            LifecycleAction::DidBecomeActive => AppLifecycle::Active,
        };
    }
}

/// Mirrors the task list committed by storage
///
/// Only `TaskListModified` touches state; it replaces the list wholesale.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistenceReducer;

impl Reducer for PersistenceReducer {
    type State = Vec<Task>;
    type Action = PersistentStoreAction;

    fn reduce(&self, state: &mut Vec<Task>, action: &PersistentStoreAction) {
        if let PersistentStoreAction::TaskListModified(tasks) = action {
            state.clone_from(tasks);
        }
    }
}

/// Keeps the list view selection
///
/// Every other list action is a storage directive handled by middleware.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListReducer;

impl Reducer for ListReducer {
    type State = TaskListState;
    type Action = ListAction;

    fn reduce(&self, state: &mut TaskListState, action: &ListAction) {
        if let ListAction::Select { id } = action {
            state.selected = *id;
        }
    }
}

/// Applies task cell edits to the local list
///
/// Unknown ids are ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskReducer;

impl Reducer for TaskReducer {
    type State = Vec<Task>;
    type Action = TaskAction;

    fn reduce(&self, state: &mut Vec<Task>, action: &TaskAction) {
        match action {
            TaskAction::Toggle { id } => {
                if let Some(task) = state.iter_mut().find(|task| task.id == *id) {
                    task.completed = !task.completed;
                }
            },
            TaskAction::Update { id, name } => {
                if let Some(task) = state.iter_mut().find(|task| task.id == *id) {
                    task.name.clone_from(name);
                }
            },
        }
    }
}
