//! View projections of the application store.
//!
//! A view holds a [`ViewStore`] instead of the store: it reads its own view
//! state and sends its own small action vocabulary, which is embedded into
//! [`AppAction`] on the way in.

use crate::actions::{AppAction, ListAction, TaskAction, TaskPatch};
use crate::types::{AppState, Task, TaskId};
use rexlist_core::reducer::Reducer;
use rexlist_runtime::{Store, ViewStore};
use std::collections::BTreeSet;

/// What the task list view can ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskListViewAction {
    /// Append a task
    Add(String),
    /// Remove a task
    Delete(TaskId),
    /// Drag rows to a new position
    Move {
        /// Source rows; only the first is moved
        from: BTreeSet<usize>,
        /// Destination row
        to: usize,
    },
    /// Change the highlighted row
    Select(Option<TaskId>),
    /// Edit a task from the list
    Update {
        /// Task to edit
        id: TaskId,
        /// Fields to change
        patch: TaskPatch,
    },
    /// Remove every completed task
    ClearCompleted,
}

impl From<TaskListViewAction> for AppAction {
    fn from(action: TaskListViewAction) -> Self {
        Self::List(match action {
            TaskListViewAction::Add(name) => ListAction::Add { name },
            TaskListViewAction::Delete(id) => ListAction::Delete { id },
            TaskListViewAction::Move { from, to } => ListAction::Move { from, to },
            TaskListViewAction::Select(id) => ListAction::Select { id },
            TaskListViewAction::Update { id, patch } => ListAction::Update { id, patch },
            TaskListViewAction::ClearCompleted => ListAction::ClearCompleted,
        })
    }
}

/// What the task list view renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskListViewState {
    /// Header text
    pub title: String,
    /// Rows, in index order
    pub tasks: Vec<Task>,
    /// Highlighted row, if it still exists
    pub selected: Option<TaskId>,
}

impl TaskListViewState {
    /// Derive the list view from the application state
    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        let pending = state.tasks.iter().filter(|task| !task.completed).count();
        Self {
            title: format!("Tasks ({pending} left)"),
            tasks: state.tasks.clone(),
            selected: state.task_list.selected.filter(|id| state.task(*id).is_some()),
        }
    }
}

/// What a single task cell can ask for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskCellViewAction {
    /// Replace the name
    Rename(String),
    /// Flip the completion flag
    Toggle,
}

/// What a single task cell renders
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCellViewState {
    /// Row of the task
    pub index: usize,
    /// Task name
    pub name: String,
    /// Whether the task is done
    pub completed: bool,
}

impl TaskCellViewState {
    /// The cell of task `id`, or `None` once the task is gone
    #[must_use]
    pub fn from_state(state: &AppState, id: TaskId) -> Option<Self> {
        state.task(id).map(|task| Self {
            index: task.index,
            name: task.name.clone(),
            completed: task.completed,
        })
    }
}

/// The task list view of `store`
pub fn task_list<R>(store: &Store<AppState, AppAction, R>) -> ViewStore<TaskListViewState, TaskListViewAction>
where
    R: Reducer<State = AppState, Action = AppAction> + Send + 'static,
{
    store.scope(AppAction::from, TaskListViewState::from_state)
}

/// The cell view of task `id`
///
/// The state is `None` while no task has this id, e.g. after a delete;
/// actions sent then are ignored by the reducer and storage.
pub fn task_cell<R>(
    store: &Store<AppState, AppAction, R>,
    id: TaskId,
) -> ViewStore<Option<TaskCellViewState>, TaskCellViewAction>
where
    R: Reducer<State = AppState, Action = AppAction> + Send + 'static,
{
    store.scope(
        move |action| {
            AppAction::Task(match action {
                TaskCellViewAction::Rename(name) => TaskAction::Update { id, name },
                TaskCellViewAction::Toggle => TaskAction::Toggle { id },
            })
        },
        move |state| TaskCellViewState::from_state(state, id),
    )
}
