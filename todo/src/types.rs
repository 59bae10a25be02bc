//! Domain types for the to-do application.
//!
//! The state tree is deliberately small: the lifecycle phase reported by the
//! host, the ordered task list mirrored from storage, and the transient
//! selection of the list view.

use rexlist_core::lens::Lens;
use rexlist_core::lens_for;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, immutable task identifier
///
/// Serialized as the hyphenated UUID string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Wrap an existing UUID
    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// The underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TaskId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// A single entry of the ordered task list
///
/// `index` is the task's position. Across one snapshot the indices are
/// exactly `0..len`, and the list is ordered by them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Assigned by storage on insert, never reassigned
    pub id: TaskId,
    /// Position in the list
    pub index: usize,
    /// Free text
    pub name: String,
    /// Whether the task is done
    #[serde(default)]
    pub completed: bool,
}

impl Task {
    /// Create a pending task
    #[must_use]
    pub fn new(id: TaskId, index: usize, name: impl Into<String>) -> Self {
        Self {
            id,
            index,
            name: name.into(),
            completed: false,
        }
    }
}

/// Host application lifecycle phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppLifecycle {
    /// Launched but not yet in the foreground
    #[default]
    BackgroundInactive,
    /// Running in the background
    BackgroundActive,
    /// In the foreground without focus
    Inactive,
    /// In the foreground with focus
    Active,
}

/// State of the task list view that is never persisted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskListState {
    /// The highlighted task, if any
    pub selected: Option<TaskId>,
}

/// The whole state tree
///
/// Equality covers every field, selection included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppState {
    /// Lifecycle phase
    pub lifecycle: AppLifecycle,
    /// Tasks ordered by index, mirrored from storage
    pub tasks: Vec<Task>,
    /// List view selection
    pub task_list: TaskListState,
}

impl AppState {
    /// Look a task up by id
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }
}

/// The lifecycle slot of [`AppState`]
pub const LIFECYCLE: Lens<AppState, AppLifecycle> = lens_for!(AppState.lifecycle: AppLifecycle);

/// The task list slot of [`AppState`]
pub const TASKS: Lens<AppState, Vec<Task>> = lens_for!(AppState.tasks: Vec<Task>);

/// The list view slot of [`AppState`]
pub const TASK_LIST: Lens<AppState, TaskListState> = lens_for!(AppState.task_list: TaskListState);
