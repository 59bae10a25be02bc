//! The action vocabulary of the to-do application.
//!
//! [`AppAction`] is partitioned into four categories. Reducers and
//! middleware written for one category reach it through the prisms declared
//! at the bottom of this module.

use crate::types::{Task, TaskId};
use rexlist_core::lens::Prism;
use rexlist_core::prism;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Every action the store understands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AppAction {
    /// Host lifecycle events
    Lifecycle(LifecycleAction),
    /// Persistence directives, change notifications and diagnostics
    PersistentStore(PersistentStoreAction),
    /// Task list view intents
    List(ListAction),
    /// Single task edits
    Task(TaskAction),
}

/// Host lifecycle events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleAction {
    /// The app moved to the background
    DidEnterBackground,
    /// The app is about to return to the foreground
    WillEnterForeground,
    /// The app gained focus
    DidBecomeActive,
    /// The app is about to lose focus
    WillBecomeInactive,
}

/// Persistence directives and what comes back from storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersistentStoreAction {
    /// Check that storage is reachable
    ConnectToStore,
    /// Start observing the task list
    SubscribeToChanges,
    /// Stop observing the task list
    CancelSubscription,
    /// Storage committed a new task list
    TaskListModified(Vec<Task>),
    /// Storage could not be reached
    StoreUnavailable {
        /// Human-readable cause
        reason: String,
    },
    /// A write was dropped after its retries ran out
    OperationFailed {
        /// Which write failed
        operation: String,
        /// Human-readable cause
        reason: String,
    },
    /// The change stream ended with an error
    ChangeStreamFailed {
        /// Human-readable cause
        reason: String,
    },
    /// A write referred to a task storage does not know
    TaskNotFound {
        /// Which write was skipped
        operation: String,
        /// The unknown id
        id: TaskId,
    },
}

impl PersistentStoreAction {
    /// Whether this action only reports a problem
    #[must_use]
    pub const fn is_diagnostic(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable { .. }
                | Self::OperationFailed { .. }
                | Self::ChangeStreamFailed { .. }
                | Self::TaskNotFound { .. }
        )
    }
}

/// Field changes applied to a stored task in place
///
/// Unset fields are left alone; the index is never part of a patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    /// New name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New completion flag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TaskPatch {
    /// A patch that renames
    #[must_use]
    pub fn rename(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            completed: None,
        }
    }

    /// A patch that sets the completion flag
    #[must_use]
    pub const fn completed(completed: bool) -> Self {
        Self {
            name: None,
            completed: Some(completed),
        }
    }

    /// Whether the patch changes nothing
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.completed.is_none()
    }

    /// Apply the set fields to `task`
    pub fn apply(&self, task: &mut Task) {
        if let Some(name) = &self.name {
            task.name.clone_from(name);
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

/// Intents of the task list view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListAction {
    /// Append a new task
    Add {
        /// Name of the new task
        name: String,
    },
    /// Remove a task
    Delete {
        /// The task to remove
        id: TaskId,
    },
    /// Reorder: move the task at the first source position to `to`
    Move {
        /// Source positions; only the first one is used
        from: BTreeSet<usize>,
        /// Destination position, appended when past the end
        to: usize,
    },
    /// Change stored fields of a task
    Update {
        /// The task to change
        id: TaskId,
        /// What to change
        patch: TaskPatch,
    },
    /// Remove every completed task
    ClearCompleted,
    /// Highlight a task, or clear the highlight
    Select {
        /// The task to highlight
        id: Option<TaskId>,
    },
}

/// Edits coming from a single task cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskAction {
    /// Flip the completion flag
    Toggle {
        /// The task to flip
        id: TaskId,
    },
    /// Rename
    Update {
        /// The task to rename
        id: TaskId,
        /// New name
        name: String,
    },
}

/// The lifecycle category of [`AppAction`]
pub const LIFECYCLE_ACTION: Prism<AppAction, LifecycleAction> =
    prism!(AppAction::Lifecycle => LifecycleAction);

/// The persistence category of [`AppAction`]
pub const PERSISTENCE_ACTION: Prism<AppAction, PersistentStoreAction> =
    prism!(AppAction::PersistentStore => PersistentStoreAction);

/// The list category of [`AppAction`]
pub const LIST_ACTION: Prism<AppAction, ListAction> = prism!(AppAction::List => ListAction);

/// The task category of [`AppAction`]
pub const TASK_ACTION: Prism<AppAction, TaskAction> = prism!(AppAction::Task => TaskAction);
