//! The storage contract the persistence middleware depends on.
//!
//! [`PersistenceService`] is the narrow capability set the application needs
//! from storage: a live change stream of the ordered task list plus the
//! writes that keep indices contiguous. [`TaskDatabase`](crate::database::TaskDatabase)
//! is the bundled implementation.
//!
//! # Dyn Compatibility
//!
//! Methods return boxed futures instead of using `async fn`, so the service
//! can be shared as `Arc<dyn PersistenceService>` and captured by effects.

use crate::actions::TaskPatch;
use crate::types::{Task, TaskId};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// No task with this id is stored
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// A move referred to a position past the end of the list
    #[error("Position {position} out of range for {len} tasks")]
    PositionOutOfRange {
        /// The requested source position
        position: usize,
        /// Number of stored tasks
        len: usize,
    },

    /// Storage cannot be reached right now
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Reading or writing the data file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The data file could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The change stream was interrupted
    #[error("Change stream failed: {0}")]
    StreamFailed(String),

    /// Storage shut down while a change stream was open
    #[error("Change stream closed")]
    StreamClosed,
}

impl PersistenceError {
    /// Whether trying the same operation again may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

/// Which tasks a change stream carries
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskFilter {
    /// Every task
    #[default]
    All,
    /// Completed tasks only
    Completed,
    /// Tasks still to do
    Pending,
    /// Tasks whose name contains the text, ignoring case
    NameContains(String),
}

impl TaskFilter {
    /// Whether `task` passes the filter
    #[must_use]
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Completed => task.completed,
            Self::Pending => !task.completed,
            Self::NameContains(text) => task.name.to_lowercase().contains(&text.to_lowercase()),
        }
    }

    /// The tasks of an index-ordered list that pass the filter, in order
    #[must_use]
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        tasks.iter().filter(|task| self.matches(task)).cloned().collect()
    }
}

/// Live sequence of full task list snapshots, ordered by index
///
/// The current list is yielded first, then one list per commit. A slow
/// consumer may skip intermediate lists; it always sees the latest. The
/// stream ends after yielding an error.
pub type TaskStream = Pin<Box<dyn Stream<Item = Result<Vec<Task>, PersistenceError>> + Send>>;

/// A boxed storage future
pub type PersistenceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, PersistenceError>> + Send + 'a>>;

/// Ordered task storage with a change stream
///
/// Every write commits atomically: a change stream never observes an
/// intermediate index assignment.
pub trait PersistenceService: Send + Sync {
    /// Open a change stream of the tasks passing `filter`
    ///
    /// # Errors
    ///
    /// - `Unavailable`: storage cannot be reached
    fn all(&self, filter: TaskFilter) -> PersistenceFuture<'_, TaskStream>;

    /// Append a task named `name` at the end of the list
    ///
    /// # Errors
    ///
    /// - `Unavailable`, `Io`, `Serialization`: the task was not stored
    fn add(&self, name: String) -> PersistenceFuture<'_, Task>;

    /// Remove a task and shift every later task down by one
    ///
    /// Returns the removed task.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no task has this id
    /// - `Unavailable`, `Io`, `Serialization`: nothing was changed
    fn delete(&self, id: TaskId) -> PersistenceFuture<'_, Task>;

    /// Move the task at the first position of `from` to `to`
    ///
    /// `to` past the end appends. Returns how many tasks were rewritten;
    /// an empty `from` rewrites nothing.
    ///
    /// # Errors
    ///
    /// - `PositionOutOfRange`: the source position does not exist
    /// - `Unavailable`, `Io`, `Serialization`: nothing was changed
    fn move_task(&self, from: BTreeSet<usize>, to: usize) -> PersistenceFuture<'_, usize>;

    /// Change stored fields of a task in place
    ///
    /// Returns the updated task.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no task has this id
    /// - `Unavailable`, `Io`, `Serialization`: nothing was changed
    fn update(&self, id: TaskId, patch: TaskPatch) -> PersistenceFuture<'_, Task>;

    /// Invert the stored completion flag of a task
    ///
    /// The flag is read and written in one commit, so toggles never depend
    /// on what a client last saw. Returns the updated task.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no task has this id
    /// - `Unavailable`, `Io`, `Serialization`: nothing was changed
    fn toggle(&self, id: TaskId) -> PersistenceFuture<'_, Task>;

    /// Remove every completed task and compact the remaining indices
    ///
    /// Returns how many tasks were removed.
    ///
    /// # Errors
    ///
    /// - `Unavailable`, `Io`, `Serialization`: nothing was changed
    fn clear_completed(&self) -> PersistenceFuture<'_, usize>;

    /// Check that storage can be reached
    ///
    /// # Errors
    ///
    /// - `Unavailable`: storage cannot be reached
    fn check_available(&self) -> PersistenceFuture<'_, ()>;
}

/// Convenience calls built on [`PersistenceService`]
pub trait PersistenceServiceExt: PersistenceService {
    /// Change stream of every task
    fn all_tasks(&self) -> PersistenceFuture<'_, TaskStream> {
        self.all(TaskFilter::All)
    }

    /// Rename a task
    fn rename(&self, id: TaskId, name: String) -> PersistenceFuture<'_, Task> {
        self.update(id, TaskPatch::rename(name))
    }

    /// Set the completion flag of a task
    fn set_completed(&self, id: TaskId, completed: bool) -> PersistenceFuture<'_, Task> {
        self.update(id, TaskPatch::completed(completed))
    }
}

impl<T> PersistenceServiceExt for T where T: PersistenceService + ?Sized {}
