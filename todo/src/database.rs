//! In-memory task storage with an optional JSON data file.
//!
//! All writes go through one `tokio::sync::Mutex`: each operation computes
//! the next list from a normalized copy, writes the data file if one is
//! configured, and only then swaps the list in and publishes it on a
//! `watch` channel. Change streams read from that channel, so they only
//! ever see committed, contiguous lists.
//!
//! A list loaded from disk is taken as-is. If its indices are not
//! contiguous the problem is logged, hidden from change streams, and
//! written back repaired by the next committing write.

use crate::actions::TaskPatch;
use crate::persistence::{PersistenceError, PersistenceFuture, PersistenceService, TaskFilter, TaskStream};
use crate::reconcile;
use crate::types::{Task, TaskId};
use rexlist_core::environment::{IdGenerator, UuidGenerator};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{broadcast, watch, Mutex};

/// Ordered task storage
///
/// Cheap to clone; clones share the same tasks.
#[derive(Clone)]
pub struct TaskDatabase {
    inner: Arc<Inner>,
}

struct Inner {
    tasks: Mutex<Vec<Task>>,
    changes: watch::Sender<Arc<Vec<Task>>>,
    faults: broadcast::Sender<String>,
    ids: Arc<dyn IdGenerator>,
    data_file: Option<PathBuf>,
    available: AtomicBool,
}

enum Wake {
    Changed,
    Closed,
    Fault(String),
}

impl TaskDatabase {
    /// Empty storage kept in memory only
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_tasks(Arc::new(UuidGenerator), Vec::new(), None)
    }

    /// Storage seeded with `tasks`, allocating ids with `ids`
    ///
    /// With `data_file` set, every commit is also written there.
    #[must_use]
    pub fn with_tasks(ids: Arc<dyn IdGenerator>, tasks: Vec<Task>, data_file: Option<PathBuf>) -> Self {
        if !reconcile::is_contiguous(&tasks) {
            tracing::warn!(tasks = tasks.len(), "Stored task indices are not contiguous; repairing on next write");
        }
        let published = Arc::new(reconcile::normalized(&tasks));
        let (changes, _) = watch::channel(published);
        let (faults, _) = broadcast::channel(4);

        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(tasks),
                changes,
                faults,
                ids,
                data_file,
                available: AtomicBool::new(true),
            }),
        }
    }

    /// Storage backed by the JSON file at `path`
    ///
    /// A missing file starts an empty list; the file is created on the
    /// first write.
    ///
    /// # Errors
    ///
    /// - `Io`: the file exists but cannot be read
    /// - `Serialization`: the file is not a JSON array of tasks
    pub async fn open(path: impl AsRef<Path>, ids: Arc<dyn IdGenerator>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let tasks = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<Task>>(&bytes)?,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(error) => return Err(error.into()),
        };
        tracing::info!(path = %path.display(), tasks = tasks.len(), "Opened task database");
        Ok(Self::with_tasks(ids, tasks, Some(path)))
    }

    /// Take storage offline or bring it back
    ///
    /// While offline every operation fails with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    /// End every open change stream with an error
    ///
    /// Streams opened afterwards are unaffected.
    pub fn interrupt_streams(&self, reason: impl Into<String>) {
        let _ = self.inner.faults.send(reason.into());
    }

    /// The committed list, ordered by index
    pub async fn snapshot(&self) -> Vec<Task> {
        reconcile::normalized(&self.inner.tasks.lock().await)
    }

    fn ensure_available(&self) -> Result<(), PersistenceError> {
        if self.inner.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PersistenceError::Unavailable("task database is offline".to_string()))
        }
    }

    /// A repaired working copy of the stored list
    fn working_copy(stored: &[Task]) -> Vec<Task> {
        let mut next = stored.to_vec();
        let repaired = reconcile::normalize(&mut next);
        if repaired > 0 {
            tracing::warn!(repaired, "Repaired non-contiguous task indices");
            metrics::counter!("persistence.repairs").increment(1);
        }
        next
    }

    /// Persist `next`, swap it in and publish it
    async fn commit(&self, stored: &mut Vec<Task>, next: Vec<Task>) -> Result<(), PersistenceError> {
        if let Some(path) = &self.inner.data_file {
            write_file(path, &next).await?;
        }
        let published = Arc::new(next.clone());
        *stored = next;
        self.inner.changes.send_replace(published);
        Ok(())
    }

    async fn add_task(&self, name: String) -> Result<Task, PersistenceError> {
        self.ensure_available()?;
        let mut stored = self.inner.tasks.lock().await;
        let mut next = Self::working_copy(&stored);

        let task = Task::new(
            TaskId::from_uuid(self.inner.ids.next_id()),
            reconcile::next_index(&next),
            name,
        );
        next.push(task.clone());

        self.commit(&mut stored, next).await?;
        tracing::debug!(id = %task.id, index = task.index, "Task added");
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> Result<Task, PersistenceError> {
        self.ensure_available()?;
        let mut stored = self.inner.tasks.lock().await;
        let mut next = Self::working_copy(&stored);

        let plan = reconcile::plan_delete(&next, id).ok_or(PersistenceError::NotFound(id))?;
        let removed = next.remove(plan.position);
        reconcile::apply_writes(&mut next, &plan.writes);

        self.commit(&mut stored, next).await?;
        tracing::debug!(%id, shifted = plan.writes.len(), "Task deleted");
        Ok(removed)
    }

    async fn move_tasks(&self, from: BTreeSet<usize>, to: usize) -> Result<usize, PersistenceError> {
        self.ensure_available()?;
        let mut stored = self.inner.tasks.lock().await;
        let mut next = Self::working_copy(&stored);

        let writes = reconcile::plan_move(&next, &from, to)?;
        if writes.is_empty() && next == *stored {
            return Ok(0);
        }
        reconcile::apply_writes(&mut next, &writes);

        self.commit(&mut stored, next).await?;
        tracing::debug!(?from, to, written = writes.len(), "Task moved");
        Ok(writes.len())
    }

    /// Change one task in place, reading it under the write lock
    async fn modify_task<F>(&self, id: TaskId, change: F) -> Result<Task, PersistenceError>
    where
        F: FnOnce(&mut Task) + Send,
    {
        self.ensure_available()?;
        let mut stored = self.inner.tasks.lock().await;
        let mut next = Self::working_copy(&stored);

        let task = next
            .iter_mut()
            .find(|task| task.id == id)
            .ok_or(PersistenceError::NotFound(id))?;
        change(task);
        let updated = task.clone();

        self.commit(&mut stored, next).await?;
        Ok(updated)
    }

    async fn update_task(&self, id: TaskId, patch: TaskPatch) -> Result<Task, PersistenceError> {
        let updated = self.modify_task(id, |task| patch.apply(task)).await?;
        tracing::debug!(%id, "Task updated");
        Ok(updated)
    }

    async fn toggle_task(&self, id: TaskId) -> Result<Task, PersistenceError> {
        let updated = self.modify_task(id, |task| task.completed = !task.completed).await?;
        tracing::debug!(%id, completed = updated.completed, "Task toggled");
        Ok(updated)
    }

    async fn clear_completed_tasks(&self) -> Result<usize, PersistenceError> {
        self.ensure_available()?;
        let mut stored = self.inner.tasks.lock().await;
        let mut next = Self::working_copy(&stored);

        let plan = reconcile::plan_clear_completed(&next);
        if plan.removed.is_empty() && next == *stored {
            return Ok(0);
        }
        next.retain(|task| !task.completed);
        reconcile::apply_writes(&mut next, &plan.writes);

        self.commit(&mut stored, next).await?;
        tracing::debug!(removed = plan.removed.len(), "Completed tasks cleared");
        Ok(plan.removed.len())
    }

    fn open_stream(&self, filter: TaskFilter) -> Result<TaskStream, PersistenceError> {
        self.ensure_available()?;
        let mut changes = self.inner.changes.subscribe();
        let mut faults = self.inner.faults.subscribe();

        let stream = async_stream::stream! {
            loop {
                let tasks = Arc::clone(&changes.borrow_and_update());
                yield Ok(filter.apply(&tasks));

                let wake = tokio::select! {
                    changed = changes.changed() => {
                        if changed.is_ok() { Wake::Changed } else { Wake::Closed }
                    },
                    fault = faults.recv() => match fault {
                        Ok(reason) => Wake::Fault(reason),
                        Err(broadcast::error::RecvError::Lagged(_)) => Wake::Changed,
                        Err(broadcast::error::RecvError::Closed) => Wake::Closed,
                    },
                };

                match wake {
                    Wake::Changed => {},
                    Wake::Closed => {
                        yield Err(PersistenceError::StreamClosed);
                        break;
                    },
                    Wake::Fault(reason) => {
                        yield Err(PersistenceError::StreamFailed(reason));
                        break;
                    },
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

impl Default for TaskDatabase {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for TaskDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDatabase")
            .field("data_file", &self.inner.data_file)
            .field("available", &self.inner.available.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Write `tasks` next to `path` and rename over it
async fn write_file(path: &Path, tasks: &[Task]) -> Result<(), PersistenceError> {
    let bytes = serde_json::to_vec_pretty(tasks)?;
    let mut staging = path.as_os_str().to_owned();
    staging.push(".tmp");
    let staging = PathBuf::from(staging);

    tokio::fs::write(&staging, bytes).await?;
    tokio::fs::rename(&staging, path).await?;
    Ok(())
}

impl PersistenceService for TaskDatabase {
    fn all(&self, filter: TaskFilter) -> PersistenceFuture<'_, TaskStream> {
        Box::pin(async move { self.open_stream(filter) })
    }

    fn add(&self, name: String) -> PersistenceFuture<'_, Task> {
        Box::pin(self.add_task(name))
    }

    fn delete(&self, id: TaskId) -> PersistenceFuture<'_, Task> {
        Box::pin(self.delete_task(id))
    }

    fn move_task(&self, from: BTreeSet<usize>, to: usize) -> PersistenceFuture<'_, usize> {
        Box::pin(self.move_tasks(from, to))
    }

    fn update(&self, id: TaskId, patch: TaskPatch) -> PersistenceFuture<'_, Task> {
        Box::pin(self.update_task(id, patch))
    }

    fn toggle(&self, id: TaskId) -> PersistenceFuture<'_, Task> {
        Box::pin(self.toggle_task(id))
    }

    fn clear_completed(&self) -> PersistenceFuture<'_, usize> {
        Box::pin(self.clear_completed_tasks())
    }

    fn check_available(&self) -> PersistenceFuture<'_, ()> {
        Box::pin(async move { self.ensure_available() })
    }
}
