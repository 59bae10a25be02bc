//! Index reconciliation for the ordered task list.
//!
//! Every function here is pure. Given an index-ordered list it plans which
//! tasks must be rewritten with which index so the list stays contiguous
//! (`0..len`) after an insert, delete or move. Storage applies a plan inside
//! one transaction.

use crate::persistence::PersistenceError;
use crate::types::{Task, TaskId};
use std::collections::{BTreeSet, HashMap};

/// One index rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexWrite {
    /// The task to rewrite
    pub id: TaskId,
    /// Its new index
    pub index: usize,
}

/// Removal of one task and the shifts it causes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePlan {
    /// Index of the removed task
    pub position: usize,
    /// Rewrites of every task that was behind it
    pub writes: Vec<IndexWrite>,
}

/// Removal of every completed task and the compaction it causes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearPlan {
    /// Removed tasks, in index order
    pub removed: Vec<TaskId>,
    /// Rewrites of the survivors whose index changed
    pub writes: Vec<IndexWrite>,
}

/// Whether the indices of `tasks` are exactly `0..len`, in any order
#[must_use]
pub fn is_contiguous(tasks: &[Task]) -> bool {
    let mut indices: Vec<usize> = tasks.iter().map(|task| task.index).collect();
    indices.sort_unstable();
    indices.iter().enumerate().all(|(position, index)| position == *index)
}

/// The index a newly added task gets
#[must_use]
pub const fn next_index(tasks: &[Task]) -> usize {
    tasks.len()
}

/// Sort by index and renumber `0..len`
///
/// Ties keep their relative order. Returns how many tasks changed index.
pub fn normalize(tasks: &mut [Task]) -> usize {
    tasks.sort_by_key(|task| task.index);
    let mut repaired = 0;
    for (position, task) in tasks.iter_mut().enumerate() {
        if task.index != position {
            task.index = position;
            repaired += 1;
        }
    }
    repaired
}

/// A normalized copy of `tasks`
#[must_use]
pub fn normalized(tasks: &[Task]) -> Vec<Task> {
    let mut copy = tasks.to_vec();
    normalize(&mut copy);
    copy
}

/// Plan moving the task at the first source position to `to`
///
/// `tasks` must be ordered by index. Only the first element of `from` is
/// used; an empty set plans nothing. A destination at or past the end of
/// the shortened list appends. Only tasks whose position changes are
/// rewritten.
///
/// # Errors
///
/// Returns [`PersistenceError::PositionOutOfRange`] if the source position
/// does not exist.
pub fn plan_move(tasks: &[Task], from: &BTreeSet<usize>, to: usize) -> Result<Vec<IndexWrite>, PersistenceError> {
    let Some(&source) = from.first() else {
        return Ok(Vec::new());
    };
    if source >= tasks.len() {
        return Err(PersistenceError::PositionOutOfRange {
            position: source,
            len: tasks.len(),
        });
    }

    let mut proxy: Vec<(usize, TaskId)> = tasks.iter().map(|task| (task.index, task.id)).collect();
    let moved = proxy.remove(source);
    if to < proxy.len() {
        proxy.insert(to, moved);
    } else {
        proxy.push(moved);
    }

    Ok(proxy
        .into_iter()
        .enumerate()
        .filter(|(position, (index, _))| position != index)
        .map(|(position, (_, id))| IndexWrite { id, index: position })
        .collect())
}

/// Plan removing the task `id`
///
/// `tasks` must be contiguous. Returns `None` if no task has this id.
#[must_use]
pub fn plan_delete(tasks: &[Task], id: TaskId) -> Option<DeletePlan> {
    let position = tasks.iter().find(|task| task.id == id)?.index;
    let writes = tasks
        .iter()
        .filter(|task| task.index > position)
        .map(|task| IndexWrite {
            id: task.id,
            index: task.index - 1,
        })
        .collect();
    Some(DeletePlan { position, writes })
}

/// Plan removing every completed task
///
/// `tasks` must be ordered by index.
#[must_use]
pub fn plan_clear_completed(tasks: &[Task]) -> ClearPlan {
    let mut plan = ClearPlan::default();
    let mut next = 0;
    for task in tasks {
        if task.completed {
            plan.removed.push(task.id);
        } else {
            if task.index != next {
                plan.writes.push(IndexWrite {
                    id: task.id,
                    index: next,
                });
            }
            next += 1;
        }
    }
    plan
}

/// Apply index rewrites and restore index order
pub fn apply_writes(tasks: &mut [Task], writes: &[IndexWrite]) {
    if writes.is_empty() {
        return;
    }
    let targets: HashMap<TaskId, usize> = writes.iter().map(|write| (write.id, write.index)).collect();
    for task in tasks.iter_mut() {
        if let Some(index) = targets.get(&task.id) {
            task.index = *index;
        }
    }
    tasks.sort_by_key(|task| task.index);
}
