//! List ordering rules.
//!
//! # Responsibility
//! - Split a day list into the pinned and unpinned partitions.
//! - Apply drag moves to the unpinned partition and renumber it densely.
//! - Provide the done-last display ordering used by list views.
//!
//! # Invariants
//! - Pinned tasks (rank < 3) always precede unpinned tasks.
//! - After a move or renumber, the partition's `sort_index` values are
//!   exactly `0..n`.
//! - Moves never touch the pinned partition.

use crate::model::task::Task;
use std::collections::BTreeSet;

/// One day list split by partition, each side in partition order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitioned {
    /// Sorted by rank, then `sort_index`.
    pub pinned: Vec<Task>,
    /// Sorted by `sort_index`.
    pub unpinned: Vec<Task>,
}

impl Partitioned {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let (mut pinned, mut unpinned): (Vec<Task>, Vec<Task>) =
            tasks.into_iter().partition(Task::is_pinned);
        pinned.sort_by_key(|task| (task.priority_rank(), task.sort_index, task.id));
        unpinned.sort_by_key(|task| (task.sort_index, task.id));
        Self { pinned, unpinned }
    }

    /// Pinned partition followed by the unpinned partition.
    pub fn combined(self) -> Vec<Task> {
        let mut combined = self.pinned;
        combined.extend(self.unpinned);
        combined
    }
}

/// Why a drag move was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    /// A source or the destination lies inside the pinned region.
    PinnedRegion,
    /// A source or the destination lies past the end of the list.
    OutOfRange,
}

/// Result of [`move_within_partition`].
#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    /// No state changed.
    Rejected(MoveRejection),
    Reordered {
        /// Full list in combined order after the move.
        ordered: Vec<Task>,
        /// Unpinned tasks whose `sort_index` changed; persist these as one batch.
        changed: Vec<Task>,
    },
}

/// Moves the tasks at `source_indices` to `destination`.
///
/// Indices address the combined order (pinned first). The dragged tasks are
/// taken out, then inserted at `destination` in their original relative
/// order; a destination past the remaining tasks lands at the end.
pub fn move_within_partition(
    tasks: Vec<Task>,
    source_indices: &[usize],
    destination: usize,
) -> MoveOutcome {
    let Partitioned {
        pinned,
        mut unpinned,
    } = Partitioned::from_tasks(tasks);
    let pinned_count = pinned.len();
    let total = pinned_count + unpinned.len();

    let sources: BTreeSet<usize> = source_indices.iter().copied().collect();
    if sources.iter().any(|index| *index >= total) || destination > total {
        return MoveOutcome::Rejected(MoveRejection::OutOfRange);
    }
    if sources.iter().any(|index| *index < pinned_count) || destination < pinned_count {
        return MoveOutcome::Rejected(MoveRejection::PinnedRegion);
    }

    let previous: Vec<i64> = unpinned.iter().map(|task| task.sort_index).collect();
    let previous_ids: Vec<_> = unpinned.iter().map(|task| task.id).collect();

    let mut dragged = Vec::with_capacity(sources.len());
    for relative in sources.iter().rev().map(|index| index - pinned_count) {
        dragged.push(unpinned.remove(relative));
    }
    dragged.reverse();

    let target = (destination - pinned_count).min(unpinned.len());
    unpinned.splice(target..target, dragged);

    renumber_dense(&mut unpinned);
    let changed = unpinned
        .iter()
        .filter(|task| {
            previous_ids
                .iter()
                .position(|id| *id == task.id)
                .map(|slot| previous[slot] != task.sort_index)
                .unwrap_or(true)
        })
        .cloned()
        .collect();

    MoveOutcome::Reordered {
        ordered: Partitioned { pinned, unpinned }.combined(),
        changed,
    }
}

/// Assigns `sort_index = 0..n` in slice order.
///
/// Returns clones of the tasks whose index changed.
pub fn renumber_dense(tasks: &mut [Task]) -> Vec<Task> {
    let mut changed = Vec::new();
    for (index, task) in tasks.iter_mut().enumerate() {
        let index = index as i64;
        if task.sort_index != index {
            task.sort_index = index;
            changed.push(task.clone());
        }
    }
    changed
}

/// Index that places a new task at the bottom of the unpinned partition.
pub fn next_unpinned_index(tasks: &[Task]) -> i64 {
    next_partition_index(tasks, false)
}

/// One past the highest `sort_index` in the chosen partition of `tasks`.
pub fn next_partition_index(tasks: &[Task], pinned: bool) -> i64 {
    tasks
        .iter()
        .filter(|task| task.is_pinned() == pinned)
        .map(|task| task.sort_index)
        .max()
        .map_or(0, |max| max + 1)
}

/// Sorts for display: unfinished first, then rank, then `sort_index`.
///
/// Done-ness is a display key only; partitions and indices are untouched.
pub fn sort_for_display(tasks: &mut [Task]) {
    tasks.sort_by_key(|task| {
        (
            task.is_done(),
            task.priority_rank(),
            task.sort_index,
            task.id,
        )
    });
}
