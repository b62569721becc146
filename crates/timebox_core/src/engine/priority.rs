//! Priority slot rules.
//!
//! # Responsibility
//! - Decide whether a task may take one of the exclusive symbols.
//! - Apply symbol changes as the only sanctioned writer of `priority`.
//!
//! # Invariants
//! - `!`, `!!` and `!!!` each have at most one holder among the tasks the
//!   caller passes in.
//! - The empty symbol is always assignable.

use crate::model::task::{PrioritySymbol, Task, TaskId};
use thiserror::Error;

/// Requested symbol is already held by another task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("priority symbol `{symbol}` is already held by task {holder}")]
pub struct SlotConflict {
    pub symbol: PrioritySymbol,
    pub holder: TaskId,
}

/// Entries offered by a priority picker for one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityMenu {
    /// Exclusive symbols the task may take, in menu order.
    pub symbols: Vec<PrioritySymbol>,
    /// "Clear" is offered only when the task holds a symbol.
    pub can_clear: bool,
}

/// Returns the task other than `task_id` holding `symbol`, if any.
pub fn holder_of(symbol: PrioritySymbol, task_id: TaskId, all_tasks: &[Task]) -> Option<&Task> {
    if !symbol.is_pinned() {
        return None;
    }
    all_tasks
        .iter()
        .find(|other| other.id != task_id && other.priority == symbol)
}

pub fn can_assign(task: &Task, symbol: PrioritySymbol, all_tasks: &[Task]) -> bool {
    !symbol.is_pinned()
        || task.priority == symbol
        || holder_of(symbol, task.id, all_tasks).is_none()
}

/// Sets `task.priority` when the slot is free.
///
/// The rank follows from the symbol, so symbol and rank change together.
/// `sort_index` is left as is; the task is compared within its new
/// partition from now on.
pub fn assign_priority(
    task: &mut Task,
    symbol: PrioritySymbol,
    all_tasks: &[Task],
) -> Result<(), SlotConflict> {
    if task.priority != symbol {
        if let Some(holder) = holder_of(symbol, task.id, all_tasks) {
            return Err(SlotConflict {
                symbol,
                holder: holder.id,
            });
        }
    }
    task.priority = symbol;
    Ok(())
}

pub fn available_symbols(task: &Task, all_tasks: &[Task]) -> PriorityMenu {
    let symbols = PrioritySymbol::PINNED
        .into_iter()
        .filter(|symbol| can_assign(task, *symbol, all_tasks))
        .collect();
    PriorityMenu {
        symbols,
        can_clear: task.is_pinned(),
    }
}
