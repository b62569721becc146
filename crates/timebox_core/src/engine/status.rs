//! Task lifecycle transitions.
//!
//! # Responsibility
//! - Apply start/complete/postpone/clear to one task snapshot.
//! - Gate completion on a resolution note.
//! - Push postpone targets to a later calendar day.
//! - Produce the one-shot completion event.
//!
//! # Invariants
//! - Status and its companion fields change together or not at all.
//! - A postponed task's `postpone_date` is at or after the start of the day
//!   after the transition.
//! - Clearing status keeps `in_progress_start_time` and postpone history.

use crate::calendar::{CalendarDays, CalendarResult};
use crate::model::task::{Task, TaskId, TaskStatus};
use jiff::Timestamp;
use thiserror::Error;

/// Requested lifecycle change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    Start,
    Complete,
    Postpone { target: Timestamp, reason: String },
    Clear,
}

impl StatusChange {
    pub fn target_status(&self) -> TaskStatus {
        match self {
            Self::Start => TaskStatus::InProgress,
            Self::Complete => TaskStatus::Done,
            Self::Postpone { .. } => TaskStatus::Postponed,
            Self::Clear => TaskStatus::Unset,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransitionError {
    /// InProgress -> Done needs a non-blank resolution note first.
    #[error("task {0} needs a resolution note before it can be marked done")]
    ResolutionRequired(TaskId),
    #[error("calendar arithmetic failed: {0}")]
    Calendar(#[from] jiff::Error),
}

/// Emitted once when an in-progress task is finished after using at least
/// its allotted time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub task_id: TaskId,
    pub title: String,
    pub within_allotted_time: bool,
}

/// Applies `change` to `task`.
///
/// Validation happens before any field is written, so a refused transition
/// leaves the task untouched.
pub fn apply_status(
    task: &mut Task,
    change: StatusChange,
    now: Timestamp,
    days: &CalendarDays,
) -> Result<Option<CompletionEvent>, TransitionError> {
    match change {
        StatusChange::Start => {
            if task.status != TaskStatus::InProgress {
                task.status = TaskStatus::InProgress;
                task.in_progress_start_time = Some(now);
            }
            Ok(None)
        }
        StatusChange::Complete => complete(task, now),
        StatusChange::Postpone { target, reason } => {
            let target = postpone_target(target, now, days)?;
            task.shift_start_to(target)?;
            task.status = TaskStatus::Postponed;
            task.postpone_date = Some(target);
            task.postpone_reason = Some(reason);
            Ok(None)
        }
        StatusChange::Clear => {
            task.status = TaskStatus::Unset;
            Ok(None)
        }
    }
}

fn complete(task: &mut Task, now: Timestamp) -> Result<Option<CompletionEvent>, TransitionError> {
    match task.status {
        TaskStatus::Done => Ok(None),
        TaskStatus::InProgress => {
            if !task.has_resolution() {
                return Err(TransitionError::ResolutionRequired(task.id));
            }
            task.status = TaskStatus::Done;
            Ok(completion_event(task, now))
        }
        TaskStatus::Unset | TaskStatus::Postponed => {
            task.status = TaskStatus::Done;
            Ok(None)
        }
    }
}

fn completion_event(task: &Task, now: Timestamp) -> Option<CompletionEvent> {
    let started = task.in_progress_start_time?;
    let elapsed_hours = (now.as_millisecond() - started.as_millisecond()) as f64 / 3_600_000.0;
    if elapsed_hours < task.time_allocated.hours() {
        return None;
    }
    Some(CompletionEvent {
        task_id: task.id,
        title: task.title.clone(),
        within_allotted_time: true,
    })
}

/// Resolves the instant a postponed task lands on.
///
/// A target before the start of tomorrow moves to tomorrow at the target's
/// local time-of-day; later targets are kept.
pub fn postpone_target(
    target: Timestamp,
    now: Timestamp,
    days: &CalendarDays,
) -> CalendarResult<Timestamp> {
    let tomorrow = days.next_day(days.day_of(now))?;
    if target >= days.start_of_day(tomorrow)? {
        return Ok(target);
    }
    let moved = days.at_time_of_day(tomorrow, days.time_of_day(target))?;
    // A DST gap can resolve to an instant earlier than midnight's successor.
    Ok(moved.max(days.start_of_day(tomorrow)?))
}
