//! External calendar mirror contract.
//!
//! # Responsibility
//! - Describe the notify-only sink that mirrors task title and time window.
//! - Derive the mirrored window from a task snapshot.
//!
//! # Invariants
//! - Sink calls never change task state except storing the returned ref.
//! - Sink errors are reported to the caller, who logs and continues.

use crate::model::task::{Task, TaskId};
use jiff::Timestamp;
use thiserror::Error;

/// Failure reported by a calendar sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("calendar access denied")]
    AccessDenied,
    #[error("mirrored event not found: {0}")]
    EventNotFound(String),
    #[error("calendar sink unavailable: {0}")]
    Unavailable(String),
}

/// Title and time window pushed to the external calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirroredEvent {
    pub task_id: TaskId,
    pub external_ref: Option<String>,
    pub title: String,
    pub start: Timestamp,
    pub end: Timestamp,
}

impl MirroredEvent {
    /// Builds the mirrored window for `task`.
    ///
    /// Start falls back to `now` for undated tasks. End falls back to
    /// `start + time_allocated`, which is a point event when unset.
    pub fn from_task(task: &Task, now: Timestamp) -> Self {
        let start = task.start_time.unwrap_or(now);
        let end = task.end_time.unwrap_or_else(|| {
            Timestamp::from_millisecond(start.as_millisecond() + task.time_allocated.millis())
                .unwrap_or(start)
        });
        Self {
            task_id: task.id,
            external_ref: task.external_event_ref.clone(),
            title: task.title.clone(),
            start,
            end: end.max(start),
        }
    }
}

/// Notify-only mirror of tasks into an external calendar.
pub trait CalendarSink {
    /// Creates the mirrored event and returns its external handle.
    fn create_mirrored_event(&self, event: &MirroredEvent) -> Result<String, SinkError>;
    fn update_mirrored_event(&self, event: &MirroredEvent) -> Result<(), SinkError>;
    fn delete_mirrored_event(&self, event: &MirroredEvent) -> Result<(), SinkError>;
}

/// Sink for setups without an external calendar.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCalendarSink;

impl CalendarSink for NullCalendarSink {
    fn create_mirrored_event(&self, event: &MirroredEvent) -> Result<String, SinkError> {
        Ok(format!("local:{}", event.task_id))
    }

    fn update_mirrored_event(&self, _event: &MirroredEvent) -> Result<(), SinkError> {
        Ok(())
    }

    fn delete_mirrored_event(&self, _event: &MirroredEvent) -> Result<(), SinkError> {
        Ok(())
    }
}
