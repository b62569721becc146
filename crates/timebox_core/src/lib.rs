//! Core scheduling logic for Timebox.
//! This crate is the single source of truth for task ordering, priority
//! slots, status transitions and day buckets.

pub mod calendar;
pub mod config;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod sync;

pub use calendar::{CalendarDays, Clock, ManualClock, SystemClock};
pub use config::{ConfigError, TimeboxConfig};
pub use db::{open_db, open_db_in_memory, DbError};
pub use engine::ordering::{MoveOutcome, MoveRejection};
pub use engine::priority::{PriorityMenu, SlotConflict};
pub use engine::status::{CompletionEvent, StatusChange};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::task::{PrioritySymbol, Task, TaskId, TaskStatus, TaskValidationError, TimeAllocation};
pub use repo::task_repo::{RepoError, RepoResult, SqliteTaskRepository, TaskQuery, TaskRepository};
pub use service::schedule_service::{
    InProgressWarning, RescheduleOutcome, ScheduleError, ScheduleResult, ScheduleSettings,
    SchedulingService, TaskDetails,
};
pub use sync::calendar_sink::{CalendarSink, MirroredEvent, NullCalendarSink, SinkError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
