#![allow(dead_code)]

use jiff::civil::{date, Date};
use jiff::tz::TimeZone;
use jiff::Timestamp;
use rusqlite::Connection;
use std::cell::RefCell;
use timebox_core::{
    CalendarSink, ManualClock, MirroredEvent, ScheduleSettings, SchedulingService, SinkError,
    SqliteTaskRepository, TaskId,
};

pub type TestService<'conn> =
    SchedulingService<SqliteTaskRepository<'conn>, RecordingSink, ManualClock>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkOp {
    Create,
    Update,
    Delete,
}

/// Calendar sink double that records calls and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: RefCell<Vec<(SinkOp, TaskId)>>,
    failing: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            failing: true,
        }
    }

    pub fn calls(&self) -> Vec<(SinkOp, TaskId)> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, op: SinkOp) -> usize {
        self.calls.borrow().iter().filter(|(seen, _)| *seen == op).count()
    }

    fn record(&self, op: SinkOp, event: &MirroredEvent) -> Result<(), SinkError> {
        self.calls.borrow_mut().push((op, event.task_id));
        if self.failing {
            return Err(SinkError::Unavailable("offline".to_string()));
        }
        Ok(())
    }
}

impl CalendarSink for RecordingSink {
    fn create_mirrored_event(&self, event: &MirroredEvent) -> Result<String, SinkError> {
        self.record(SinkOp::Create, event)?;
        Ok(format!("evt-{}", event.task_id))
    }

    fn update_mirrored_event(&self, event: &MirroredEvent) -> Result<(), SinkError> {
        self.record(SinkOp::Update, event)
    }

    fn delete_mirrored_event(&self, event: &MirroredEvent) -> Result<(), SinkError> {
        self.record(SinkOp::Delete, event)
    }
}

/// 2025-06-10 14:00 UTC.
pub fn now() -> Timestamp {
    ts("2025-06-10T14:00:00Z")
}

pub fn today() -> Date {
    date(2025, 6, 10)
}

pub fn ts(text: &str) -> Timestamp {
    text.parse().unwrap()
}

pub fn utc_settings() -> ScheduleSettings {
    ScheduleSettings {
        time_zone: TimeZone::UTC,
        search_min_chars: 3,
        in_progress_warning_threshold: 2,
    }
}

pub fn service(conn: &Connection, clock: ManualClock) -> TestService<'_> {
    service_with_sink(conn, clock, RecordingSink::default())
}

pub fn service_with_sink(conn: &Connection, clock: ManualClock, sink: RecordingSink) -> TestService<'_> {
    let repo = SqliteTaskRepository::try_new(conn).unwrap();
    SchedulingService::new(repo, sink, clock, utc_settings())
}
