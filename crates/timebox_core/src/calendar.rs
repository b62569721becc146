//! Calendar-day arithmetic and clock injection.
//!
//! # Responsibility
//! - Map instants to civil days in one configured time zone.
//! - Build day/month windows used by list queries and day buckets.
//! - Supply "now" through [`Clock`] so no engine code reads the wall clock.
//!
//! # Invariants
//! - A day window is always `[start_of_day(d), start_of_day(d + 1))`.
//! - Day boundaries honor DST transitions of the configured zone.

use jiff::civil::{Date, Time};
use jiff::tz::TimeZone;
use jiff::{Timestamp, ToSpan};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub type CalendarResult<T> = Result<T, jiff::Error>;

/// Source of the current instant.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Settable clock for tests and replays.
///
/// Clones share the same instant, so a test can keep one handle while the
/// service owns another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    millis: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now: Timestamp) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(now.as_millisecond())),
        }
    }

    pub fn set(&self, now: Timestamp) {
        self.millis.store(now.as_millisecond(), Ordering::SeqCst);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.millis.fetch_add(minutes * 60_000, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        let millis = self.millis.load(Ordering::SeqCst);
        Timestamp::from_millisecond(millis).unwrap_or(Timestamp::UNIX_EPOCH)
    }
}

/// Day arithmetic bound to one time zone.
#[derive(Debug, Clone)]
pub struct CalendarDays {
    tz: TimeZone,
}

impl CalendarDays {
    pub fn new(tz: TimeZone) -> Self {
        Self { tz }
    }

    /// Civil day containing `instant`.
    pub fn day_of(&self, instant: Timestamp) -> Date {
        instant.to_zoned(self.tz.clone()).date()
    }

    /// Local time-of-day of `instant`.
    pub fn time_of_day(&self, instant: Timestamp) -> Time {
        instant.to_zoned(self.tz.clone()).time()
    }

    pub fn start_of_day(&self, day: Date) -> CalendarResult<Timestamp> {
        Ok(day.to_zoned(self.tz.clone())?.start_of_day()?.timestamp())
    }

    pub fn next_day(&self, day: Date) -> CalendarResult<Date> {
        day.tomorrow()
    }

    /// Half-open instant window covering `day`.
    pub fn day_range(&self, day: Date) -> CalendarResult<(Timestamp, Timestamp)> {
        let start = self.start_of_day(day)?;
        let end = self.start_of_day(self.next_day(day)?)?;
        Ok((start, end))
    }

    /// Instant of `time` on `day`; gaps resolve to the later wall time.
    pub fn at_time_of_day(&self, day: Date, time: Time) -> CalendarResult<Timestamp> {
        Ok(day.to_datetime(time).to_zoned(self.tz.clone())?.timestamp())
    }

    /// `[first day of month, first day of next month)` around `anchor`.
    pub fn month_window(&self, anchor: Date) -> CalendarResult<(Date, Date)> {
        let first = anchor.first_of_month();
        let next_first = first.checked_add(1.month())?;
        Ok((first, next_first))
    }

    /// Instant window covering the month around `anchor`.
    pub fn month_range(&self, anchor: Date) -> CalendarResult<(Timestamp, Timestamp)> {
        let (first, next_first) = self.month_window(anchor)?;
        Ok((self.start_of_day(first)?, self.start_of_day(next_first)?))
    }

    /// Every day of the month around `anchor`, in order.
    pub fn days_in_month(&self, anchor: Date) -> Vec<Date> {
        let first = anchor.first_of_month();
        (0..i64::from(first.days_in_month()))
            .filter_map(|offset| first.checked_add(offset.days()).ok())
            .collect()
    }
}
