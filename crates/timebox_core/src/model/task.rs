//! Task domain model.
//!
//! # Responsibility
//! - Define the canonical task record shared by every list/calendar view.
//! - Provide closed variants for status, priority symbol and time allocation.
//!
//! # Invariants
//! - `id` is stable and never reused for another task.
//! - `title` is non-empty after trimming.
//! - Priority rank is never stored on the record; it is always derived from
//!   the symbol through [`PrioritySymbol::rank`].
//! - `end_time` is not earlier than `start_time` when both are set.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Stable identifier for one task record.
pub type TaskId = Uuid;

/// Rank shared by every task without a priority symbol.
pub const UNPINNED_RANK: u8 = 3;

/// Validation failures for task records and user-supplied field values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskValidationError {
    #[error("task title must not be blank")]
    EmptyTitle,
    #[error("unsupported priority symbol `{0}`; expected one of \"\", \"!\", \"!!\", \"!!!\"")]
    InvalidPrioritySymbol(String),
    #[error("unsupported time allocation {0}h; expected 0, 0.25, 0.5, 1, 2 or 3")]
    InvalidTimeAllocation(f64),
    #[error("task end time must not be earlier than start time")]
    EndBeforeStart,
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// No status chosen yet (also the result of "clear status").
    #[default]
    Unset,
    InProgress,
    Done,
    /// Pushed to a later day; hidden from that day's today-list.
    Postponed,
}

impl TaskStatus {
    pub fn is_done(self) -> bool {
        self == Self::Done
    }
}

/// One of the three exclusive priority slots, or no priority.
///
/// Pinned symbols (`!`, `!!`, `!!!`) have a single holder at a time; the
/// empty symbol can be held by any number of tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrioritySymbol {
    #[default]
    None,
    First,
    Second,
    Third,
}

impl PrioritySymbol {
    /// The three exclusive symbols in menu order.
    pub const PINNED: [PrioritySymbol; 3] = [Self::First, Self::Second, Self::Third];

    /// Canonical rank: `!` -> 0, `!!` -> 1, `!!!` -> 2, none -> 3.
    pub fn rank(self) -> u8 {
        match self {
            Self::First => 0,
            Self::Second => 1,
            Self::Third => 2,
            Self::None => UNPINNED_RANK,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "",
            Self::First => "!",
            Self::Second => "!!",
            Self::Third => "!!!",
        }
    }

    pub fn is_pinned(self) -> bool {
        self != Self::None
    }
}

impl FromStr for PrioritySymbol {
    type Err = TaskValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" => Ok(Self::None),
            "!" => Ok(Self::First),
            "!!" => Ok(Self::Second),
            "!!!" => Ok(Self::Third),
            other => Err(TaskValidationError::InvalidPrioritySymbol(other.to_string())),
        }
    }
}

impl Display for PrioritySymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Planned effort for one task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeAllocation {
    #[default]
    Unset,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    ThreeHours,
}

impl TimeAllocation {
    /// Selectable allocations, shortest first.
    pub const OPTIONS: [TimeAllocation; 5] = [
        Self::FifteenMinutes,
        Self::ThirtyMinutes,
        Self::OneHour,
        Self::TwoHours,
        Self::ThreeHours,
    ];

    pub fn hours(self) -> f64 {
        match self {
            Self::Unset => 0.0,
            Self::FifteenMinutes => 0.25,
            Self::ThirtyMinutes => 0.5,
            Self::OneHour => 1.0,
            Self::TwoHours => 2.0,
            Self::ThreeHours => 3.0,
        }
    }

    /// Whole milliseconds covered by this allocation.
    pub fn millis(self) -> i64 {
        (self.hours() * 3_600_000.0) as i64
    }

    /// Maps an hour value back to its allocation.
    ///
    /// Only the enumerated values are accepted; anything else is a
    /// validation error instead of being rounded.
    pub fn from_hours(hours: f64) -> Result<Self, TaskValidationError> {
        if hours == 0.0 {
            return Ok(Self::Unset);
        }
        Self::OPTIONS
            .into_iter()
            .find(|option| option.hours() == hours)
            .ok_or(TaskValidationError::InvalidTimeAllocation(hours))
    }

    /// Short label used by pickers, e.g. `15m` or `2h`.
    pub fn label(self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::FifteenMinutes => "15m",
            Self::ThirtyMinutes => "30m",
            Self::OneHour => "1h",
            Self::TwoHours => "2h",
            Self::ThreeHours => "3h",
        }
    }
}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: String,
    /// Required before the task may move from InProgress to Done.
    pub resolution_note: String,
    pub status: TaskStatus,
    pub priority: PrioritySymbol,
    /// Order within the task's partition (pinned or unpinned) of its day list.
    pub sort_index: i64,
    pub start_time: Option<Timestamp>,
    pub end_time: Option<Timestamp>,
    pub time_allocated: TimeAllocation,
    /// Recorded on every transition into InProgress; kept as history otherwise.
    pub in_progress_start_time: Option<Timestamp>,
    pub postpone_date: Option<Timestamp>,
    pub postpone_reason: Option<String>,
    /// Handle of the mirrored external calendar event, if one was created.
    pub external_event_ref: Option<String>,
    pub created_at: Timestamp,
}

impl Task {
    /// Creates an unset, unpinned task.
    ///
    /// The title is trimmed; a blank title is rejected before anything else
    /// is built. `sort_index` starts at 0 and is placed by the caller.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        start_time: Option<Timestamp>,
        created_at: Timestamp,
    ) -> Result<Self, TaskValidationError> {
        Self::with_id(Uuid::new_v4(), title, description, start_time, created_at)
    }

    /// Creates a task with a caller-provided stable ID.
    pub fn with_id(
        id: TaskId,
        title: impl Into<String>,
        description: impl Into<String>,
        start_time: Option<Timestamp>,
        created_at: Timestamp,
    ) -> Result<Self, TaskValidationError> {
        let title = normalize_title(title.into())?;
        Ok(Self {
            id,
            title,
            description: description.into(),
            resolution_note: String::new(),
            status: TaskStatus::Unset,
            priority: PrioritySymbol::None,
            sort_index: 0,
            start_time,
            end_time: None,
            time_allocated: TimeAllocation::Unset,
            in_progress_start_time: None,
            postpone_date: None,
            postpone_reason: None,
            external_event_ref: None,
            created_at,
        })
    }

    /// Derived rank, always in sync with `priority`.
    pub fn priority_rank(&self) -> u8 {
        self.priority.rank()
    }

    /// Pinned tasks hold one of the exclusive priority symbols.
    pub fn is_pinned(&self) -> bool {
        self.priority.is_pinned()
    }

    pub fn is_done(&self) -> bool {
        self.status.is_done()
    }

    pub fn has_resolution(&self) -> bool {
        !self.resolution_note.trim().is_empty()
    }

    /// Moves `start_time` to `new_start`, carrying `end_time` along so the
    /// planned window keeps its length.
    pub fn shift_start_to(&mut self, new_start: Timestamp) -> Result<(), jiff::Error> {
        self.end_time = match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                let length_ms = end.as_millisecond() - start.as_millisecond();
                Some(Timestamp::from_millisecond(
                    new_start.as_millisecond() + length_ms,
                )?)
            }
            (None, Some(end)) if end < new_start => None,
            (_, end) => end,
        };
        self.start_time = Some(new_start);
        Ok(())
    }

    /// Checks record-level invariants before persistence.
    pub fn validate(&self) -> Result<(), TaskValidationError> {
        if self.title.trim().is_empty() {
            return Err(TaskValidationError::EmptyTitle);
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start {
                return Err(TaskValidationError::EndBeforeStart);
            }
        }
        Ok(())
    }
}

/// Trims a title and rejects blank input.
pub fn normalize_title(value: String) -> Result<String, TaskValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    Ok(trimmed.to_string())
}
