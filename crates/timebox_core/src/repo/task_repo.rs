//! Task repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert/update/delete/get over the canonical `tasks` table.
//! - Evaluate compound AND predicates ([`TaskQuery`]) for list views.
//! - Own the persisted string forms of status and priority symbol.
//!
//! # Invariants
//! - Write paths call `Task::validate()` before SQL mutations.
//! - `save_batch` changes every row or none.
//! - Read paths reject invalid persisted state instead of masking it.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::task::{
    PrioritySymbol, Task, TaskId, TaskStatus, TaskValidationError, TimeAllocation, UNPINNED_RANK,
};

const UNPINNED_RANK_SQL: i64 = UNPINNED_RANK as i64;
use jiff::Timestamp;
use log::debug;
use regex::{Regex, RegexBuilder};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row, Transaction, TransactionBehavior};
use thiserror::Error;
use uuid::Uuid;

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    description,
    resolution_note,
    status,
    priority_symbol,
    priority_rank,
    sort_index,
    start_time,
    end_time,
    time_allocated,
    in_progress_start_time,
    postpone_date,
    postpone_reason,
    external_event_ref,
    created_at
FROM tasks";

const REQUIRED_COLUMNS: [&str; 17] = [
    "uuid",
    "title",
    "description",
    "resolution_note",
    "status",
    "priority_symbol",
    "priority_rank",
    "sort_index",
    "start_time",
    "end_time",
    "time_allocated",
    "in_progress_start_time",
    "postpone_date",
    "postpone_reason",
    "external_event_ref",
    "created_at",
    "updated_at",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for task persistence and query operations.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("{0}")]
    Validation(#[from] TaskValidationError),
    #[error("{0}")]
    Db(#[from] DbError),
    #[error("task not found: {0}")]
    NotFound(TaskId),
    #[error("invalid persisted task data: {0}")]
    InvalidData(String),
    #[error("invalid task query: {0}")]
    InvalidQuery(String),
    #[error("task repository requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("task repository requires column `{0}` in table `tasks`")]
    MissingRequiredColumn(&'static str),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Compound AND predicate over task fields.
///
/// Unset fields do not constrain the result. `start_from`/`start_before`
/// form the half-open range `[start_from, start_before)`; tasks without a
/// start time never match a range bound.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    pub start_from: Option<Timestamp>,
    pub start_before: Option<Timestamp>,
    pub status_is: Option<TaskStatus>,
    pub status_not: Option<TaskStatus>,
    /// `Some(true)`: rank < 3 only. `Some(false)`: rank == 3 only.
    pub pinned: Option<bool>,
    /// Case-insensitive substring on title OR description.
    pub text_contains: Option<String>,
    pub require_start_time: bool,
}

impl TaskQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn starting_in(mut self, from: Timestamp, before: Timestamp) -> Self {
        self.start_from = Some(from);
        self.start_before = Some(before);
        self
    }

    pub fn starting_before(mut self, before: Timestamp) -> Self {
        self.start_before = Some(before);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status_is = Some(status);
        self
    }

    pub fn excluding_status(mut self, status: TaskStatus) -> Self {
        self.status_not = Some(status);
        self
    }

    pub fn pinned(mut self, pinned: bool) -> Self {
        self.pinned = Some(pinned);
        self
    }

    pub fn matching_text(mut self, text: impl Into<String>) -> Self {
        self.text_contains = Some(text.into());
        self
    }

    pub fn with_start_time(mut self) -> Self {
        self.require_start_time = true;
        self
    }
}

/// Repository interface for task storage.
pub trait TaskRepository {
    fn insert_task(&self, task: &Task) -> RepoResult<TaskId>;
    fn update_task(&self, task: &Task) -> RepoResult<()>;
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    fn query_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<Task>>;
    /// Persists all records atomically.
    fn save_batch(&self, tasks: &[Task]) -> RepoResult<()>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_task_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn insert_task(&self, task: &Task) -> RepoResult<TaskId> {
        task.validate()?;

        self.conn.execute(
            "INSERT INTO tasks (
                uuid,
                title,
                description,
                resolution_note,
                status,
                priority_symbol,
                priority_rank,
                sort_index,
                start_time,
                end_time,
                time_allocated,
                in_progress_start_time,
                postpone_date,
                postpone_reason,
                external_event_ref,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16);",
            params![
                task.id.to_string(),
                task.title.as_str(),
                task.description.as_str(),
                task.resolution_note.as_str(),
                status_to_db(task.status),
                task.priority.as_str(),
                i64::from(task.priority_rank()),
                task.sort_index,
                instant_to_db(task.start_time),
                instant_to_db(task.end_time),
                task.time_allocated.hours(),
                instant_to_db(task.in_progress_start_time),
                instant_to_db(task.postpone_date),
                task.postpone_reason.as_deref(),
                task.external_event_ref.as_deref(),
                task.created_at.as_millisecond(),
            ],
        )?;

        Ok(task.id)
    }

    fn update_task(&self, task: &Task) -> RepoResult<()> {
        task.validate()?;
        update_row(self.conn, task)
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }
        Ok(None)
    }

    fn query_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<Task>> {
        let mut sql = format!("{TASK_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if query.require_start_time {
            sql.push_str(" AND start_time IS NOT NULL");
        }
        if let Some(from) = query.start_from {
            sql.push_str(" AND start_time >= ?");
            bind_values.push(Value::Integer(from.as_millisecond()));
        }
        if let Some(before) = query.start_before {
            sql.push_str(" AND start_time < ?");
            bind_values.push(Value::Integer(before.as_millisecond()));
        }
        if let Some(status) = query.status_is {
            sql.push_str(" AND status = ?");
            bind_values.push(Value::Text(status_to_db(status).to_string()));
        }
        if let Some(status) = query.status_not {
            sql.push_str(" AND status != ?");
            bind_values.push(Value::Text(status_to_db(status).to_string()));
        }
        match query.pinned {
            Some(true) => {
                sql.push_str(" AND priority_rank < ?");
                bind_values.push(Value::Integer(UNPINNED_RANK_SQL));
            }
            Some(false) => {
                sql.push_str(" AND priority_rank = ?");
                bind_values.push(Value::Integer(UNPINNED_RANK_SQL));
            }
            None => {}
        }

        sql.push_str(" ORDER BY start_time ASC, priority_rank ASC, sort_index ASC, uuid ASC");

        // SQLite LIKE folds ASCII only, so text matching runs on decoded rows.
        let text_matcher = query
            .text_contains
            .as_deref()
            .map(build_text_matcher)
            .transpose()?;

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            let task = parse_task_row(row)?;
            if let Some(matcher) = text_matcher.as_ref() {
                if !matcher.is_match(&task.title) && !matcher.is_match(&task.description) {
                    continue;
                }
            }
            tasks.push(task);
        }

        debug!(
            "event=task_query module=repo status=ok rows={}",
            tasks.len()
        );
        Ok(tasks)
    }

    fn save_batch(&self, tasks: &[Task]) -> RepoResult<()> {
        for task in tasks {
            task.validate()?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for task in tasks {
            update_row(&tx, task)?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn update_row(conn: &Connection, task: &Task) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE tasks
         SET
            title = ?2,
            description = ?3,
            resolution_note = ?4,
            status = ?5,
            priority_symbol = ?6,
            priority_rank = ?7,
            sort_index = ?8,
            start_time = ?9,
            end_time = ?10,
            time_allocated = ?11,
            in_progress_start_time = ?12,
            postpone_date = ?13,
            postpone_reason = ?14,
            external_event_ref = ?15,
            updated_at = (strftime('%s', 'now') * 1000)
         WHERE uuid = ?1;",
        params![
            task.id.to_string(),
            task.title.as_str(),
            task.description.as_str(),
            task.resolution_note.as_str(),
            status_to_db(task.status),
            task.priority.as_str(),
            i64::from(task.priority_rank()),
            task.sort_index,
            instant_to_db(task.start_time),
            instant_to_db(task.end_time),
            task.time_allocated.hours(),
            instant_to_db(task.in_progress_start_time),
            instant_to_db(task.postpone_date),
            task.postpone_reason.as_deref(),
            task.external_event_ref.as_deref(),
        ],
    )?;

    if changed == 0 {
        return Err(RepoError::NotFound(task.id));
    }
    Ok(())
}

fn build_text_matcher(text: &str) -> RepoResult<Regex> {
    RegexBuilder::new(&regex::escape(text))
        .case_insensitive(true)
        .build()
        .map_err(|err| RepoError::InvalidQuery(err.to_string()))
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in tasks.uuid"))
    })?;

    let status_text: String = row.get("status")?;
    let status = parse_status(&status_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid status `{status_text}` in tasks.status"))
    })?;

    let symbol_text: String = row.get("priority_symbol")?;
    let priority: PrioritySymbol = symbol_text.parse().map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid priority symbol `{symbol_text}` in tasks.priority_symbol"
        ))
    })?;

    let stored_rank: i64 = row.get("priority_rank")?;
    if stored_rank != i64::from(priority.rank()) {
        return Err(RepoError::InvalidData(format!(
            "priority rank {stored_rank} does not match symbol `{symbol_text}` for task {id}"
        )));
    }

    let hours: f64 = row.get("time_allocated")?;
    let time_allocated = TimeAllocation::from_hours(hours).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid time allocation {hours} in tasks.time_allocated"
        ))
    })?;

    let created_ms: i64 = row.get("created_at")?;
    let created_at = Timestamp::from_millisecond(created_ms).map_err(|_| {
        RepoError::InvalidData(format!("invalid instant {created_ms} in tasks.created_at"))
    })?;

    let task = Task {
        id,
        title: row.get("title")?,
        description: row.get("description")?,
        resolution_note: row.get("resolution_note")?,
        status,
        priority,
        sort_index: row.get("sort_index")?,
        start_time: parse_instant(row.get("start_time")?, "tasks.start_time")?,
        end_time: parse_instant(row.get("end_time")?, "tasks.end_time")?,
        time_allocated,
        in_progress_start_time: parse_instant(
            row.get("in_progress_start_time")?,
            "tasks.in_progress_start_time",
        )?,
        postpone_date: parse_instant(row.get("postpone_date")?, "tasks.postpone_date")?,
        postpone_reason: row.get("postpone_reason")?,
        external_event_ref: row.get("external_event_ref")?,
        created_at,
    };
    task.validate()?;
    Ok(task)
}

fn status_to_db(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Unset => "",
        TaskStatus::InProgress => "InProgress",
        TaskStatus::Done => "Done",
        TaskStatus::Postponed => "Postpone",
    }
}

fn parse_status(value: &str) -> Option<TaskStatus> {
    match value {
        "" => Some(TaskStatus::Unset),
        "InProgress" => Some(TaskStatus::InProgress),
        "Done" => Some(TaskStatus::Done),
        "Postpone" => Some(TaskStatus::Postponed),
        _ => None,
    }
}

fn instant_to_db(value: Option<Timestamp>) -> Option<i64> {
    value.map(|instant| instant.as_millisecond())
}

fn parse_instant(value: Option<i64>, column: &'static str) -> RepoResult<Option<Timestamp>> {
    value
        .map(|millis| {
            Timestamp::from_millisecond(millis)
                .map_err(|_| RepoError::InvalidData(format!("invalid instant {millis} in {column}")))
        })
        .transpose()
}

fn ensure_task_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let mut stmt = conn.prepare("PRAGMA table_info(tasks);")?;
    let mut rows = stmt.query([])?;
    let mut present = Vec::new();
    while let Some(row) = rows.next()? {
        present.push(row.get::<_, String>(1)?);
    }

    for column in REQUIRED_COLUMNS {
        if !present.iter().any(|name| name == column) {
            return Err(RepoError::MissingRequiredColumn(column));
        }
    }

    Ok(())
}
