//! Scheduling use-case service.
//!
//! # Responsibility
//! - Expose list reads (today, day, backlog, search, all) and every task
//!   mutation the UI can trigger.
//! - Compose the priority, ordering and status rules with store writes,
//!   calendar mirroring and the day-bucket index.
//!
//! # Invariants
//! - Refused operations leave the task, the store and the index untouched.
//! - Accepted mutations are applied to the caller's task first; a failed
//!   store write surfaces as `ScheduleError::Persistence` (or `UnsavedTask`
//!   for a create) without rollback, and [`SchedulingService::retry_save`]
//!   finishes the write.
//! - Day buckets follow the caller's task: they are updated before the store
//!   write and are not reverted when it fails.
//! - A task leaving a day takes the next free index of its partition on the
//!   new day. Closing the gap on the old day is best effort; a failure there
//!   is logged and the next renumber of that day repairs it.
//! - Calendar sink failures are logged and never fail the operation.
//! - Titles, descriptions and notes are never logged.

use crate::calendar::{CalendarDays, Clock};
use crate::engine::day_buckets::DayBucketIndex;
use crate::engine::ordering::{
    move_within_partition, next_partition_index, next_unpinned_index, renumber_dense,
    sort_for_display, MoveOutcome, Partitioned,
};
use crate::engine::priority::{assign_priority, available_symbols, PriorityMenu, SlotConflict};
use crate::engine::status::{apply_status, CompletionEvent, StatusChange, TransitionError};
use crate::model::task::{
    normalize_title, PrioritySymbol, Task, TaskId, TaskStatus, TaskValidationError,
    TimeAllocation,
};
use crate::repo::task_repo::{RepoError, TaskQuery, TaskRepository};
use crate::sync::calendar_sink::{CalendarSink, MirroredEvent};
use jiff::civil::{Date, Time};
use jiff::tz::TimeZone;
use log::{info, warn};
use thiserror::Error;

/// Runtime knobs handed to the service by its owner.
#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub time_zone: TimeZone,
    /// Search text shorter than this (in chars) returns no results.
    pub search_min_chars: usize,
    /// Other in-progress tasks at which starting one more deserves a warning.
    pub in_progress_warning_threshold: usize,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            time_zone: TimeZone::system(),
            search_min_chars: 3,
            in_progress_warning_threshold: 2,
        }
    }
}

/// Errors from scheduling operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("{0}")]
    Validation(#[from] TaskValidationError),
    #[error("{0}")]
    SlotConflict(#[from] SlotConflict),
    #[error("task {0} needs a resolution note before it can be marked done")]
    ResolutionRequired(TaskId),
    #[error("cannot reschedule to {requested}; today is {today}")]
    PastDateRejected { requested: Date, today: Date },
    #[error("done task {0} cannot be rescheduled")]
    DoneTaskImmutable(TaskId),
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// The in-memory task already holds the new state; retry the save.
    #[error("task store write failed: {0}")]
    Persistence(RepoError),
    /// A created task that never reached the store; pass it to `retry_save`.
    #[error("new task {} was not saved: {}", .task.id, .source)]
    UnsavedTask { task: Box<Task>, source: RepoError },
    #[error("calendar arithmetic failed: {0}")]
    Calendar(#[from] jiff::Error),
}

impl From<RepoError> for ScheduleError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::TaskNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Persistence(other),
        }
    }
}

impl From<TransitionError> for ScheduleError {
    fn from(value: TransitionError) -> Self {
        match value {
            TransitionError::ResolutionRequired(id) => Self::ResolutionRequired(id),
            TransitionError::Calendar(err) => Self::Calendar(err),
        }
    }
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Result of an accepted reschedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RescheduleOutcome {
    pub old_day: Option<Date>,
    pub new_day: Date,
    /// Either side of the move is today, so the today list is stale.
    pub refresh_today: bool,
}

/// Concurrency hint shown before starting another task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InProgressWarning {
    pub others_in_progress: usize,
    pub should_warn: bool,
}

/// Free-text edits; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub resolution_note: Option<String>,
}

/// Use-case facade over the task store, calendar sink and day buckets.
pub struct SchedulingService<R: TaskRepository, S: CalendarSink, C: Clock> {
    repo: R,
    sink: S,
    clock: C,
    days: CalendarDays,
    settings: ScheduleSettings,
    buckets: DayBucketIndex,
    completions: Vec<CompletionEvent>,
}

impl<R: TaskRepository, S: CalendarSink, C: Clock> SchedulingService<R, S, C> {
    pub fn new(repo: R, sink: S, clock: C, settings: ScheduleSettings) -> Self {
        Self {
            repo,
            sink,
            clock,
            days: CalendarDays::new(settings.time_zone.clone()),
            settings,
            buckets: DayBucketIndex::new(),
            completions: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ScheduleSettings {
        &self.settings
    }

    pub fn calendar(&self) -> &CalendarDays {
        &self.days
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn today(&self) -> Date {
        self.days.day_of(self.clock.now())
    }

    /// Today's visible list: non-postponed tasks starting today, done last.
    pub fn fetch_today(&self) -> ScheduleResult<Vec<Task>> {
        let (start, end) = self.days.day_range(self.today())?;
        let mut tasks = self.repo.query_tasks(
            &TaskQuery::all()
                .starting_in(start, end)
                .excluding_status(TaskStatus::Postponed),
        )?;
        sort_for_display(&mut tasks);
        Ok(tasks)
    }

    /// Every task starting on `day`, any status, in display order.
    pub fn fetch_for_day(&self, day: Date) -> ScheduleResult<Vec<Task>> {
        let mut tasks = self.day_tasks(day)?;
        sort_for_display(&mut tasks);
        Ok(tasks)
    }

    /// Overdue tasks: started before today and not done, oldest first.
    pub fn fetch_backlog(&self) -> ScheduleResult<Vec<Task>> {
        let start_of_today = self.days.start_of_day(self.today())?;
        Ok(self.repo.query_tasks(
            &TaskQuery::all()
                .starting_before(start_of_today)
                .excluding_status(TaskStatus::Done),
        )?)
    }

    /// Title/description search grouped as today, upcoming, then past.
    ///
    /// Text shorter than the configured minimum yields an empty list.
    pub fn fetch_by_search(&self, text: &str) -> ScheduleResult<Vec<Task>> {
        if text.chars().count() < self.settings.search_min_chars {
            return Ok(Vec::new());
        }

        let (start, end) = self.days.day_range(self.today())?;
        let matches = self
            .repo
            .query_tasks(&TaskQuery::all().matching_text(text).with_start_time())?;

        let mut today = Vec::new();
        let mut upcoming = Vec::new();
        let mut past = Vec::new();
        for task in matches {
            let Some(task_start) = task.start_time else {
                continue;
            };
            if task_start < start {
                past.push(task);
            } else if task_start < end {
                today.push(task);
            } else {
                upcoming.push(task);
            }
        }
        upcoming.sort_by_key(|task| task.start_time);
        past.sort_by_key(|task| task.start_time);

        info!(
            "event=task_search module=service status=ok results={}",
            today.len() + upcoming.len() + past.len()
        );
        today.extend(upcoming);
        today.extend(past);
        Ok(today)
    }

    /// Every stored task in display order.
    pub fn fetch_all(&self) -> ScheduleResult<Vec<Task>> {
        let mut tasks = self.repo.query_tasks(&TaskQuery::all())?;
        sort_for_display(&mut tasks);
        Ok(tasks)
    }

    /// Creates a task on `day`, at `time_of_day` or local midnight, at the
    /// bottom of the day's unpinned partition.
    pub fn create(
        &mut self,
        title: &str,
        description: &str,
        day: Date,
        time_of_day: Option<Time>,
    ) -> ScheduleResult<Task> {
        let title = normalize_title(title.to_string())?;
        let start = match time_of_day {
            Some(time) => self.days.at_time_of_day(day, time)?,
            None => self.days.start_of_day(day)?,
        };

        let now = self.clock.now();
        let mut task = Task::new(title, description, Some(start), now)?;
        task.sort_index = next_unpinned_index(&self.day_tasks(day)?);
        self.buckets.apply_create(day, false);
        if let Err(err) = self.repo.insert_task(&task) {
            warn!(
                "event=task_create module=service status=error task_id={} error_code=insert_failed error={}",
                task.id, err
            );
            return Err(ScheduleError::UnsavedTask {
                task: Box::new(task),
                source: err,
            });
        }

        let event = MirroredEvent::from_task(&task, now);
        match self.sink.create_mirrored_event(&event) {
            Ok(external_ref) => {
                task.external_event_ref = Some(external_ref);
                if let Err(err) = self.repo.update_task(&task) {
                    warn!(
                        "event=task_create module=service status=degraded task_id={} error_code=external_ref_save_failed error={}",
                        task.id, err
                    );
                }
            }
            Err(err) => log_sink_failure("create", task.id, &err),
        }

        info!(
            "event=task_create module=service status=ok task_id={} sort_index={}",
            task.id, task.sort_index
        );
        Ok(task)
    }

    /// Moves `task` to `new_day`, keeping its local time-of-day.
    pub fn reschedule(&mut self, task: &mut Task, new_day: Date) -> ScheduleResult<RescheduleOutcome> {
        if task.is_done() {
            return Err(ScheduleError::DoneTaskImmutable(task.id));
        }
        let today = self.today();
        if new_day < today {
            return Err(ScheduleError::PastDateRejected {
                requested: new_day,
                today,
            });
        }

        let old_day = task.start_time.map(|start| self.days.day_of(start));
        let new_start = match task.start_time {
            Some(start) => self.days.at_time_of_day(new_day, self.days.time_of_day(start))?,
            None => self.days.start_of_day(new_day)?,
        };
        let outcome = RescheduleOutcome {
            old_day,
            new_day,
            refresh_today: old_day == Some(today) || new_day == today,
        };
        if old_day == Some(new_day) {
            return Ok(outcome);
        }

        let sort_index = self.next_index_on(new_day, task)?;
        task.shift_start_to(new_start)?;
        task.sort_index = sort_index;
        self.buckets
            .apply_reschedule(old_day, new_day, task.is_done());
        self.persist(task, "task_reschedule")?;

        if let Some(old_day) = old_day {
            self.close_gap(old_day, task.is_pinned(), "task_reschedule");
        }
        self.mirror_update(task);

        info!(
            "event=task_reschedule module=service status=ok task_id={} refresh_today={}",
            task.id, outcome.refresh_today
        );
        Ok(outcome)
    }

    /// Applies a drag move to `day`'s list and saves changed indices as one batch.
    ///
    /// Indices address the partition order of the day: pinned tasks by rank,
    /// then unpinned tasks by `sort_index`, regardless of status. This is
    /// `Partitioned::from_tasks(..).combined()`, not the done-last order of
    /// [`Self::fetch_for_day`]; translate display positions before calling.
    pub fn move_within_list(
        &mut self,
        day: Date,
        source_indices: &[usize],
        destination: usize,
    ) -> ScheduleResult<MoveOutcome> {
        let outcome = move_within_partition(self.day_tasks(day)?, source_indices, destination);
        match &outcome {
            MoveOutcome::Rejected(reason) => {
                info!(
                    "event=task_move module=service status=rejected reason={:?}",
                    reason
                );
            }
            MoveOutcome::Reordered { changed, .. } => {
                if !changed.is_empty() {
                    self.repo.save_batch(changed).map_err(ScheduleError::Persistence)?;
                }
                info!(
                    "event=task_move module=service status=ok changed={}",
                    changed.len()
                );
            }
        }
        Ok(outcome)
    }

    /// Removes `task` from the store, its mirrored event and the day buckets.
    pub fn delete(&mut self, task: &Task) -> ScheduleResult<()> {
        self.repo.delete_task(task.id)?;

        if task.external_event_ref.is_some() {
            let event = MirroredEvent::from_task(task, self.clock.now());
            if let Err(err) = self.sink.delete_mirrored_event(&event) {
                log_sink_failure("delete", task.id, &err);
            }
        }

        if let Some(day) = task.start_time.map(|start| self.days.day_of(start)) {
            self.buckets.apply_delete(day, task.is_done());
            self.close_gap(day, task.is_pinned(), "task_delete");
        }

        info!("event=task_delete module=service status=ok task_id={}", task.id);
        Ok(())
    }

    /// Runs one lifecycle transition.
    ///
    /// A completion event, when produced, is returned and also queued for
    /// [`Self::take_completion_events`].
    pub fn set_status(
        &mut self,
        task: &mut Task,
        change: StatusChange,
    ) -> ScheduleResult<Option<CompletionEvent>> {
        let before = (task.start_time, task.end_time, task.title.clone());
        let old_day = task.start_time.map(|start| self.days.day_of(start));
        let target = change.target_status();

        let event = apply_status(task, change, self.clock.now(), &self.days)?;
        if let Some(event) = event.as_ref() {
            self.completions.push(event.clone());
        }

        let new_day = task.start_time.map(|start| self.days.day_of(start));
        let moved_to = new_day.filter(|day| old_day != Some(*day));
        if let Some(day) = moved_to {
            task.sort_index = self.next_index_on(day, task)?;
        }
        for day in [old_day, new_day].into_iter().flatten() {
            self.recount_day(day, task)?;
        }
        self.persist(task, "task_status")?;

        if let (Some(old_day), Some(_)) = (old_day, moved_to) {
            self.close_gap(old_day, task.is_pinned(), "task_status");
        }
        if before != (task.start_time, task.end_time, task.title.clone()) {
            self.mirror_update(task);
        }

        info!(
            "event=task_status module=service status=ok task_id={} target={:?} completion_event={}",
            task.id,
            target,
            event.is_some()
        );
        Ok(event)
    }

    /// Sets or clears the task's priority symbol.
    ///
    /// Exclusivity is checked against every stored task.
    pub fn set_priority(&mut self, task: &mut Task, symbol: PrioritySymbol) -> ScheduleResult<()> {
        let all_tasks = self.repo.query_tasks(&TaskQuery::all())?;
        assign_priority(task, symbol, &all_tasks)?;
        self.persist(task, "task_priority")?;
        info!(
            "event=task_priority module=service status=ok task_id={} rank={}",
            task.id,
            task.priority_rank()
        );
        Ok(())
    }

    /// Symbols the priority picker may offer for `task`.
    pub fn available_priority_symbols(&self, task: &Task) -> ScheduleResult<PriorityMenu> {
        let all_tasks = self.repo.query_tasks(&TaskQuery::all())?;
        Ok(available_symbols(task, &all_tasks))
    }

    pub fn set_time_allocated(
        &mut self,
        task: &mut Task,
        allocation: TimeAllocation,
    ) -> ScheduleResult<()> {
        task.time_allocated = allocation;
        self.persist(task, "task_time_allocated")?;
        self.mirror_update(task);
        Ok(())
    }

    /// Edits free-text fields; a blank title is refused before any change.
    pub fn update_details(&mut self, task: &mut Task, details: TaskDetails) -> ScheduleResult<()> {
        let title = details.title.map(normalize_title).transpose()?;
        let title_changed = title.as_ref().is_some_and(|title| *title != task.title);

        if let Some(title) = title {
            task.title = title;
        }
        if let Some(description) = details.description {
            task.description = description;
        }
        if let Some(resolution_note) = details.resolution_note {
            task.resolution_note = resolution_note;
        }
        self.persist(task, "task_update_details")?;
        if title_changed {
            self.mirror_update(task);
        }
        Ok(())
    }

    /// Counts other in-progress tasks; starting is never refused.
    pub fn in_progress_warning(&self, task: &Task) -> ScheduleResult<InProgressWarning> {
        let others_in_progress = self
            .repo
            .query_tasks(&TaskQuery::all().with_status(TaskStatus::InProgress))?
            .into_iter()
            .filter(|other| other.id != task.id)
            .count();
        Ok(InProgressWarning {
            others_in_progress,
            should_warn: others_in_progress >= self.settings.in_progress_warning_threshold,
        })
    }

    /// Rebuilds the day buckets for the month containing `anchor`.
    pub fn load_month(&mut self, anchor: Date) -> ScheduleResult<()> {
        let window = self.days.month_window(anchor)?;
        let (start, end) = self.days.month_range(anchor)?;
        let tasks = self
            .repo
            .query_tasks(&TaskQuery::all().starting_in(start, end))?;
        let entries: Vec<(Date, bool)> = tasks
            .iter()
            .filter_map(|task| task.start_time.map(|start| (self.days.day_of(start), task.is_done())))
            .collect();
        self.buckets.rebuild(window, entries);
        info!(
            "event=month_load module=service status=ok month={} tasks={}",
            window.0,
            tasks.len()
        );
        Ok(())
    }

    pub fn count_for(&self, day: Date) -> u32 {
        self.buckets.count_for(day)
    }

    pub fn done_count_for(&self, day: Date) -> u32 {
        self.buckets.done_count_for(day)
    }

    /// Grid days of the loaded month; empty before `load_month`.
    pub fn month_days(&self) -> Vec<Date> {
        self.buckets
            .window()
            .map(|(first, _)| self.days.days_in_month(first))
            .unwrap_or_default()
    }

    pub fn day_buckets(&self) -> &DayBucketIndex {
        &self.buckets
    }

    /// Drains queued completion events.
    pub fn take_completion_events(&mut self) -> Vec<CompletionEvent> {
        std::mem::take(&mut self.completions)
    }

    /// Saves `task` again after an earlier `Persistence` or `UnsavedTask`
    /// error, inserting it when the store has never seen it.
    pub fn retry_save(&self, task: &Task) -> ScheduleResult<()> {
        if self.repo.get_task(task.id)?.is_some() {
            return self.persist(task, "task_retry_save");
        }
        self.repo.insert_task(task).map_err(|err| {
            warn!(
                "event=task_retry_save module=service status=error task_id={} error_code=insert_failed error={}",
                task.id, err
            );
            ScheduleError::Persistence(err)
        })?;
        info!(
            "event=task_retry_save module=service status=ok task_id={} inserted=true",
            task.id
        );
        Ok(())
    }

    fn day_tasks(&self, day: Date) -> ScheduleResult<Vec<Task>> {
        let (start, end) = self.days.day_range(day)?;
        Ok(self
            .repo
            .query_tasks(&TaskQuery::all().starting_in(start, end))?)
    }

    fn persist(&self, task: &Task, event: &'static str) -> ScheduleResult<()> {
        self.repo.update_task(task).map_err(|err| {
            warn!(
                "event={event} module=service status=error task_id={} error_code=persist_failed error={}",
                task.id, err
            );
            ScheduleError::from(err)
        })
    }

    /// Next free index on `day` in the partition `task` belongs to.
    fn next_index_on(&self, day: Date, task: &Task) -> ScheduleResult<i64> {
        let others: Vec<Task> = self
            .day_tasks(day)?
            .into_iter()
            .filter(|other| other.id != task.id)
            .collect();
        Ok(next_partition_index(&others, task.is_pinned()))
    }

    fn close_gap(&self, day: Date, pinned: bool, event: &'static str) {
        if let Err(err) = self.densify_partition(day, pinned) {
            warn!(
                "event={event} module=service status=degraded day={day} error_code=renumber_failed error={}",
                err
            );
        }
    }

    /// Renumbers one partition of `day` to `0..n` after a task left it.
    fn densify_partition(&self, day: Date, pinned: bool) -> ScheduleResult<()> {
        let partitioned = Partitioned::from_tasks(self.day_tasks(day)?);
        let mut partition = if pinned {
            partitioned.pinned
        } else {
            partitioned.unpinned
        };
        let changed = renumber_dense(&mut partition);
        if !changed.is_empty() {
            self.repo
                .save_batch(&changed)
                .map_err(ScheduleError::Persistence)?;
        }
        Ok(())
    }

    /// Recounts `day` from the store with `current` standing in for its
    /// stored row.
    fn recount_day(&mut self, day: Date, current: &Task) -> ScheduleResult<()> {
        if !self.buckets.covers(day) {
            return Ok(());
        }
        let current_here = current
            .start_time
            .is_some_and(|start| self.days.day_of(start) == day);
        let others: Vec<Task> = self
            .day_tasks(day)?
            .into_iter()
            .filter(|task| task.id != current.id)
            .collect();
        let total = others.len() + usize::from(current_here);
        let done = others.iter().filter(|task| task.is_done()).count()
            + usize::from(current_here && current.is_done());
        self.buckets
            .set_day(day, saturating_u32(total), saturating_u32(done));
        Ok(())
    }

    /// Pushes the task's window to the sink, creating the event when the
    /// task has no external ref yet.
    fn mirror_update(&self, task: &mut Task) {
        let event = MirroredEvent::from_task(task, self.clock.now());
        if task.external_event_ref.is_some() {
            if let Err(err) = self.sink.update_mirrored_event(&event) {
                log_sink_failure("update", task.id, &err);
            }
            return;
        }

        match self.sink.create_mirrored_event(&event) {
            Ok(external_ref) => {
                task.external_event_ref = Some(external_ref);
                if let Err(err) = self.repo.update_task(task) {
                    warn!(
                        "event=calendar_sink module=service status=degraded task_id={} error_code=external_ref_save_failed error={}",
                        task.id, err
                    );
                }
            }
            Err(err) => log_sink_failure("create", task.id, &err),
        }
    }
}

fn log_sink_failure(operation: &str, task_id: TaskId, err: &dyn std::error::Error) {
    warn!(
        "event=calendar_sink module=service status=error operation={operation} task_id={task_id} error={err}"
    );
}

fn saturating_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
