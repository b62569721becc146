use jiff::Timestamp;
use rusqlite::Connection;
use timebox_core::db::open_db_in_memory;
use timebox_core::{
    PrioritySymbol, RepoError, SqliteTaskRepository, Task, TaskQuery, TaskRepository,
    TaskStatus, TimeAllocation,
};

fn ts(text: &str) -> Timestamp {
    text.parse().unwrap()
}

fn task_at(title: &str, start: &str) -> Task {
    Task::new(title, "", Some(ts(start)), ts("2025-01-01T00:00:00Z")).unwrap()
}

#[test]
fn insert_and_get_preserve_every_field() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();

    let mut task = task_at("Review budget", "2025-03-04T10:00:00Z");
    task.description = "Q2 numbers".to_string();
    task.resolution_note = "sent".to_string();
    task.status = TaskStatus::Postponed;
    task.priority = PrioritySymbol::Third;
    task.sort_index = 4;
    task.end_time = Some(ts("2025-03-04T11:30:00Z"));
    task.time_allocated = TimeAllocation::ThirtyMinutes;
    task.in_progress_start_time = Some(ts("2025-03-03T09:00:00Z"));
    task.postpone_date = Some(ts("2025-03-04T10:00:00Z"));
    task.postpone_reason = Some("waiting on finance".to_string());
    task.external_event_ref = Some("evt-42".to_string());

    repo.insert_task(&task).unwrap();
    let loaded = repo.get_task(task.id).unwrap().unwrap();
    assert_eq!(loaded, task);

    let (symbol, rank, status): (String, i64, String) = conn
        .query_row(
            "SELECT priority_symbol, priority_rank, status FROM tasks WHERE uuid = ?1;",
            [task.id.to_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap();
    assert_eq!(symbol, "!!!");
    assert_eq!(rank, 2);
    assert_eq!(status, "Postpone");
}

#[test]
fn update_and_delete_missing_task_return_not_found() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let task = task_at("Ghost", "2025-03-04T10:00:00Z");

    assert!(matches!(repo.update_task(&task), Err(RepoError::NotFound(id)) if id == task.id));
    assert!(matches!(repo.delete_task(task.id), Err(RepoError::NotFound(id)) if id == task.id));
    assert!(repo.get_task(task.id).unwrap().is_none());
}

#[test]
fn query_combines_predicates_with_and() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();

    let mut pinned_today = task_at("Pinned", "2025-03-04T08:00:00Z");
    pinned_today.priority = PrioritySymbol::First;
    let plain_today = task_at("Plain", "2025-03-04T09:00:00Z");
    let mut done_today = task_at("Done", "2025-03-04T10:00:00Z");
    done_today.status = TaskStatus::Done;
    let tomorrow = task_at("Tomorrow", "2025-03-05T09:00:00Z");
    let undated = Task::new("Undated", "", None, ts("2025-01-01T00:00:00Z")).unwrap();
    for task in [&pinned_today, &plain_today, &done_today, &tomorrow, &undated] {
        repo.insert_task(task).unwrap();
    }

    let day = TaskQuery::all().starting_in(ts("2025-03-04T00:00:00Z"), ts("2025-03-05T00:00:00Z"));
    let titles = |query: &TaskQuery| -> Vec<String> {
        repo.query_tasks(query)
            .unwrap()
            .into_iter()
            .map(|task| task.title)
            .collect()
    };

    assert_eq!(titles(&day), vec!["Pinned", "Plain", "Done"]);
    assert_eq!(
        titles(&day.clone().excluding_status(TaskStatus::Done)),
        vec!["Pinned", "Plain"]
    );
    assert_eq!(titles(&day.clone().pinned(true)), vec!["Pinned"]);
    assert_eq!(titles(&day.clone().pinned(false)), vec!["Plain", "Done"]);
    assert_eq!(
        titles(&TaskQuery::all().with_status(TaskStatus::Done)),
        vec!["Done"]
    );
    assert_eq!(titles(&TaskQuery::all()).len(), 5);
    assert_eq!(titles(&TaskQuery::all().with_start_time()).len(), 4);
    assert_eq!(
        titles(&TaskQuery::all().starting_before(ts("2025-03-04T09:00:00Z"))),
        vec!["Pinned"]
    );
}

#[test]
fn text_filter_matches_title_or_description() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let mut by_description = task_at("Errand", "2025-03-04T08:00:00Z");
    by_description.description = "Pick up the DRY cleaning".to_string();
    repo.insert_task(&by_description).unwrap();
    repo.insert_task(&task_at("Dry run deploy", "2025-03-04T09:00:00Z"))
        .unwrap();
    repo.insert_task(&task_at("Unrelated", "2025-03-04T10:00:00Z"))
        .unwrap();

    let found = repo
        .query_tasks(&TaskQuery::all().matching_text("dry"))
        .unwrap();
    let titles: Vec<&str> = found.iter().map(|task| task.title.as_str()).collect();
    assert_eq!(titles, vec!["Errand", "Dry run deploy"]);
}

#[test]
fn save_batch_is_all_or_nothing() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let mut stored = task_at("Stored", "2025-03-04T08:00:00Z");
    repo.insert_task(&stored).unwrap();
    let missing = task_at("Missing", "2025-03-04T09:00:00Z");

    stored.sort_index = 9;
    let err = repo.save_batch(&[stored.clone(), missing.clone()]).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == missing.id));
    assert_eq!(repo.get_task(stored.id).unwrap().unwrap().sort_index, 0);

    repo.save_batch(&[stored.clone()]).unwrap();
    assert_eq!(repo.get_task(stored.id).unwrap().unwrap().sort_index, 9);
}

#[test]
fn rows_with_inconsistent_rank_or_unknown_status_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let task = task_at("Row", "2025-03-04T08:00:00Z");
    repo.insert_task(&task).unwrap();

    conn.execute(
        "UPDATE tasks SET priority_rank = 0 WHERE uuid = ?1;",
        [task.id.to_string()],
    )
    .unwrap();
    assert!(matches!(repo.get_task(task.id), Err(RepoError::InvalidData(_))));

    conn.execute(
        "UPDATE tasks SET priority_rank = 3, status = 'Archived' WHERE uuid = ?1;",
        [task.id.to_string()],
    )
    .unwrap();
    assert!(matches!(
        repo.query_tasks(&TaskQuery::all()),
        Err(RepoError::InvalidData(_))
    ));
}

#[test]
fn write_paths_validate_before_sql() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTaskRepository::try_new(&conn).unwrap();
    let mut task = task_at("Valid", "2025-03-04T08:00:00Z");
    task.title = "  ".to_string();

    assert!(matches!(repo.insert_task(&task), Err(RepoError::Validation(_))));
    assert!(repo.query_tasks(&TaskQuery::all()).unwrap().is_empty());
}

#[test]
fn try_new_requires_migrated_connection() {
    let raw = Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteTaskRepository::try_new(&raw),
        Err(RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        })
    ));

    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("ALTER TABLE tasks DROP COLUMN external_event_ref;")
        .unwrap();
    assert!(matches!(
        SqliteTaskRepository::try_new(&conn),
        Err(RepoError::MissingRequiredColumn("external_event_ref"))
    ));
}
