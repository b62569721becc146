//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `timebox_core` wiring.
//! - Print today's list, backlog size and the month's day buckets.
//!
//! Usage: `timebox_cli [config.toml]` (defaults to `timebox.toml`).

use log::error;
use std::path::PathBuf;
use std::process::ExitCode;
use timebox_core::{
    init_logging, open_db, NullCalendarSink, SchedulingService, SqliteTaskRepository,
    SystemClock, TimeboxConfig,
};

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("timebox: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("timebox.toml"));
    let config = TimeboxConfig::load(&config_path)?;
    if let Some(dir) = config.logging.dir.as_deref() {
        init_logging(&config.logging.level, dir)?;
    }

    let conn = open_db(&config.database_path)?;
    let repo = SqliteTaskRepository::try_new(&conn)?;
    let mut service =
        SchedulingService::new(repo, NullCalendarSink, SystemClock, config.to_settings()?);

    let today = service.today();
    println!("timebox_core version={}", timebox_core::core_version());
    println!("today={today}");
    for task in service.fetch_today()? {
        println!(
            "  [{:>3}] {:<10} {:>3} {}",
            task.priority.as_str(),
            format!("{:?}", task.status),
            task.time_allocated.label(),
            task.title
        );
    }
    println!("backlog={}", service.fetch_backlog()?.len());

    service.load_month(today)?;
    for day in service.month_days() {
        let count = service.count_for(day);
        if count > 0 {
            println!("  {day} tasks={count} done={}", service.done_count_for(day));
        }
    }
    Ok(())
}
