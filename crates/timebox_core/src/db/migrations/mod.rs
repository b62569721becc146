//! Schema upgrade steps for the task store.
//!
//! # Responsibility
//! - Keep the ordered list of schema steps shipped with this build.
//! - Bring a connection from its recorded schema version up to the newest.
//!
//! # Invariants
//! - Step versions start at 1 and grow by exactly one.
//! - Each step commits together with its `PRAGMA user_version` bump, so an
//!   interrupted upgrade resumes from the last finished step.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};

#[derive(Debug, Clone, Copy)]
struct SchemaStep {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const SCHEMA_STEPS: &[SchemaStep] = &[SchemaStep {
    version: 1,
    name: "tasks",
    sql: include_str!("0001_tasks.sql"),
}];

/// Newest schema version this build can write.
pub fn latest_version() -> u32 {
    SCHEMA_STEPS.len() as u32
}

/// Steps still missing on a database recorded at `version`.
fn steps_after(version: u32) -> &'static [SchemaStep] {
    let first_pending = SCHEMA_STEPS.partition_point(|step| step.version <= version);
    &SCHEMA_STEPS[first_pending..]
}

/// Upgrades `conn` step by step until it reaches [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let recorded = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    if recorded > latest_version() {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: recorded,
            latest_supported: latest_version(),
        });
    }

    for step in steps_after(recorded) {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute_batch(step.sql)?;
        tx.pragma_update(None, "user_version", step.version)?;
        tx.commit()?;
        info!(
            "event=db_migrate module=db status=ok version={} step={}",
            step.version, step.name
        );
    }
    Ok(())
}
