//! `SQLite` schema bootstrap logic.
//!
//! All table definitions use `CREATE TABLE IF NOT EXISTS` and are safe to
//! re-run on every startup.

use sqlx::SqlitePool;

use crate::Result;

/// Apply all table definitions to the connected `SQLite` database.
///
/// # Errors
///
/// Returns `AppError::Db` if any DDL statement fails.
pub async fn bootstrap_schema(pool: &SqlitePool) -> Result<()> {
    let ddl = r"
CREATE TABLE IF NOT EXISTS ledger_flag (
    namespace       TEXT NOT NULL CHECK(namespace IN ('processed_email','sent_comment','closed_notified','reopened_notified')),
    key             TEXT NOT NULL,
    marked_at       TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
);

CREATE TABLE IF NOT EXISTS watermark (
    name            TEXT PRIMARY KEY NOT NULL,
    value_ms        INTEGER NOT NULL,
    updated_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_thread (
    task_id         INTEGER PRIMARY KEY NOT NULL,
    channel         TEXT NOT NULL,
    ts              TEXT NOT NULL,
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sla_state (
    task_id             INTEGER PRIMARY KEY NOT NULL,
    created_at          TEXT NOT NULL,
    started_at          TEXT,
    completed_at        TEXT,
    start_breach        INTEGER NOT NULL DEFAULT 0,
    resolution_breach   INTEGER NOT NULL DEFAULT 0,
    updated_at          TEXT NOT NULL
);
";

    sqlx::raw_sql(ddl).execute(pool).await?;
    Ok(())
}
