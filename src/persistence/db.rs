//! `SQLite` ledger connection, integrity verification and schema bootstrap.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::SqlitePool;
use tracing::info;

use crate::{AppError, Result};

use super::schema;

/// Alias for the shared `SQLite` pool.
pub type Database = SqlitePool;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (or create) the ledger file, verify it and apply the schema.
///
/// Every write is flushed with `synchronous = FULL` before the statement
/// returns, so a mark survives a crash right after the call.
///
/// # Errors
///
/// Returns `AppError::Db` if the file cannot be opened, fails the
/// integrity check, or the schema cannot be applied. Callers treat this as
/// fatal.
pub async fn connect(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|err| AppError::Db(format!("failed to create ledger dir: {err}")))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full)
        .busy_timeout(BUSY_TIMEOUT);

    // Single writer: the one active tick owns the ledger.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|err| AppError::Db(format!("failed to open ledger {}: {err}", path.display())))?;

    verify_integrity(&pool).await?;
    schema::bootstrap_schema(&pool).await?;
    info!(path = %path.display(), "ledger opened");
    Ok(pool)
}

/// Open a private in-memory ledger with the schema applied.
///
/// # Errors
///
/// Returns `AppError::Db` if the connection or schema application fails.
pub async fn connect_memory() -> Result<Database> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    schema::bootstrap_schema(&pool).await?;
    Ok(pool)
}

async fn verify_integrity(pool: &SqlitePool) -> Result<()> {
    let verdict: String = sqlx::query_scalar("PRAGMA quick_check")
        .fetch_one(pool)
        .await
        .map_err(|err| AppError::Db(format!("ledger integrity check failed: {err}")))?;
    if verdict.eq_ignore_ascii_case("ok") {
        Ok(())
    } else {
        Err(AppError::Db(format!("ledger is corrupt: {verdict}")))
    }
}
