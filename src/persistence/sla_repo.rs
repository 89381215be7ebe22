//! SLA state repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::sla::SlaState;
use crate::models::task::TaskId;
use crate::{AppError, Result};

use super::db::Database;

/// Repository for per-task SLA state.
#[derive(Clone)]
pub struct SlaRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SlaRow {
    task_id: i64,
    created_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
    start_breach: i64,
    resolution_breach: i64,
}

impl SlaRow {
    fn into_state(self) -> Result<SlaState> {
        Ok(SlaState {
            task_id: self.task_id,
            created_at: parse_ts("created_at", &self.created_at)?,
            started_at: self
                .started_at
                .as_deref()
                .map(|s| parse_ts("started_at", s))
                .transpose()?,
            completed_at: self
                .completed_at
                .as_deref()
                .map(|s| parse_ts("completed_at", s))
                .transpose()?,
            start_breach: self.start_breach != 0,
            resolution_breach: self.resolution_breach != 0,
        })
    }
}

fn parse_ts(field: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Db(format!("invalid {field}: {e}")))
}

impl SlaRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Fetch the state for `task_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or a stored timestamp is
    /// malformed.
    pub async fn get(&self, task_id: TaskId) -> Result<Option<SlaState>> {
        let row: Option<SlaRow> = sqlx::query_as(
            "SELECT task_id, created_at, started_at, completed_at, start_breach, resolution_breach
             FROM sla_state WHERE task_id = ?1",
        )
        .bind(task_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(SlaRow::into_state).transpose()
    }

    /// Insert a fresh state unless one already exists.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert_if_absent(&self, state: &SlaState) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO sla_state
                (task_id, created_at, started_at, completed_at, start_breach, resolution_breach, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(state.task_id)
        .bind(state.created_at.to_rfc3339())
        .bind(state.started_at.map(|t| t.to_rfc3339()))
        .bind(state.completed_at.map(|t| t.to_rfc3339()))
        .bind(i64::from(state.start_breach))
        .bind(i64::from(state.resolution_breach))
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Write `state`, never undoing a stored milestone or breach.
    ///
    /// Timestamps already set keep their first value and breach flags stay
    /// raised even if `state` says otherwise.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn upsert(&self, state: &SlaState) -> Result<()> {
        sqlx::query(
            "INSERT INTO sla_state
                (task_id, created_at, started_at, completed_at, start_breach, resolution_breach, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(task_id) DO UPDATE SET
                started_at = COALESCE(sla_state.started_at, excluded.started_at),
                completed_at = COALESCE(sla_state.completed_at, excluded.completed_at),
                start_breach = MAX(sla_state.start_breach, excluded.start_breach),
                resolution_breach = MAX(sla_state.resolution_breach, excluded.resolution_breach),
                updated_at = excluded.updated_at",
        )
        .bind(state.task_id)
        .bind(state.created_at.to_rfc3339())
        .bind(state.started_at.map(|t| t.to_rfc3339()))
        .bind(state.completed_at.map(|t| t.to_rfc3339()))
        .bind(i64::from(state.start_breach))
        .bind(i64::from(state.resolution_breach))
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }
}
