//! Chat thread references per task.

use std::sync::Arc;

use chrono::Utc;

use crate::models::task::TaskId;
use crate::models::thread::ChatThreadRef;
use crate::Result;

use super::db::Database;

/// Repository for chat thread references.
#[derive(Clone)]
pub struct ThreadRepo {
    db: Arc<Database>,
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    channel: String,
    ts: String,
}

impl ThreadRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Store the thread for `task_id`. An existing reference is kept.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn store(&self, task_id: TaskId, thread: &ChatThreadRef) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO chat_thread (task_id, channel, ts, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(task_id)
        .bind(&thread.channel)
        .bind(&thread.ts)
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Look up the thread for `task_id`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn get(&self, task_id: TaskId) -> Result<Option<ChatThreadRef>> {
        let row: Option<ThreadRow> =
            sqlx::query_as("SELECT channel, ts FROM chat_thread WHERE task_id = ?1")
                .bind(task_id)
                .fetch_optional(self.db.as_ref())
                .await?;
        Ok(row.map(|r| ChatThreadRef::new(r.channel, r.ts)))
    }
}
