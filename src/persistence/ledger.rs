//! Durable idempotency ledger.
//!
//! Each namespace is a set of external identifiers recording which side
//! effects already fired. Marks are idempotent and only the closed/reopened
//! pair may be cleared, by the transitions that model a task cycling
//! between done and open.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use crate::{AppError, Result};

use super::db::Database;

const COMMENT_WATERMARK: &str = "last_comment_at";

/// Flag namespaces kept in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerNamespace {
    /// Mailbox message ids already handled.
    ProcessedEmail,
    /// Tracker comment ids already emailed to the customer.
    SentComment,
    /// Task ids whose closure was announced.
    ClosedNotified,
    /// Task ids whose reopening was announced.
    ReopenedNotified,
}

impl LedgerNamespace {
    /// Storage name of the namespace.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ProcessedEmail => "processed_email",
            Self::SentComment => "sent_comment",
            Self::ClosedNotified => "closed_notified",
            Self::ReopenedNotified => "reopened_notified",
        }
    }

    /// Whether a paired transition is allowed to clear flags here.
    #[must_use]
    pub fn is_clearable(self) -> bool {
        matches!(self, Self::ClosedNotified | Self::ReopenedNotified)
    }
}

/// Repository over the `ledger_flag` and `watermark` tables.
#[derive(Clone)]
pub struct DedupLedger {
    db: Arc<Database>,
}

impl DedupLedger {
    /// Create a new ledger handle.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Whether `key` is marked in `namespace`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn has(&self, namespace: LedgerNamespace, key: &str) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM ledger_flag WHERE namespace = ?1 AND key = ?2")
                .bind(namespace.as_str())
                .bind(key)
                .fetch_optional(self.db.as_ref())
                .await?;
        Ok(found.is_some())
    }

    /// Mark `key` in `namespace`. Marking twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn mark(&self, namespace: LedgerNamespace, key: &str) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO ledger_flag (namespace, key, marked_at) VALUES (?1, ?2, ?3)",
        )
        .bind(namespace.as_str())
        .bind(key)
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Remove `key` from a clearable namespace. Clearing an absent key is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for namespaces that never clear and
    /// `AppError::Db` if the delete fails.
    pub async fn clear(&self, namespace: LedgerNamespace, key: &str) -> Result<()> {
        if !namespace.is_clearable() {
            return Err(AppError::Config(format!(
                "ledger namespace {} cannot be cleared",
                namespace.as_str()
            )));
        }
        sqlx::query("DELETE FROM ledger_flag WHERE namespace = ?1 AND key = ?2")
            .bind(namespace.as_str())
            .bind(key)
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Last processed tracker-comment timestamp, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails or the stored value is out
    /// of range.
    pub async fn watermark(&self) -> Result<Option<DateTime<Utc>>> {
        let value: Option<i64> =
            sqlx::query_scalar("SELECT value_ms FROM watermark WHERE name = ?1")
                .bind(COMMENT_WATERMARK)
                .fetch_optional(self.db.as_ref())
                .await?;
        value
            .map(|ms| {
                Utc.timestamp_millis_opt(ms)
                    .single()
                    .ok_or_else(|| AppError::Db(format!("invalid watermark value: {ms}")))
            })
            .transpose()
    }

    /// Move the watermark forward to `at`. Older values are ignored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the write fails.
    pub async fn advance_watermark(&self, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO watermark (name, value_ms, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET
                value_ms = MAX(watermark.value_ms, excluded.value_ms),
                updated_at = excluded.updated_at",
        )
        .bind(COMMENT_WATERMARK)
        .bind(at.timestamp_millis())
        .bind(Utc::now().to_rfc3339())
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }
}
