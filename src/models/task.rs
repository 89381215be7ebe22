//! Task tracker projections used by the correlator.
//!
//! These types are read-mostly snapshots refreshed every tick; the tracker
//! stays authoritative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tracker-side task identifier.
pub type TaskId = i64;

/// Stage names treated as done when no stage ids are configured.
const DONE_STAGE_KEYWORDS: [&str; 4] = ["done", "resolved", "closed", "hotovo"];

const PUBLIC_PREFIX: &str = "[public]";

/// A workflow stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Stage {
    /// Stage id.
    pub id: i64,
    /// Display name.
    pub name: String,
}

/// Snapshot of a tracker task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    /// Task id.
    pub id: TaskId,
    /// Title.
    pub name: String,
    /// Current stage.
    pub stage: Stage,
    /// Customer contact address, if linked.
    pub customer_email: Option<String>,
    /// Customer display name, if linked.
    pub customer_name: Option<String>,
    /// Assigned agent user id.
    pub assignee_id: Option<i64>,
    /// Assigned agent display name.
    pub assignee_name: Option<String>,
    /// Browser link to the task.
    pub url: String,
}

impl Task {
    /// Done predicate.
    ///
    /// With configured done-stage ids the stage id must be listed; otherwise
    /// the stage name is matched against well-known "done" words.
    #[must_use]
    pub fn is_done(&self, done_stage_ids: &[i64]) -> bool {
        if !done_stage_ids.is_empty() {
            return done_stage_ids.contains(&self.stage.id);
        }
        let name = self.stage.name.to_lowercase();
        DONE_STAGE_KEYWORDS.iter().any(|kw| name.contains(kw))
    }

    /// Whether the task still sits in a "not started" stage.
    #[must_use]
    pub fn is_new(&self, new_stage_id: i64, new_stage_names: &[String]) -> bool {
        if new_stage_id != 0 && self.stage.id == new_stage_id {
            return true;
        }
        let name = self.stage.name.trim().to_lowercase();
        new_stage_names.iter().any(|n| n.to_lowercase() == name)
    }

    /// Customer address when it is usable for outbound mail.
    #[must_use]
    pub fn customer_address(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }

    /// Customer name for greetings, falling back to the address.
    #[must_use]
    pub fn customer_display_name(&self) -> String {
        self.customer_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| self.customer_address().map(str::to_owned))
            .unwrap_or_default()
    }
}

/// Chatter entry type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    /// Human-written comment.
    Comment,
    /// System generated notification.
    Notification,
}

/// A message on a task's chatter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskComment {
    /// Tracker message id.
    pub id: i64,
    /// Owning task.
    pub task_id: TaskId,
    /// Body converted to plain text.
    pub body: String,
    /// Posting time.
    pub date: DateTime<Utc>,
    /// Author has an active agent account.
    pub by_agent: bool,
    /// Entry type.
    pub kind: CommentKind,
}

impl TaskComment {
    /// Body without the `[public]` marker, or `None` for internal comments.
    #[must_use]
    pub fn public_body(&self) -> Option<String> {
        let trimmed = self.body.trim();
        let head = trimmed.get(..PUBLIC_PREFIX.len())?;
        if !head.eq_ignore_ascii_case(PUBLIC_PREFIX) {
            return None;
        }
        Some(trimmed[PUBLIC_PREFIX.len()..].trim().to_owned())
    }
}

/// Server-side narrowing for comment listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommentFilter {
    /// Only this entry type; `None` returns all.
    pub kind: Option<CommentKind>,
}

impl CommentFilter {
    /// Human comments only.
    #[must_use]
    pub fn comments() -> Self {
        Self {
            kind: Some(CommentKind::Comment),
        }
    }
}

/// Fields for a task created from inbound mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Title.
    pub name: String,
    /// Description (plain text).
    pub description: String,
    /// Linked customer, if one was resolved.
    pub customer_id: Option<i64>,
    /// Initial stage.
    pub stage_id: i64,
}

/// Attachment metadata stored on the tracker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrackerAttachment {
    /// Attachment id.
    pub id: i64,
    /// Filename.
    pub name: String,
    /// MIME type.
    pub mime_type: String,
    /// Size in bytes.
    pub size: i64,
}
