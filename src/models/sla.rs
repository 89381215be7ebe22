//! SLA tracking state per task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::TaskId;

/// Which SLA budget was exceeded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlaBreach {
    /// Work did not start in time.
    Start,
    /// Task was not resolved in time.
    Resolution,
}

impl SlaBreach {
    /// Label written into the tracker note.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Start => "SLA_START_BREACH",
            Self::Resolution => "SLA_RESOLUTION_BREACH",
        }
    }
}

/// Persisted SLA state for one task.
///
/// Breach flags never revert to `false`; `started_at` and `completed_at`
/// are written at most once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlaState {
    /// Tracker task id.
    pub task_id: TaskId,
    /// When tracking began.
    pub created_at: DateTime<Utc>,
    /// First time the task was seen outside a "new" stage.
    pub started_at: Option<DateTime<Utc>>,
    /// First time the task was seen done.
    pub completed_at: Option<DateTime<Utc>>,
    /// Start budget exceeded.
    pub start_breach: bool,
    /// Resolution budget exceeded.
    pub resolution_breach: bool,
}

impl SlaState {
    /// Fresh state for a task first observed at `created_at`.
    #[must_use]
    pub fn new(task_id: TaskId, created_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            created_at,
            started_at: None,
            completed_at: None,
            start_breach: false,
            resolution_breach: false,
        }
    }
}
