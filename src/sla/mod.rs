//! Service-level tracking.
//!
//! [`evaluate`] is the pure transition on [`SlaState`]; [`SlaMonitor`]
//! persists the result and raises breach notifications.

mod monitor;

pub use monitor::SlaMonitor;

use chrono::{DateTime, Duration, Utc};

use crate::config::GlobalConfig;
use crate::models::sla::{SlaBreach, SlaState};
use crate::models::task::Task;

/// Budgets and stage classification used by the evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaPolicy {
    /// Time allowed before work must start.
    pub start_budget: Duration,
    /// Time allowed before the task must be done.
    pub resolution_budget: Duration,
    /// Configured "new" stage id.
    pub new_stage_id: i64,
    /// Stage names treated as "new".
    pub new_stage_names: Vec<String>,
    /// Stage ids treated as done; empty uses name keywords.
    pub done_stage_ids: Vec<i64>,
}

impl SlaPolicy {
    /// Derive the policy from application config.
    #[must_use]
    pub fn from_config(config: &GlobalConfig) -> Self {
        Self {
            start_budget: Duration::hours(i64::from(config.app.sla.start_time_hours)),
            resolution_budget: Duration::hours(i64::from(config.app.sla.resolution_time_hours)),
            new_stage_id: config.tracker.stages.new,
            new_stage_names: config.app.new_stage_names.clone(),
            done_stage_ids: config.app.done_stage_ids.clone(),
        }
    }

    /// Budget length in whole hours, for notification text.
    #[must_use]
    pub fn budget_hours(&self, breach: SlaBreach) -> u32 {
        let budget = match breach {
            SlaBreach::Start => self.start_budget,
            SlaBreach::Resolution => self.resolution_budget,
        };
        u32::try_from(budget.num_hours()).unwrap_or(u32::MAX)
    }
}

/// Result of one evaluation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    /// State after the step.
    pub state: SlaState,
    /// Breaches first detected in this step, start before resolution.
    pub breaches: Vec<SlaBreach>,
    /// Whether `state` differs from the input.
    pub changed: bool,
}

/// Advance `state` for `task` as observed at `now`.
///
/// A missing state is created with `created_at = now`. Timestamps are
/// written once and breach flags only ever turn on.
#[must_use]
pub fn evaluate(
    state: Option<SlaState>,
    task: &Task,
    now: DateTime<Utc>,
    policy: &SlaPolicy,
) -> Evaluation {
    let (mut next, mut changed) = match state {
        Some(existing) => (existing, false),
        None => (SlaState::new(task.id, now), true),
    };
    let mut breaches = Vec::new();

    if next.started_at.is_none() && !task.is_new(policy.new_stage_id, &policy.new_stage_names) {
        next.started_at = Some(now);
        changed = true;
    }
    if next.completed_at.is_none() && task.is_done(&policy.done_stage_ids) {
        next.completed_at = Some(now);
        changed = true;
    }

    if next.started_at.is_none()
        && !next.start_breach
        && now > next.created_at + policy.start_budget
    {
        next.start_breach = true;
        breaches.push(SlaBreach::Start);
        changed = true;
    }
    if next.completed_at.is_none()
        && !next.resolution_breach
        && now > next.created_at + policy.resolution_budget
    {
        next.resolution_breach = true;
        breaches.push(SlaBreach::Resolution);
        changed = true;
    }

    Evaluation {
        state: next,
        breaches,
        changed,
    }
}
