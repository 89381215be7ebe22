use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{evaluate, SlaPolicy};
use crate::gateway::{ChatGateway, TaskTrackerGateway};
use crate::models::sla::{SlaBreach, SlaState};
use crate::models::task::{Task, TaskId};
use crate::persistence::sla_repo::SlaRepo;
use crate::persistence::thread_repo::ThreadRepo;
use crate::slack::blocks;
use crate::Result;

/// Persists SLA state and raises breach notifications.
pub struct SlaMonitor<'a> {
    /// SLA state storage.
    pub repo: &'a SlaRepo,
    /// Chat thread lookup for breach notifications.
    pub threads: &'a ThreadRepo,
    /// Tracker receiving breach notes.
    pub tracker: &'a dyn TaskTrackerGateway,
    /// Chat, when configured.
    pub chat: Option<&'a dyn ChatGateway>,
    /// Budgets and stage rules.
    pub policy: &'a SlaPolicy,
}

impl SlaMonitor<'_> {
    /// Start tracking a new task. An existing state is kept.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the state cannot be stored.
    pub async fn initialize(&self, task_id: TaskId, now: DateTime<Utc>) -> Result<()> {
        self.repo.insert_if_absent(&SlaState::new(task_id, now)).await
    }

    /// Evaluate every task in `tasks`, stopping early on cancellation.
    pub async fn run(&self, tasks: &[Task], now: DateTime<Utc>, cancel: &CancellationToken) {
        for task in tasks {
            if cancel.is_cancelled() {
                debug!("sla pass cancelled");
                return;
            }
            if let Err(err) = self.evaluate_task(task, now).await {
                error!(task_id = task.id, %err, "sla evaluation failed");
            }
        }
    }

    /// Evaluate one task. Notifications are sent only after the new state
    /// is stored.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if state cannot be read or written; no
    /// notification is sent in that case.
    pub async fn evaluate_task(&self, task: &Task, now: DateTime<Utc>) -> Result<()> {
        let current = self.repo.get(task.id).await?;
        let outcome = evaluate(current, task, now, self.policy);
        if !outcome.changed {
            return Ok(());
        }
        self.repo.upsert(&outcome.state).await?;

        for breach in outcome.breaches {
            warn!(task_id = task.id, label = breach.label(), "sla breached");
            self.notify(task, breach).await;
        }
        Ok(())
    }

    async fn notify(&self, task: &Task, breach: SlaBreach) {
        let note = format!("[SYSTEM] SLA Label: {}", breach.label());
        if let Err(err) = self.tracker.post_note(task.id, &note).await {
            warn!(task_id = task.id, %err, "failed to post sla note");
        }

        let Some(chat) = self.chat else {
            return;
        };
        let thread = match self.threads.get(task.id).await {
            Ok(Some(thread)) => thread,
            Ok(None) => return,
            Err(err) => {
                warn!(task_id = task.id, %err, "failed to load chat thread");
                return;
            }
        };
        let text = blocks::sla_breach_note(breach, self.policy.budget_hours(breach));
        match chat.post_to_thread(&thread, &text).await {
            Ok(()) => info!(task_id = task.id, label = breach.label(), "sla breach announced"),
            Err(err) => warn!(task_id = task.id, %err, "failed to announce sla breach"),
        }
    }
}
