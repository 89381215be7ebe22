//! Shared dependencies for one correlator.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::GlobalConfig;
use crate::gateway::{
    ChatGateway, MailboxGateway, MailerGateway, TaskTrackerGateway, TemplateRenderer,
};
use crate::mail::{format_ticket_reference, QuotePatterns};
use crate::models::task::TaskId;
use crate::persistence::db::Database;
use crate::persistence::ledger::DedupLedger;
use crate::persistence::sla_repo::SlaRepo;
use crate::persistence::thread_repo::ThreadRepo;
use crate::sla::{SlaMonitor, SlaPolicy};

/// External collaborators injected into the correlator.
#[derive(Clone)]
pub struct Gateways {
    /// Inbound mail source.
    pub mailbox: Arc<dyn MailboxGateway>,
    /// Task tracker.
    pub tracker: Arc<dyn TaskTrackerGateway>,
    /// Team chat; `None` disables chat notifications.
    pub chat: Option<Arc<dyn ChatGateway>>,
    /// Outbound mail transport.
    pub mailer: Arc<dyn MailerGateway>,
    /// Email template renderer.
    pub renderer: Arc<dyn TemplateRenderer>,
}

/// Everything a tick needs, built once at startup.
pub struct BridgeContext {
    /// Loaded configuration.
    pub config: Arc<GlobalConfig>,
    /// Idempotency flags and the comment watermark.
    pub ledger: DedupLedger,
    /// Per-task SLA state.
    pub sla_repo: SlaRepo,
    /// Per-task chat thread references.
    pub threads: ThreadRepo,
    /// External collaborators.
    pub gateways: Gateways,
    /// Reply-quote detection rules.
    pub quote_patterns: QuotePatterns,
    /// SLA budgets and stage rules.
    pub sla_policy: SlaPolicy,
}

impl BridgeContext {
    /// Wire the context over an open ledger database.
    #[must_use]
    pub fn new(config: Arc<GlobalConfig>, db: Arc<Database>, gateways: Gateways) -> Self {
        let quote_patterns = QuotePatterns::with_extra(&config.app.quote_patterns);
        let sla_policy = SlaPolicy::from_config(&config);
        Self {
            ledger: DedupLedger::new(Arc::clone(&db)),
            sla_repo: SlaRepo::new(Arc::clone(&db)),
            threads: ThreadRepo::new(db),
            config,
            gateways,
            quote_patterns,
            sla_policy,
        }
    }

    /// Tracker handle.
    #[must_use]
    pub fn tracker(&self) -> &dyn TaskTrackerGateway {
        self.gateways.tracker.as_ref()
    }

    /// Chat handle, when configured.
    #[must_use]
    pub fn chat(&self) -> Option<&dyn ChatGateway> {
        self.gateways.chat.as_deref()
    }

    /// SLA monitor over this context's storage and gateways.
    #[must_use]
    pub fn sla_monitor(&self) -> SlaMonitor<'_> {
        SlaMonitor {
            repo: &self.sla_repo,
            threads: &self.threads,
            tracker: self.tracker(),
            chat: self.chat(),
            policy: &self.sla_policy,
        }
    }

    /// Canonical subject token for `task_id`.
    #[must_use]
    pub fn ticket_ref(&self, task_id: TaskId) -> String {
        format_ticket_reference(
            &self.config.app.ticket_prefix,
            u64::try_from(task_id).unwrap_or_default(),
        )
    }

    /// Edit the head message and add a thread note, when a thread exists.
    ///
    /// `texts` receives the ticket reference and returns the new head
    /// text and the note. Chat failures are logged.
    pub async fn notify_thread<F>(&self, task_id: TaskId, texts: F)
    where
        F: FnOnce(&str) -> (String, String),
    {
        let Some(chat) = self.chat() else {
            return;
        };
        let thread = match self.threads.get(task_id).await {
            Ok(Some(thread)) => thread,
            Ok(None) => {
                debug!(task_id, "no chat thread for task");
                return;
            }
            Err(err) => {
                warn!(task_id, %err, "failed to load chat thread");
                return;
            }
        };
        let (head, note) = texts(&self.ticket_ref(task_id));
        if let Err(err) = chat.update_message(&thread, &head).await {
            warn!(task_id, %err, "failed to update chat head message");
        }
        if let Err(err) = chat.post_to_thread(&thread, &note).await {
            warn!(task_id, %err, "failed to post chat thread note");
        }
    }
}
