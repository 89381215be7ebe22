//! Global configuration parsing, validation, and credential loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::{AppError, Result};

const KEYRING_SERVICE: &str = "helpdesk-bridge";

/// SLA time budgets measured from task creation.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlaConfig {
    /// Hours until work on a task must have started.
    #[serde(default = "default_start_time_hours")]
    pub start_time_hours: u32,
    /// Hours until a task must be resolved.
    #[serde(default = "default_resolution_time_hours")]
    pub resolution_time_hours: u32,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            start_time_hours: default_start_time_hours(),
            resolution_time_hours: default_resolution_time_hours(),
        }
    }
}

fn default_start_time_hours() -> u32 {
    4
}

fn default_resolution_time_hours() -> u32 {
    24
}

/// How the outbound comment watermark advances when a send fails.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WatermarkPolicy {
    /// Advance to the newest comment timestamp observed, even past failures.
    #[default]
    MaxSeen,
    /// Stop just before the oldest comment whose send failed.
    LowestUnsent,
}

/// Application behavior settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    /// Seconds between poll ticks.
    #[serde(default = "default_poll_seconds")]
    pub poll_seconds: u64,
    /// Path of the `SQLite` ledger file.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: PathBuf,
    /// Directory holding email templates; built-in templates when unset.
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,
    /// Prefix of the `[PREFIX-#N]` ticket reference.
    #[serde(default = "default_ticket_prefix")]
    pub ticket_prefix: String,
    /// Stage ids considered done; empty means match by stage name.
    #[serde(default)]
    pub done_stage_ids: Vec<i64>,
    /// Senders whose mail is acknowledged and otherwise ignored.
    #[serde(default)]
    pub excluded_emails: Vec<String>,
    /// Senders that open tickets but never receive customer email.
    #[serde(default)]
    pub no_reply_emails: Vec<String>,
    /// Operator logins eligible for auto-assignment, in priority order.
    #[serde(default)]
    pub operators: Vec<String>,
    /// SLA budgets.
    #[serde(default)]
    pub sla: SlaConfig,
    /// Trailing window for the changed-task snapshot.
    #[serde(default = "default_changed_window_hours")]
    pub changed_window_hours: u32,
    /// Stage names treated as "not yet started" by the SLA evaluator.
    #[serde(default = "default_new_stage_names")]
    pub new_stage_names: Vec<String>,
    /// Extra quote-header phrases appended to the built-in list.
    #[serde(default)]
    pub quote_patterns: Vec<String>,
    /// Watermark advance policy for outbound agent comments.
    #[serde(default)]
    pub watermark_policy: WatermarkPolicy,
    /// Enable debug-level logging when `RUST_LOG` is unset.
    #[serde(default)]
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            poll_seconds: default_poll_seconds(),
            ledger_path: default_ledger_path(),
            templates_dir: None,
            ticket_prefix: default_ticket_prefix(),
            done_stage_ids: Vec::new(),
            excluded_emails: Vec::new(),
            no_reply_emails: Vec::new(),
            operators: Vec::new(),
            sla: SlaConfig::default(),
            changed_window_hours: default_changed_window_hours(),
            new_stage_names: default_new_stage_names(),
            quote_patterns: Vec::new(),
            watermark_policy: WatermarkPolicy::default(),
            debug: false,
        }
    }
}

fn default_poll_seconds() -> u64 {
    20
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("state/ledger.db")
}

fn default_ticket_prefix() -> String {
    "TICKET".into()
}

fn default_changed_window_hours() -> u32 {
    48
}

fn default_new_stage_names() -> Vec<String> {
    ["new", "nový", "draft", "návrh", "backlog"]
        .into_iter()
        .map(str::to_owned)
        .collect()
}

fn default_timeout_seconds() -> u64 {
    20
}

/// Stage ids used by the bridge when moving tasks.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct StageConfig {
    /// Stage for freshly created and reopened tasks.
    #[serde(default)]
    pub new: i64,
    /// Stage set after auto-assignment; `0` leaves the stage alone.
    #[serde(default)]
    pub assigned: i64,
    /// Work-in-progress stage.
    #[serde(default)]
    pub in_progress: i64,
    /// Done stage.
    #[serde(default)]
    pub done: i64,
}

/// Task tracker (JSON-RPC) connectivity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TrackerConfig {
    /// RPC endpoint base URL.
    #[serde(default)]
    pub url: String,
    /// Database name.
    #[serde(default)]
    pub db: String,
    /// Login of the integration user.
    #[serde(default)]
    pub username: String,
    /// Password (populated at runtime).
    #[serde(skip)]
    pub password: String,
    /// Project receiving helpdesk tasks.
    #[serde(default)]
    pub project_id: i64,
    /// Public base URL for task links; falls back to `url`.
    #[serde(default)]
    pub base_url: String,
    /// Per-request timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Stage ids.
    #[serde(default)]
    pub stages: StageConfig,
}

impl TrackerConfig {
    /// Base URL used when building task links.
    #[must_use]
    pub fn link_base(&self) -> &str {
        if self.base_url.is_empty() {
            &self.url
        } else {
            &self.base_url
        }
    }
}

/// Slack notification settings. Both fields empty disables chat.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SlackConfig {
    /// Channel for new-ticket posts and their threads.
    #[serde(default)]
    pub channel_id: String,
    /// Incoming webhook used when no bot token is available.
    #[serde(default)]
    pub webhook_url: String,
    /// Bot user token (populated at runtime).
    #[serde(skip)]
    pub bot_token: String,
}

/// IMAP mailbox settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ImapConfig {
    /// Server host name.
    #[serde(default)]
    pub host: String,
    /// Implicit-TLS port.
    #[serde(default = "default_imap_port")]
    pub port: u16,
    /// Mailbox login.
    #[serde(default)]
    pub username: String,
    /// Password (populated at runtime).
    #[serde(skip)]
    pub password: String,
    /// Folder to poll.
    #[serde(default = "default_folder")]
    pub folder: String,
    /// Only fetch mail addressed to this recipient.
    #[serde(default)]
    pub search_to: String,
    /// Extra keyword set on processed messages.
    #[serde(default)]
    pub processed_keyword: String,
    /// Per-command timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Upper bound on messages fetched in one poll.
    #[serde(default = "default_max_messages_per_poll")]
    pub max_messages_per_poll: usize,
}

fn default_max_messages_per_poll() -> usize {
    25
}

fn default_imap_port() -> u16 {
    993
}

fn default_folder() -> String {
    "INBOX".into()
}

/// SMTP submission settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SmtpConfig {
    /// Server host name.
    #[serde(default)]
    pub host: String,
    /// Port; 587 uses STARTTLS, anything else implicit TLS.
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    /// Login; empty sends without authentication.
    #[serde(default)]
    pub username: String,
    /// Password (populated at runtime).
    #[serde(skip)]
    pub password: String,
    /// Display name of the sender.
    #[serde(default)]
    pub from_name: String,
    /// Sender address.
    #[serde(default)]
    pub from_email: String,
    /// Per-send timeout.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_smtp_port() -> u16 {
    587
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Application behavior.
    #[serde(default)]
    pub app: AppConfig,
    /// Task tracker connectivity.
    pub tracker: TrackerConfig,
    /// Slack notifications.
    #[serde(default)]
    pub slack: SlackConfig,
    /// Inbound mailbox.
    pub imap: ImapConfig,
    /// Outbound mail.
    pub smtp: SmtpConfig,
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load secrets from OS keychain with env-var fallback.
    ///
    /// The tracker and IMAP passwords are required. The SMTP password is
    /// required only when `smtp.username` is set, and the Slack bot token
    /// is optional.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required credential is missing.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.tracker.password = load_credential("tracker_password", "TRACKER_PASSWORD").await?;
        self.imap.password = load_credential("imap_password", "IMAP_PASSWORD").await?;
        if !self.smtp.username.is_empty() {
            self.smtp.password = load_credential("smtp_password", "SMTP_PASSWORD").await?;
        }
        self.slack.bot_token = load_credential("slack_bot_token", "SLACK_BOT_TOKEN")
            .await
            .unwrap_or_default();
        Ok(())
    }

    /// Poll interval as a [`Duration`].
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.app.poll_seconds)
    }

    /// Trailing window for the changed-task snapshot.
    #[must_use]
    pub fn changed_window(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.app.changed_window_hours))
    }

    /// Whether `email` is on the excluded sender list.
    #[must_use]
    pub fn is_excluded(&self, email: &str) -> bool {
        contains_address(&self.app.excluded_emails, email)
    }

    /// Whether `email` must never receive customer-facing mail.
    #[must_use]
    pub fn is_no_reply(&self, email: &str) -> bool {
        contains_address(&self.app.no_reply_emails, email)
    }

    fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        let required = [
            ("tracker.url", self.tracker.url.is_empty()),
            ("tracker.db", self.tracker.db.is_empty()),
            ("tracker.username", self.tracker.username.is_empty()),
            ("tracker.project_id", self.tracker.project_id == 0),
            ("tracker.stages.new", self.tracker.stages.new == 0),
            ("imap.host", self.imap.host.is_empty()),
            ("imap.username", self.imap.username.is_empty()),
            ("smtp.host", self.smtp.host.is_empty()),
            ("smtp.from_email", self.smtp.from_email.is_empty()),
        ];
        for (field, absent) in required {
            if absent {
                missing.push(field);
            }
        }
        if !missing.is_empty() {
            return Err(AppError::Config(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }

        if self.app.poll_seconds == 0 {
            return Err(AppError::Config(
                "app.poll_seconds must be greater than zero".into(),
            ));
        }

        if self.app.ticket_prefix.trim().is_empty() {
            return Err(AppError::Config("app.ticket_prefix must not be blank".into()));
        }

        Ok(())
    }
}

fn contains_address(list: &[String], email: &str) -> bool {
    list.iter().any(|entry| entry.eq_ignore_ascii_case(email.trim()))
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<String> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.is_empty() => return Ok(value),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            warn!(
                key = keyring_key,
                ?err,
                "keychain lookup failed, trying env var"
            );
        }
    }

    match env::var(env_key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Config(format!(
            "credential {keyring_key} not found in keychain or {env_key} env var"
        ))),
    }
}
