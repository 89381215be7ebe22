#![forbid(unsafe_code)]

//! `helpdesk-bridge` binary.
//!
//! Loads configuration and credentials, opens the ledger, authenticates
//! with the tracker, wires the gateways and runs the poll loop until
//! SIGINT or SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use helpdesk_bridge::config::GlobalConfig;
use helpdesk_bridge::gateway::imap::ImapMailbox;
use helpdesk_bridge::gateway::odoo::OdooClient;
use helpdesk_bridge::gateway::smtp::SmtpMailer;
use helpdesk_bridge::gateway::{ChatGateway, TemplateRenderer};
use helpdesk_bridge::orchestrator::scheduler::spawn_poll_task;
use helpdesk_bridge::orchestrator::{BridgeContext, Gateways};
use helpdesk_bridge::persistence::db;
use helpdesk_bridge::slack::SlackChat;
use helpdesk_bridge::templates::MiniJinjaRenderer;
use helpdesk_bridge::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "helpdesk-bridge", about = "Email to helpdesk bridge", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let config = GlobalConfig::load_from_path(&args.config)?;
    init_tracing(args.log_format, config.app.debug)?;
    info!(config = %args.config.display(), "helpdesk-bridge bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(config))
}

async fn run(mut config: GlobalConfig) -> Result<()> {
    // ── Credentials ─────────────────────────────────────
    config.load_credentials().await?;
    let config = Arc::new(config);
    info!("configuration loaded");

    // ── Ledger ──────────────────────────────────────────
    let db = Arc::new(db::connect(&config.app.ledger_path).await?);
    info!(path = %config.app.ledger_path.display(), "ledger opened");

    // ── Gateways ────────────────────────────────────────
    let tracker = OdooClient::connect(&config.tracker).await.map_err(|err| {
        error!(%err, "tracker authentication failed");
        err
    })?;
    let mailer = SmtpMailer::new(&config.smtp)?;
    let renderer: Arc<dyn TemplateRenderer> = match &config.app.templates_dir {
        Some(dir) => Arc::new(MiniJinjaRenderer::from_dir(dir)?),
        None => Arc::new(MiniJinjaRenderer::builtin()),
    };
    let chat_timeout = Duration::from_secs(config.tracker.timeout_seconds.max(1));
    let chat = SlackChat::from_config(&config.slack, chat_timeout)?
        .map(|chat| Arc::new(chat) as Arc<dyn ChatGateway>);
    if chat.is_none() {
        info!("slack not configured; chat notifications disabled");
    }

    let gateways = Gateways {
        mailbox: Arc::new(ImapMailbox::new(config.imap.clone())),
        tracker: Arc::new(tracker),
        chat,
        mailer: Arc::new(mailer),
        renderer,
    };
    let ctx = Arc::new(BridgeContext::new(Arc::clone(&config), db, gateways));

    // ── Poll loop ───────────────────────────────────────
    let ct = CancellationToken::new();
    let poll_handle = spawn_poll_task(ctx, config.poll_interval(), ct.clone());
    info!(interval_secs = config.app.poll_seconds, "poll loop started");

    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    if let Err(err) = poll_handle.await {
        error!(%err, "poll task ended abnormally");
    }
    info!("helpdesk-bridge shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat, debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = fmt().with_env_filter(env_filter);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
