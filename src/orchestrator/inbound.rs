//! Inbound mail pass: new tickets and customer replies.

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::assignment::auto_assign;
use super::context::BridgeContext;
use super::emails::{send_templated, NewTicketVars};
use crate::gateway::TemplateName;
use crate::mail::{extract_ticket_id, strip_quoted_reply};
use crate::models::email::Email;
use crate::models::task::{NewTask, TaskId};
use crate::persistence::ledger::LedgerNamespace;
use crate::slack::blocks::{self, TicketStatus, TicketSummary};
use crate::Result;

const DEFAULT_TITLE: &str = "New request";
const EMPTY_REPLY: &str = "(empty message)";

/// Fetch unseen mail and handle each message.
///
/// # Errors
///
/// Returns the mailbox error when fetching fails; per-message failures
/// are logged and skipped.
pub async fn run(
    ctx: &BridgeContext,
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> Result<()> {
    let emails = ctx.gateways.mailbox.fetch_unseen().await?;
    debug!(count = emails.len(), "fetched unseen messages");

    for email in &emails {
        if cancel.is_cancelled() {
            debug!("inbound pass cancelled");
            break;
        }
        if let Err(err) = process(ctx, email, now).await {
            error!(email_id = %email.id, %err, "inbound message left for retry");
        }
    }
    Ok(())
}

/// Handle one message.
///
/// # Errors
///
/// Returns an error when the ledger cannot be read or written, or when
/// the task for a new request cannot be created. The message is then
/// neither marked processed nor seen.
pub async fn process(ctx: &BridgeContext, email: &Email, now: DateTime<Utc>) -> Result<()> {
    if ctx
        .ledger
        .has(LedgerNamespace::ProcessedEmail, &email.id)
        .await?
    {
        debug!(email_id = %email.id, "already processed, marking seen again");
        mark_seen(ctx, email).await;
        return Ok(());
    }

    if ctx.config.is_excluded(&email.from_email) {
        info!(email_id = %email.id, from = %email.from_email, "skipping excluded sender");
        return finish(ctx, email).await;
    }

    match extract_ticket_id(&email.subject, &ctx.config.app.ticket_prefix)
        .and_then(|id| TaskId::try_from(id).ok())
    {
        Some(task_id) => handle_reply(ctx, email, task_id).await?,
        None => handle_new_request(ctx, email, now).await?,
    }
    finish(ctx, email).await
}

async fn finish(ctx: &BridgeContext, email: &Email) -> Result<()> {
    ctx.ledger
        .mark(LedgerNamespace::ProcessedEmail, &email.id)
        .await?;
    mark_seen(ctx, email).await;
    Ok(())
}

async fn mark_seen(ctx: &BridgeContext, email: &Email) {
    if let Err(err) = ctx.gateways.mailbox.mark_seen(email).await {
        warn!(email_id = %email.id, %err, "failed to mark message seen");
    }
}

async fn resolve_customer(ctx: &BridgeContext, email: &Email) -> Option<i64> {
    match ctx
        .tracker()
        .find_or_create_customer(&email.from_email, &email.from_name)
        .await
    {
        Ok(id) => Some(id),
        Err(err) => {
            warn!(from = %email.from_email, %err, "customer lookup failed");
            None
        }
    }
}

async fn upload_attachments(ctx: &BridgeContext, email: &Email, task_id: TaskId) {
    for attachment in &email.attachments {
        match ctx.tracker().upload_attachment(task_id, attachment).await {
            Ok(stored) => {
                debug!(task_id, attachment_id = stored.id, filename = %attachment.filename, "attachment uploaded");
            }
            Err(err) => {
                warn!(task_id, filename = %attachment.filename, %err, "attachment upload failed");
            }
        }
    }
}

async fn handle_reply(ctx: &BridgeContext, email: &Email, task_id: TaskId) -> Result<()> {
    info!(email_id = %email.id, task_id, "customer reply to existing ticket");

    match ctx.tracker().get_task(task_id).await {
        Ok(task) if task.is_done(&ctx.config.app.done_stage_ids) => {
            reopen(ctx, task_id, &task.name, &task.url).await?;
        }
        Ok(_) => {}
        Err(err) => warn!(task_id, %err, "could not load task for reopen check"),
    }

    let author = resolve_customer(ctx, email).await;
    let stripped = strip_quoted_reply(&email.body, &ctx.quote_patterns);
    let body = if stripped.trim().is_empty() {
        EMPTY_REPLY
    } else {
        stripped.as_str()
    };
    if let Err(err) = ctx.tracker().add_comment(task_id, body, author).await {
        error!(task_id, %err, "failed to post customer reply");
    }
    upload_attachments(ctx, email, task_id).await;
    Ok(())
}

/// Move a done task back to the new stage after a customer reply.
///
/// Tracker failures are logged; only a ledger failure is returned.
async fn reopen(ctx: &BridgeContext, task_id: TaskId, title: &str, url: &str) -> Result<()> {
    if let Err(err) = ctx
        .tracker()
        .set_stage(task_id, ctx.config.tracker.stages.new)
        .await
    {
        error!(task_id, %err, "failed to reopen task");
        return Ok(());
    }
    info!(task_id, "task reopened by customer reply");

    if let Err(err) = ctx
        .tracker()
        .post_note(task_id, "[SYSTEM] Task reopened after customer reply")
        .await
    {
        warn!(task_id, %err, "failed to post reopen note");
    }

    let operator = match auto_assign(ctx, task_id).await {
        Ok(operator) => operator,
        Err(err) => {
            warn!(task_id, %err, "auto assignment of reopened task failed");
            None
        }
    };

    ctx.notify_thread(task_id, |ticket_ref| {
        (
            blocks::head_status(
                TicketStatus::Reopened,
                ticket_ref,
                title,
                url,
                operator.as_deref(),
            ),
            blocks::reopened_note(true),
        )
    })
    .await;

    ctx.ledger
        .mark(LedgerNamespace::ReopenedNotified, &task_id.to_string())
        .await
}

async fn handle_new_request(
    ctx: &BridgeContext,
    email: &Email,
    now: DateTime<Utc>,
) -> Result<()> {
    let title = if email.subject.trim().is_empty() {
        DEFAULT_TITLE.to_owned()
    } else {
        email.subject.trim().to_owned()
    };
    let stripped = strip_quoted_reply(&email.body, &ctx.quote_patterns);
    let description = if stripped.is_empty() {
        email.body.clone()
    } else {
        stripped
    };

    let customer_id = resolve_customer(ctx, email).await;
    let task_id = ctx
        .tracker()
        .create_task(&NewTask {
            name: title.clone(),
            description: description.clone(),
            customer_id,
            stage_id: ctx.config.tracker.stages.new,
        })
        .await?;
    info!(email_id = %email.id, task_id, "created task for new request");

    upload_attachments(ctx, email, task_id).await;

    let operator = match auto_assign(ctx, task_id).await {
        Ok(operator) => operator,
        Err(err) => {
            warn!(task_id, %err, "auto assignment failed");
            None
        }
    };

    let ticket_ref = ctx.ticket_ref(task_id);
    let url = task_url(ctx, task_id).await;
    announce(
        ctx,
        &TicketSummary {
            ticket_ref: &ticket_ref,
            task_id,
            title: &title,
            customer: &email.from_name,
            body: &description,
            assignee: operator.as_deref(),
            created_at: now,
            url: &url,
        },
    )
    .await;

    if let Err(err) = ctx.sla_monitor().initialize(task_id, now).await {
        warn!(task_id, %err, "failed to initialize sla tracking");
    }

    if ctx.config.is_no_reply(&email.from_email) {
        debug!(task_id, from = %email.from_email, "no-reply sender, skipping confirmation");
        return Ok(());
    }
    let vars = NewTicketVars {
        ticket_ref: &ticket_ref,
        ticket_prefix: &ctx.config.app.ticket_prefix,
        task_id,
        customer_name: &email.from_name,
        sla_start_hours: ctx.config.app.sla.start_time_hours,
        sla_resolution_hours: ctx.config.app.sla.resolution_time_hours,
        original_body: &description,
    };
    let sent =
        send_templated(ctx, &email.from_email, TemplateName::NewTicket, &vars, Vec::new()).await;
    if let Err(err) = sent {
        error!(task_id, to = %email.from_email, %err, "failed to send confirmation");
    }
    Ok(())
}

async fn task_url(ctx: &BridgeContext, task_id: TaskId) -> String {
    match ctx.tracker().get_task(task_id).await {
        Ok(task) => task.url,
        Err(err) => {
            debug!(task_id, %err, "task link unavailable");
            String::new()
        }
    }
}

async fn announce(ctx: &BridgeContext, summary: &TicketSummary<'_>) {
    let Some(chat) = ctx.chat() else {
        return;
    };
    let task_id = summary.task_id;
    let thread = match chat.post_new(&blocks::new_ticket(summary)).await {
        Ok(Some(thread)) => thread,
        Ok(None) => return,
        Err(err) => {
            warn!(task_id, %err, "failed to post new ticket to chat");
            return;
        }
    };
    if let Err(err) = ctx.threads.store(task_id, &thread).await {
        warn!(task_id, %err, "failed to store chat thread");
    }
    if summary.assignee.is_some() {
        let note = blocks::assigned_note(summary.assignee);
        if let Err(err) = chat.post_to_thread(&thread, &note).await {
            warn!(task_id, %err, "failed to post assignment note");
        }
    }
}
