//! Completion and reopen announcements over the changed-task window.

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::BridgeContext;
use super::emails::{send_templated, TicketClosedVars};
use crate::gateway::TemplateName;
use crate::models::task::Task;
use crate::persistence::ledger::LedgerNamespace;
use crate::slack::blocks::{self, TicketStatus};
use crate::Result;

/// Announce newly completed tasks to chat and the customer.
///
/// A task is flagged closed-notified only once the closure email went
/// out (or the customer is a no-reply address).
pub async fn run_completed(ctx: &BridgeContext, tasks: &[Task], cancel: &CancellationToken) {
    for task in tasks {
        if cancel.is_cancelled() {
            debug!("completion pass cancelled");
            return;
        }
        if let Err(err) = complete(ctx, task).await {
            error!(task_id = task.id, %err, "completion handling failed");
        }
    }
}

async fn complete(ctx: &BridgeContext, task: &Task) -> Result<()> {
    if !task.is_done(&ctx.config.app.done_stage_ids) {
        return Ok(());
    }
    let key = task.id.to_string();
    if ctx.ledger.has(LedgerNamespace::ClosedNotified, &key).await? {
        return Ok(());
    }
    let Some(to) = task.customer_address() else {
        debug!(task_id = task.id, "done task has no customer address, skipping");
        return Ok(());
    };
    info!(task_id = task.id, "task completed");

    ctx.notify_thread(task.id, |ticket_ref| {
        (
            blocks::head_status(
                TicketStatus::Completed,
                ticket_ref,
                &task.name,
                &task.url,
                task.assignee_name.as_deref(),
            ),
            blocks::completed_note(task.assignee_name.as_deref()),
        )
    })
    .await;

    if ctx.config.is_no_reply(to) {
        debug!(task_id = task.id, to, "no-reply customer, closure not emailed");
    } else {
        let ticket_ref = ctx.ticket_ref(task.id);
        let customer_name = task.customer_display_name();
        let vars = TicketClosedVars {
            ticket_ref: &ticket_ref,
            ticket_prefix: &ctx.config.app.ticket_prefix,
            task_id: task.id,
            customer_name: &customer_name,
            task_url: &task.url,
        };
        let sent = send_templated(ctx, to, TemplateName::TicketClosed, &vars, Vec::new()).await;
        if let Err(err) = sent {
            warn!(task_id = task.id, %err, "failed to send closure email, will retry");
            return Ok(());
        }
        info!(task_id = task.id, to, "closure email sent");
    }

    ctx.ledger.mark(LedgerNamespace::ClosedNotified, &key).await?;
    ctx.ledger
        .clear(LedgerNamespace::ReopenedNotified, &key)
        .await
}

/// Announce tasks that left a done stage after their closure was announced.
pub async fn run_reopened(ctx: &BridgeContext, tasks: &[Task], cancel: &CancellationToken) {
    for task in tasks {
        if cancel.is_cancelled() {
            debug!("reopen pass cancelled");
            return;
        }
        if let Err(err) = reopened(ctx, task).await {
            error!(task_id = task.id, %err, "reopen handling failed");
        }
    }
}

/// Closed-notified is cleared once the reopen is recorded, so the next
/// completion is announced again. A reopen already announced by the
/// inbound pass only has its closed flag cleared here.
async fn reopened(ctx: &BridgeContext, task: &Task) -> Result<()> {
    if task.is_done(&ctx.config.app.done_stage_ids) {
        return Ok(());
    }
    let key = task.id.to_string();
    if !ctx.ledger.has(LedgerNamespace::ClosedNotified, &key).await? {
        return Ok(());
    }

    if !ctx.ledger.has(LedgerNamespace::ReopenedNotified, &key).await? {
        info!(task_id = task.id, "task reopened");
        ctx.notify_thread(task.id, |ticket_ref| {
            (
                blocks::head_status(
                    TicketStatus::Reopened,
                    ticket_ref,
                    &task.name,
                    &task.url,
                    task.assignee_name.as_deref(),
                ),
                blocks::reopened_note(false),
            )
        })
        .await;
        ctx.ledger.mark(LedgerNamespace::ReopenedNotified, &key).await?;
    }

    ctx.ledger.clear(LedgerNamespace::ClosedNotified, &key).await
}
