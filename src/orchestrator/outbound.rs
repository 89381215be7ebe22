//! Outbound pass: public agent comments relayed to customers by email.

use chrono::{DateTime, Duration, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::BridgeContext;
use super::emails::{fetch_attachments, send_templated, AgentReplyVars};
use crate::config::WatermarkPolicy;
use crate::gateway::TemplateName;
use crate::models::task::{CommentFilter, TaskComment};
use crate::persistence::ledger::LedgerNamespace;
use crate::{AppError, Result};

/// Where the comment watermark may move after a pass.
///
/// `observed` is every comment returned by the listing; `failed` holds the
/// timestamps of comments that should have been sent but were not.
#[must_use]
pub fn next_watermark(
    policy: WatermarkPolicy,
    observed: &[TaskComment],
    failed: &[DateTime<Utc>],
) -> Option<DateTime<Utc>> {
    let max_seen = observed.iter().map(|c| c.date).max()?;
    match policy {
        WatermarkPolicy::MaxSeen => Some(max_seen),
        WatermarkPolicy::LowestUnsent => match failed.iter().min() {
            Some(oldest) => Some(*oldest - Duration::milliseconds(1)),
            None => Some(max_seen),
        },
    }
}

enum Outcome {
    Sent,
    Skipped,
    Failed,
}

/// Relay new public agent comments and advance the watermark.
///
/// A failed comment only holds the watermark back while it is younger
/// than the changed-task window; older failures are given up.
///
/// # Errors
///
/// Returns an error when the watermark cannot be read or the comment
/// listing fails; individual send failures are logged.
pub async fn run(ctx: &BridgeContext, now: DateTime<Utc>, cancel: &CancellationToken) -> Result<()> {
    let retry_cutoff = now - ctx.config.changed_window();
    let since = ctx.ledger.watermark().await?;
    let comments = ctx
        .tracker()
        .list_comments_since(since, CommentFilter::comments())
        .await?;
    debug!(count = comments.len(), ?since, "tracker comments since watermark");

    let mut failed = Vec::new();
    let mut handled = 0;
    for comment in &comments {
        if cancel.is_cancelled() {
            debug!("outbound pass cancelled");
            break;
        }
        handled += 1;
        match relay(ctx, comment).await {
            Ok(Outcome::Sent) => {
                info!(comment_id = comment.id, task_id = comment.task_id, "agent reply emailed");
            }
            Ok(Outcome::Skipped) => {}
            Ok(Outcome::Failed) => hold(&mut failed, comment, retry_cutoff),
            Err(err) => {
                error!(comment_id = comment.id, %err, "ledger failure while relaying comment");
                hold(&mut failed, comment, retry_cutoff);
            }
        }
    }

    // Comments left unvisited by cancellation must stay above the watermark.
    let visited = &comments[..handled];
    if let Some(mark) = next_watermark(ctx.config.app.watermark_policy, visited, &failed) {
        ctx.ledger.advance_watermark(mark).await?;
    }
    Ok(())
}

fn hold(failed: &mut Vec<DateTime<Utc>>, comment: &TaskComment, cutoff: DateTime<Utc>) {
    if comment.date >= cutoff {
        failed.push(comment.date);
    } else {
        warn!(
            comment_id = comment.id,
            task_id = comment.task_id,
            "agent reply failed past the retry window, giving up"
        );
    }
}

async fn relay(ctx: &BridgeContext, comment: &TaskComment) -> Result<Outcome> {
    let key = comment.id.to_string();
    if ctx.ledger.has(LedgerNamespace::SentComment, &key).await? {
        return Ok(Outcome::Skipped);
    }
    if !comment.by_agent {
        return Ok(Outcome::Skipped);
    }
    let Some(message) = comment.public_body() else {
        return Ok(Outcome::Skipped);
    };

    let task = match ctx.tracker().get_task(comment.task_id).await {
        Ok(task) => task,
        Err(AppError::NotFound(err)) => {
            warn!(task_id = comment.task_id, %err, "agent reply on a missing task, skipped");
            return Ok(Outcome::Skipped);
        }
        Err(err) => {
            warn!(task_id = comment.task_id, %err, "task unavailable for agent reply");
            return Ok(Outcome::Failed);
        }
    };
    let Some(to) = task.customer_address() else {
        debug!(task_id = task.id, "task has no customer address");
        return Ok(Outcome::Skipped);
    };
    if ctx.config.is_no_reply(to) {
        debug!(task_id = task.id, to, "no-reply customer, agent reply not emailed");
        ctx.ledger.mark(LedgerNamespace::SentComment, &key).await?;
        return Ok(Outcome::Skipped);
    }

    let stored = match ctx.tracker().list_attachments(task.id).await {
        Ok(stored) => stored,
        Err(err) => {
            warn!(task_id = task.id, %err, "failed to list task attachments");
            Vec::new()
        }
    };
    let attachments = fetch_attachments(ctx, &stored).await;

    let ticket_ref = ctx.ticket_ref(task.id);
    let customer_name = task.customer_display_name();
    let vars = AgentReplyVars {
        ticket_ref: &ticket_ref,
        ticket_prefix: &ctx.config.app.ticket_prefix,
        task_id: task.id,
        subject: &task.name,
        customer_name: &customer_name,
        agent_message: &message,
    };
    match send_templated(ctx, to, TemplateName::AgentReply, &vars, attachments).await {
        Ok(()) => {}
        Err(err @ AppError::Render(_)) => {
            error!(
                task_id = task.id,
                comment_id = comment.id,
                %err,
                "agent reply cannot be rendered, skipped"
            );
            return Ok(Outcome::Skipped);
        }
        Err(err) => {
            error!(task_id = task.id, comment_id = comment.id, %err, "failed to email agent reply");
            return Ok(Outcome::Failed);
        }
    }
    ctx.ledger.mark(LedgerNamespace::SentComment, &key).await?;
    Ok(Outcome::Sent)
}
