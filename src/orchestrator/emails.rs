//! Customer-facing email contexts and delivery.

use serde::Serialize;
use tracing::warn;

use super::context::BridgeContext;
use crate::gateway::{render_with, OutgoingEmail, TemplateName};
use crate::models::email::Attachment;
use crate::models::task::{TaskId, TrackerAttachment};
use crate::Result;

/// Variables of the `new_ticket` template.
#[derive(Debug, Serialize)]
pub struct NewTicketVars<'a> {
    /// Canonical `[PREFIX-#N]` token.
    pub ticket_ref: &'a str,
    /// Configured ticket prefix.
    pub ticket_prefix: &'a str,
    /// Tracker task id.
    pub task_id: TaskId,
    /// Greeting name.
    pub customer_name: &'a str,
    /// Start budget in hours.
    pub sla_start_hours: u32,
    /// Resolution budget in hours.
    pub sla_resolution_hours: u32,
    /// Request text as recorded on the task.
    pub original_body: &'a str,
}

/// Variables of the `agent_reply` template.
#[derive(Debug, Serialize)]
pub struct AgentReplyVars<'a> {
    /// Canonical `[PREFIX-#N]` token.
    pub ticket_ref: &'a str,
    /// Configured ticket prefix.
    pub ticket_prefix: &'a str,
    /// Tracker task id.
    pub task_id: TaskId,
    /// Task title.
    pub subject: &'a str,
    /// Greeting name.
    pub customer_name: &'a str,
    /// Public part of the agent comment.
    pub agent_message: &'a str,
}

/// Variables of the `ticket_closed` template.
#[derive(Debug, Serialize)]
pub struct TicketClosedVars<'a> {
    /// Canonical `[PREFIX-#N]` token.
    pub ticket_ref: &'a str,
    /// Configured ticket prefix.
    pub ticket_prefix: &'a str,
    /// Tracker task id.
    pub task_id: TaskId,
    /// Greeting name.
    pub customer_name: &'a str,
    /// Browser link to the task; empty hides the line.
    pub task_url: &'a str,
}

/// Render `name` with `vars` and send it to `to`.
///
/// # Errors
///
/// Returns `AppError::Render` or `AppError::Send`.
pub async fn send_templated<T: Serialize + Sync>(
    ctx: &BridgeContext,
    to: &str,
    name: TemplateName,
    vars: &T,
    attachments: Vec<Attachment>,
) -> Result<()> {
    let rendered = render_with(ctx.gateways.renderer.as_ref(), name, vars)?;
    let email = OutgoingEmail {
        to: to.to_owned(),
        subject: rendered.subject,
        body: rendered.body,
        attachments,
    };
    ctx.gateways.mailer.send(&email).await
}

/// Download stored task attachments for forwarding. Files that fail to
/// download are skipped.
pub async fn fetch_attachments(ctx: &BridgeContext, stored: &[TrackerAttachment]) -> Vec<Attachment> {
    let mut files = Vec::with_capacity(stored.len());
    for meta in stored {
        match ctx.tracker().download_attachment(meta.id).await {
            Ok(data) => files.push(Attachment::new(
                meta.name.clone(),
                meta.mime_type.clone(),
                data,
            )),
            Err(err) => warn!(attachment_id = meta.id, %err, "attachment download failed"),
        }
    }
    files
}
