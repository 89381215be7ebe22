//! Slack message text builders.
//!
//! Messages are plain `mrkdwn` strings so the same text works for both the
//! bot API and incoming webhooks.

use chrono::{DateTime, Utc};

use crate::models::sla::SlaBreach;
use crate::models::task::TaskId;

/// Longest body excerpt shown in a new-ticket post, in characters.
pub const EXCERPT_CHARS: usize = 300;

/// Everything shown in the head message of a ticket thread.
#[derive(Debug, Clone, Copy)]
pub struct TicketSummary<'a> {
    /// Canonical `[PREFIX-#N]` token.
    pub ticket_ref: &'a str,
    /// Tracker task id.
    pub task_id: TaskId,
    /// Task title.
    pub title: &'a str,
    /// Customer name or address.
    pub customer: &'a str,
    /// Request body.
    pub body: &'a str,
    /// Assigned agent, if any.
    pub assignee: Option<&'a str>,
    /// When the ticket was opened.
    pub created_at: DateTime<Utc>,
    /// Browser link to the task.
    pub url: &'a str,
}

/// Lifecycle state shown on an edited head message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketStatus {
    /// Task reached a done stage.
    Completed,
    /// Task left a done stage again.
    Reopened,
}

impl TicketStatus {
    fn badge(self) -> &'static str {
        match self {
            Self::Completed => "\u{2705} Completed",
            Self::Reopened => "\u{1f504} Reopened",
        }
    }
}

/// Cut `text` to at most `max` characters, marking the cut with an ellipsis.
#[must_use]
pub fn truncate(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\u{2026}", trimmed[..cut].trim_end()),
        None => trimmed.to_owned(),
    }
}

fn link(url: &str, label: &str) -> String {
    if url.is_empty() {
        label.to_owned()
    } else {
        format!("<{url}|{label}>")
    }
}

/// Head message for a freshly created ticket.
#[must_use]
pub fn new_ticket(summary: &TicketSummary<'_>) -> String {
    let mut text = format!(
        "\u{1f4e9} *New ticket {}* {}\n*From:* {}\n*Created:* {}\n*Assignee:* {}",
        summary.ticket_ref,
        link(summary.url, summary.title),
        summary.customer,
        summary.created_at.format("%Y-%m-%d %H:%M UTC"),
        summary.assignee.unwrap_or("unassigned"),
    );
    let excerpt = truncate(summary.body, EXCERPT_CHARS);
    if !excerpt.is_empty() {
        text.push_str("\n>");
        text.push_str(&excerpt.replace('\n', "\n>"));
    }
    text
}

/// Replacement head message once the ticket changes state.
#[must_use]
pub fn head_status(
    status: TicketStatus,
    ticket_ref: &str,
    title: &str,
    url: &str,
    operator: Option<&str>,
) -> String {
    let mut text = format!("{} *{ticket_ref}* {}", status.badge(), link(url, title));
    if let Some(operator) = operator {
        text.push_str(&format!("\n*Operator:* {operator}"));
    }
    text
}

/// Thread note announcing who picked up the ticket.
#[must_use]
pub fn assigned_note(assignee: Option<&str>) -> String {
    match assignee {
        Some(name) => format!("\u{1f464} Assigned to *{name}*"),
        None => "\u{1f464} No operator available, ticket left unassigned".to_owned(),
    }
}

/// Thread note when the ticket is done.
#[must_use]
pub fn completed_note(operator: Option<&str>) -> String {
    match operator {
        Some(name) => format!("\u{2705} Ticket completed by *{name}*, customer notified"),
        None => "\u{2705} Ticket completed, customer notified".to_owned(),
    }
}

/// Thread note when the ticket is reopened.
#[must_use]
pub fn reopened_note(by_customer_reply: bool) -> String {
    if by_customer_reply {
        "\u{1f504} Customer replied to a closed ticket, reopened".to_owned()
    } else {
        "\u{1f504} Ticket reopened".to_owned()
    }
}

/// Thread warning for a missed SLA budget.
#[must_use]
pub fn sla_breach_note(breach: SlaBreach, budget_hours: u32) -> String {
    let what = match breach {
        SlaBreach::Start => "work did not start",
        SlaBreach::Resolution => "ticket was not resolved",
    };
    format!(
        "\u{26a0}\u{fe0f} SLA breach `{}`: {what} within {budget_hours} h",
        breach.label()
    )
}
