//! Collaborator interfaces consumed by the correlator.
//!
//! The correlator only sees these traits. Concrete adapters live in the
//! submodules (`imap`, `smtp`, `odoo`) and in [`crate::slack`] and
//! [`crate::templates`]; tests substitute in-memory fakes.

pub mod imap;
pub mod odoo;
pub mod smtp;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::email::{Attachment, Email};
use crate::models::task::{CommentFilter, NewTask, Task, TaskComment, TaskId, TrackerAttachment};
use crate::models::thread::ChatThreadRef;
use crate::Result;

/// Boxed future returned by every gateway call.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Source of inbound customer mail.
pub trait MailboxGateway: Send + Sync {
    /// Fetch and decode every unseen message matching the recipient filter.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transient`](crate::AppError::Transient) when the
    /// server stays unreachable after the adapter's own retries.
    fn fetch_unseen(&self) -> GatewayFuture<'_, Vec<Email>>;

    /// Flag a message as seen (and processed, when configured).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transient`](crate::AppError::Transient) on
    /// connection failure.
    fn mark_seen<'a>(&'a self, email: &'a Email) -> GatewayFuture<'a, ()>;
}

/// Helpdesk task tracker.
pub trait TaskTrackerGateway: Send + Sync {
    /// Resolve a customer record by email, creating it when missing.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) on RPC faults.
    fn find_or_create_customer<'a>(&'a self, email: &'a str, name: &'a str)
        -> GatewayFuture<'a, i64>;

    /// Create a task and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) on RPC faults.
    fn create_task<'a>(&'a self, task: &'a NewTask) -> GatewayFuture<'a, TaskId>;

    /// Post a customer-visible comment, optionally authored by a customer.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) on RPC faults.
    fn add_comment<'a>(
        &'a self,
        task_id: TaskId,
        body: &'a str,
        author_id: Option<i64>,
    ) -> GatewayFuture<'a, ()>;

    /// Post an internal system note.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) on RPC faults.
    fn post_note<'a>(&'a self, task_id: TaskId, body: &'a str) -> GatewayFuture<'a, ()>;

    /// Move a task to `stage_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) on RPC faults.
    fn set_stage(&self, task_id: TaskId, stage_id: i64) -> GatewayFuture<'_, ()>;

    /// Replace the task's assignees with the user whose login is `login`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) when no
    /// such user exists.
    fn assign<'a>(&'a self, task_id: TaskId, login: &'a str) -> GatewayFuture<'a, ()>;

    /// Fetch a single task.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) for unknown
    /// ids.
    fn get_task(&self, task_id: TaskId) -> GatewayFuture<'_, Task>;

    /// Tasks of the helpdesk project written after `since`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) on RPC faults.
    fn list_changed_since(&self, since: DateTime<Utc>) -> GatewayFuture<'_, Vec<Task>>;

    /// Chatter entries newer than `since` (all when `None`), oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) on RPC faults.
    fn list_comments_since(
        &self,
        since: Option<DateTime<Utc>>,
        filter: CommentFilter,
    ) -> GatewayFuture<'_, Vec<TaskComment>>;

    /// Attach a file to a task.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) on RPC faults.
    fn upload_attachment<'a>(
        &'a self,
        task_id: TaskId,
        attachment: &'a Attachment,
    ) -> GatewayFuture<'a, TrackerAttachment>;

    /// Attachments stored on a task.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) on RPC faults.
    fn list_attachments(&self, task_id: TaskId) -> GatewayFuture<'_, Vec<TrackerAttachment>>;

    /// Raw bytes of a stored attachment.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`](crate::AppError::NotFound) for unknown
    /// ids.
    fn download_attachment(&self, attachment_id: i64) -> GatewayFuture<'_, Vec<u8>>;

    /// Open task counts keyed by operator login.
    ///
    /// Operators unknown to the tracker are reported with zero.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tracker`](crate::AppError::Tracker) on RPC faults.
    fn count_open_tasks_by_assignee<'a>(
        &'a self,
        candidates: &'a [String],
    ) -> GatewayFuture<'a, HashMap<String, usize>>;
}

/// Team chat notifications.
pub trait ChatGateway: Send + Sync {
    /// Post a top-level message. Returns `None` when the transport cannot
    /// thread (incoming webhooks).
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) on API failure.
    fn post_new<'a>(&'a self, text: &'a str) -> GatewayFuture<'a, Option<ChatThreadRef>>;

    /// Reply inside an existing thread.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) on API failure.
    fn post_to_thread<'a>(
        &'a self,
        thread: &'a ChatThreadRef,
        text: &'a str,
    ) -> GatewayFuture<'a, ()>;

    /// Replace the text of a thread's head message.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Slack`](crate::AppError::Slack) on API failure.
    fn update_message<'a>(
        &'a self,
        thread: &'a ChatThreadRef,
        text: &'a str,
    ) -> GatewayFuture<'a, ()>;
}

/// A customer-facing email ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
    /// Files to attach.
    pub attachments: Vec<Attachment>,
}

/// Outbound mail transport.
pub trait MailerGateway: Send + Sync {
    /// Deliver `email`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Send`](crate::AppError::Send) when the message
    /// cannot be built or the server rejects it.
    fn send<'a>(&'a self, email: &'a OutgoingEmail) -> GatewayFuture<'a, ()>;
}

/// Templates known to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    /// Confirmation sent when a ticket is opened.
    NewTicket,
    /// Agent comment relayed to the customer.
    AgentReply,
    /// Closure notice.
    TicketClosed,
}

impl TemplateName {
    /// Base file name of the template pair.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NewTicket => "new_ticket",
            Self::AgentReply => "agent_reply",
            Self::TicketClosed => "ticket_closed",
        }
    }
}

/// Subject and body produced by a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    /// Single-line subject.
    pub subject: String,
    /// Body text.
    pub body: String,
}

/// Email template rendering.
pub trait TemplateRenderer: Send + Sync {
    /// Render the subject/body pair for `name` with `vars`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Render`](crate::AppError::Render) when the
    /// template is missing or references a variable `vars` lacks.
    fn render(&self, name: TemplateName, vars: &serde_json::Value) -> Result<RenderedEmail>;
}

/// Render with any serializable context.
///
/// # Errors
///
/// Returns [`AppError::Render`](crate::AppError::Render) when `vars` cannot
/// be serialized or rendering fails.
pub fn render_with<T: Serialize>(
    renderer: &dyn TemplateRenderer,
    name: TemplateName,
    vars: &T,
) -> Result<RenderedEmail> {
    let value = serde_json::to_value(vars)
        .map_err(|err| crate::AppError::Render(format!("invalid template context: {err}")))?;
    renderer.render(name, &value)
}
