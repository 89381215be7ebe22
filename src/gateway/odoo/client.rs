//! Odoo project-task adapter for [`TaskTrackerGateway`].

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::rpc::JsonRpcTransport;
use super::wire::{
    format_datetime, parse_datetime, AssigneeWrite, AttachmentDataRow, AttachmentRow,
    AttachmentValues, Domain, DomainValue, MessagePostKwargs, MessageRow, PartnerRow,
    PartnerValues, SearchKwargs, StageWrite, SubscribeKwargs, TaskRow, TaskValues, Term, UserRow,
    ATTACHMENT_FIELDS, MESSAGE_FIELDS, PARTNER_FIELDS, TASK_FIELDS, USER_FIELDS,
};
use crate::config::TrackerConfig;
use crate::gateway::{GatewayFuture, TaskTrackerGateway};
use crate::mail::html::html_to_text;
use crate::models::email::Attachment;
use crate::models::task::{
    CommentFilter, CommentKind, NewTask, Stage, Task, TaskComment, TaskId, TrackerAttachment,
};
use crate::{AppError, Result};

const TASK_MODEL: &str = "project.task";
const PARTNER_MODEL: &str = "res.partner";
const USER_MODEL: &str = "res.users";
const MESSAGE_MODEL: &str = "mail.message";
const ATTACHMENT_MODEL: &str = "ir.attachment";

/// Cap on rows returned by list queries.
const QUERY_LIMIT: u32 = 500;

/// Authenticated session against one Odoo database.
pub struct OdooClient {
    rpc: JsonRpcTransport,
    db: String,
    uid: i64,
    password: String,
    project_id: i64,
    link_base: String,
}

impl OdooClient {
    /// Authenticate and return a ready client.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Unauthorized` when the credentials are rejected
    /// and `AppError::Transient` when the server cannot be reached.
    pub async fn connect(config: &TrackerConfig) -> Result<Self> {
        let rpc = JsonRpcTransport::new(
            &config.url,
            Duration::from_secs(config.timeout_seconds.max(1)),
        )?;
        let auth: serde_json::Value = rpc
            .call(
                "common",
                "authenticate",
                (
                    &config.db,
                    &config.username,
                    &config.password,
                    serde_json::Map::new(),
                ),
            )
            .await?;
        // A failed login yields `false` rather than a fault.
        let uid = auth.as_i64().filter(|uid| *uid > 0).ok_or_else(|| {
            AppError::Unauthorized(format!("tracker rejected login for {}", config.username))
        })?;
        info!(uid, db = %config.db, "authenticated with task tracker");

        Ok(Self {
            rpc,
            db: config.db.clone(),
            uid,
            password: config.password.clone(),
            project_id: config.project_id,
            link_base: config.link_base().trim_end_matches('/').to_owned(),
        })
    }

    async fn execute_kw<A, K, R>(&self, model: &str, method: &str, args: A, kwargs: K) -> Result<R>
    where
        A: Serialize + Send,
        K: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        debug!(model, method, "execute_kw");
        self.rpc
            .call(
                "object",
                "execute_kw",
                (
                    &self.db,
                    self.uid,
                    &self.password,
                    model,
                    method,
                    args,
                    kwargs,
                ),
            )
            .await
    }

    async fn search(&self, model: &str, domain: Domain, kwargs: SearchKwargs) -> Result<Vec<i64>> {
        self.execute_kw(model, "search", (domain,), kwargs).await
    }

    async fn search_read<R>(&self, model: &str, domain: Domain, kwargs: SearchKwargs) -> Result<Vec<R>>
    where
        R: DeserializeOwned + Send,
    {
        self.execute_kw(model, "search_read", (domain,), kwargs).await
    }

    async fn read<R>(&self, model: &str, ids: Vec<i64>, fields: &'static [&'static str]) -> Result<Vec<R>>
    where
        R: DeserializeOwned + Send,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let kwargs = SearchKwargs {
            fields: Some(fields),
            ..SearchKwargs::default()
        };
        self.execute_kw(model, "read", (ids,), kwargs).await
    }

    async fn write<V: Serialize + Send>(&self, model: &str, id: i64, values: V) -> Result<()> {
        let _: bool = self
            .execute_kw(model, "write", (vec![id], values), SearchKwargs::default())
            .await?;
        Ok(())
    }

    async fn post_message(&self, task_id: TaskId, kwargs: MessagePostKwargs<'_>) -> Result<()> {
        let _: serde_json::Value = self
            .execute_kw(TASK_MODEL, "message_post", (vec![task_id],), kwargs)
            .await?;
        Ok(())
    }

    async fn user_id_by_login(&self, login: &str) -> Result<Option<i64>> {
        let ids = self
            .search(
                USER_MODEL,
                vec![Term::eq_text("login", login)],
                SearchKwargs {
                    limit: Some(1),
                    ..SearchKwargs::default()
                },
            )
            .await?;
        Ok(ids.first().copied())
    }

    fn task_url(&self, task_id: TaskId) -> String {
        format!(
            "{}/web#id={task_id}&model={TASK_MODEL}&view_type=form",
            self.link_base
        )
    }

    /// Turn raw task rows into snapshots with customer and assignee
    /// details, using one batched read per related model.
    async fn hydrate(&self, rows: Vec<TaskRow>) -> Result<Vec<Task>> {
        let partner_ids: Vec<i64> = rows
            .iter()
            .filter_map(|row| row.partner_id.id())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let user_ids: Vec<i64> = rows
            .iter()
            .filter_map(|row| row.user_ids.first().copied())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let partners: Vec<PartnerRow> = self.read(PARTNER_MODEL, partner_ids, PARTNER_FIELDS).await?;
        let emails: HashMap<i64, String> = partners
            .into_iter()
            .filter_map(|p| p.email.map(|email| (p.id, email)))
            .collect();

        let users: Vec<UserRow> = self.read(USER_MODEL, user_ids, USER_FIELDS).await?;
        let names: HashMap<i64, String> = users.into_iter().map(|u| (u.id, u.name)).collect();

        Ok(rows
            .into_iter()
            .map(|row| {
                let assignee_id = row.user_ids.first().copied();
                Task {
                    id: row.id,
                    url: self.task_url(row.id),
                    stage: Stage {
                        id: row.stage_id.id().unwrap_or_default(),
                        name: row.stage_id.name().unwrap_or_default().to_owned(),
                    },
                    customer_email: row.partner_id.id().and_then(|id| emails.get(&id).cloned()),
                    customer_name: row.partner_id.name().map(str::to_owned),
                    assignee_name: assignee_id.and_then(|id| names.get(&id).cloned()),
                    assignee_id,
                    name: row.name,
                }
            })
            .collect())
    }

    async fn project_task_ids(&self) -> Result<Vec<i64>> {
        self.search(
            TASK_MODEL,
            vec![Term::eq_int("project_id", self.project_id)],
            SearchKwargs::default(),
        )
        .await
    }

    /// Partner ids of the given authors that belong to active users.
    async fn agent_partners(&self, author_ids: Vec<i64>) -> Result<HashSet<i64>> {
        if author_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let users: Vec<UserRow> = self
            .search_read(
                USER_MODEL,
                vec![Term("partner_id", "in", DomainValue::Ids(author_ids))],
                SearchKwargs {
                    fields: Some(USER_FIELDS),
                    ..SearchKwargs::default()
                },
            )
            .await?;
        Ok(users.iter().filter_map(|u| u.partner_id.id()).collect())
    }

    async fn comments_since(
        &self,
        since: Option<DateTime<Utc>>,
        filter: CommentFilter,
    ) -> Result<Vec<TaskComment>> {
        let task_ids = self.project_task_ids().await?;
        if task_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut domain = vec![
            Term::eq_text("model", TASK_MODEL),
            Term("res_id", "in", DomainValue::Ids(task_ids)),
        ];
        if let Some(since) = since {
            domain.push(Term("date", ">", DomainValue::Text(format_datetime(since))));
        }
        if let Some(kind) = filter.kind {
            domain.push(Term::eq_text("message_type", kind_label(kind)));
        }

        let rows: Vec<MessageRow> = self
            .search_read(
                MESSAGE_MODEL,
                domain,
                SearchKwargs {
                    fields: Some(MESSAGE_FIELDS),
                    order: Some("date asc, id asc"),
                    limit: Some(QUERY_LIMIT),
                },
            )
            .await?;

        let authors: Vec<i64> = rows
            .iter()
            .filter_map(|row| row.author_id.id())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let agents = self.agent_partners(authors).await?;

        let mut comments = Vec::with_capacity(rows.len());
        for row in rows {
            let Some(date) = parse_datetime(&row.date) else {
                warn!(message_id = row.id, date = %row.date, "skipping message with unparsable date");
                continue;
            };
            comments.push(TaskComment {
                id: row.id,
                task_id: row.res_id,
                body: html_to_text(row.body.as_deref().unwrap_or_default()),
                date,
                by_agent: row.author_id.id().is_some_and(|id| agents.contains(&id)),
                kind: if row.message_type == "comment" {
                    CommentKind::Comment
                } else {
                    CommentKind::Notification
                },
            });
        }
        Ok(comments)
    }

    async fn open_task_count(&self, login: &str) -> Result<usize> {
        let Some(user_id) = self.user_id_by_login(login).await? else {
            debug!(login, "operator unknown to tracker");
            return Ok(0);
        };
        let count: i64 = self
            .execute_kw(
                TASK_MODEL,
                "search_count",
                (vec![
                    Term::eq_int("project_id", self.project_id),
                    Term("user_ids", "in", DomainValue::Ids(vec![user_id])),
                    Term("stage_id.fold", "=", DomainValue::Bool(false)),
                ],),
                SearchKwargs::default(),
            )
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn kind_label(kind: CommentKind) -> &'static str {
    match kind {
        CommentKind::Comment => "comment",
        CommentKind::Notification => "notification",
    }
}

/// Escape plain text for an HTML chatter field, keeping line breaks.
fn plain_to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\n' => out.push_str("<br/>"),
            '\r' => {}
            other => out.push(other),
        }
    }
    out
}

impl TaskTrackerGateway for OdooClient {
    fn find_or_create_customer<'a>(
        &'a self,
        email: &'a str,
        name: &'a str,
    ) -> GatewayFuture<'a, i64> {
        Box::pin(async move {
            let existing = self
                .search(
                    PARTNER_MODEL,
                    vec![Term::eq_text("email", email)],
                    SearchKwargs {
                        limit: Some(1),
                        ..SearchKwargs::default()
                    },
                )
                .await?;
            if let Some(id) = existing.first() {
                return Ok(*id);
            }
            let display = if name.trim().is_empty() { email } else { name };
            let id: i64 = self
                .execute_kw(
                    PARTNER_MODEL,
                    "create",
                    (PartnerValues {
                        name: display,
                        email,
                    },),
                    SearchKwargs::default(),
                )
                .await?;
            info!(partner_id = id, email, "created customer record");
            Ok(id)
        })
    }

    fn create_task<'a>(&'a self, task: &'a NewTask) -> GatewayFuture<'a, TaskId> {
        Box::pin(async move {
            let values = TaskValues {
                name: &task.name,
                project_id: self.project_id,
                description: plain_to_html(&task.description),
                partner_id: task.customer_id,
                stage_id: (task.stage_id != 0).then_some(task.stage_id),
            };
            let id: TaskId = self
                .execute_kw(TASK_MODEL, "create", (values,), SearchKwargs::default())
                .await?;

            if let Some(partner) = task.customer_id {
                let subscribed: Result<serde_json::Value> = self
                    .execute_kw(
                        TASK_MODEL,
                        "message_subscribe",
                        (vec![id],),
                        SubscribeKwargs {
                            partner_ids: vec![partner],
                        },
                    )
                    .await;
                if let Err(err) = subscribed {
                    warn!(task_id = id, %err, "failed to subscribe customer to task");
                }
            }
            Ok(id)
        })
    }

    fn add_comment<'a>(
        &'a self,
        task_id: TaskId,
        body: &'a str,
        author_id: Option<i64>,
    ) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let html = plain_to_html(body);
            self.post_message(
                task_id,
                MessagePostKwargs {
                    body: &html,
                    message_type: "comment",
                    subtype_xmlid: "mail.mt_comment",
                    author_id,
                },
            )
            .await
        })
    }

    fn post_note<'a>(&'a self, task_id: TaskId, body: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let html = plain_to_html(body);
            self.post_message(
                task_id,
                MessagePostKwargs {
                    body: &html,
                    message_type: "notification",
                    subtype_xmlid: "mail.mt_note",
                    author_id: None,
                },
            )
            .await
        })
    }

    fn set_stage(&self, task_id: TaskId, stage_id: i64) -> GatewayFuture<'_, ()> {
        Box::pin(async move { self.write(TASK_MODEL, task_id, StageWrite { stage_id }).await })
    }

    fn assign<'a>(&'a self, task_id: TaskId, login: &'a str) -> GatewayFuture<'a, ()> {
        Box::pin(async move {
            let user_id = self
                .user_id_by_login(login)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("tracker user {login}")))?;
            self.write(TASK_MODEL, task_id, AssigneeWrite::replace_with(user_id))
                .await
        })
    }

    fn get_task(&self, task_id: TaskId) -> GatewayFuture<'_, Task> {
        Box::pin(async move {
            let rows: Vec<TaskRow> = self.read(TASK_MODEL, vec![task_id], TASK_FIELDS).await?;
            if rows.is_empty() {
                return Err(AppError::NotFound(format!("task {task_id}")));
            }
            self.hydrate(rows)
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| AppError::NotFound(format!("task {task_id}")))
        })
    }

    fn list_changed_since(&self, since: DateTime<Utc>) -> GatewayFuture<'_, Vec<Task>> {
        Box::pin(async move {
            let rows: Vec<TaskRow> = self
                .search_read(
                    TASK_MODEL,
                    vec![
                        Term::eq_int("project_id", self.project_id),
                        Term("write_date", ">", DomainValue::Text(format_datetime(since))),
                    ],
                    SearchKwargs {
                        fields: Some(TASK_FIELDS),
                        order: Some("write_date asc"),
                        limit: Some(QUERY_LIMIT),
                    },
                )
                .await?;
            self.hydrate(rows).await
        })
    }

    fn list_comments_since(
        &self,
        since: Option<DateTime<Utc>>,
        filter: CommentFilter,
    ) -> GatewayFuture<'_, Vec<TaskComment>> {
        Box::pin(self.comments_since(since, filter))
    }

    fn upload_attachment<'a>(
        &'a self,
        task_id: TaskId,
        attachment: &'a Attachment,
    ) -> GatewayFuture<'a, TrackerAttachment> {
        Box::pin(async move {
            let values = AttachmentValues {
                name: &attachment.filename,
                datas: base64::engine::general_purpose::STANDARD.encode(&attachment.data),
                res_model: TASK_MODEL,
                res_id: task_id,
                mimetype: &attachment.content_type,
                kind: "binary",
            };
            let id: i64 = self
                .execute_kw(ATTACHMENT_MODEL, "create", (values,), SearchKwargs::default())
                .await?;
            Ok(TrackerAttachment {
                id,
                name: attachment.filename.clone(),
                mime_type: attachment.content_type.clone(),
                size: i64::try_from(attachment.size()).unwrap_or(i64::MAX),
            })
        })
    }

    fn list_attachments(&self, task_id: TaskId) -> GatewayFuture<'_, Vec<TrackerAttachment>> {
        Box::pin(async move {
            let rows: Vec<AttachmentRow> = self
                .search_read(
                    ATTACHMENT_MODEL,
                    vec![
                        Term::eq_text("res_model", TASK_MODEL),
                        Term::eq_int("res_id", task_id),
                    ],
                    SearchKwargs {
                        fields: Some(ATTACHMENT_FIELDS),
                        order: Some("id asc"),
                        limit: Some(QUERY_LIMIT),
                    },
                )
                .await?;
            Ok(rows
                .into_iter()
                .map(|row| TrackerAttachment {
                    id: row.id,
                    name: row.name,
                    mime_type: row
                        .mimetype
                        .unwrap_or_else(|| "application/octet-stream".to_owned()),
                    size: row.file_size,
                })
                .collect())
        })
    }

    fn download_attachment(&self, attachment_id: i64) -> GatewayFuture<'_, Vec<u8>> {
        Box::pin(async move {
            let rows: Vec<AttachmentDataRow> = self
                .read(ATTACHMENT_MODEL, vec![attachment_id], &["datas"])
                .await?;
            let encoded = rows
                .into_iter()
                .next()
                .ok_or_else(|| AppError::NotFound(format!("attachment {attachment_id}")))?
                .datas
                .unwrap_or_default();
            base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|err| AppError::Parse(format!("attachment {attachment_id}: {err}")))
        })
    }

    fn count_open_tasks_by_assignee<'a>(
        &'a self,
        candidates: &'a [String],
    ) -> GatewayFuture<'a, HashMap<String, usize>> {
        Box::pin(async move {
            let mut counts = HashMap::with_capacity(candidates.len());
            for login in candidates {
                let count = self.open_task_count(login).await?;
                counts.insert(login.clone(), count);
            }
            Ok(counts)
        })
    }
}
