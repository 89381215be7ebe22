//! Typed request arguments and result rows for the Odoo methods in use.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::{self, Unexpected};
use serde::{Deserialize, Deserializer, Serialize};

/// Timestamp format of Odoo datetime fields (always UTC).
pub const ODOO_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC instant for a domain comparison.
#[must_use]
pub fn format_datetime(at: DateTime<Utc>) -> String {
    at.format(ODOO_DATETIME).to_string()
}

/// Parse an Odoo datetime field.
#[must_use]
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw.trim(), ODOO_DATETIME)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Right-hand side of a domain term.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum DomainValue {
    /// Integer id or count.
    Int(i64),
    /// Text.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// Id list for `in`.
    Ids(Vec<i64>),
}

/// One `(field, operator, value)` filter.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Term(pub &'static str, pub &'static str, pub DomainValue);

impl Term {
    /// `field = value` on an integer field.
    #[must_use]
    pub fn eq_int(field: &'static str, value: i64) -> Self {
        Self(field, "=", DomainValue::Int(value))
    }

    /// `field = value` on a text field.
    #[must_use]
    pub fn eq_text(field: &'static str, value: impl Into<String>) -> Self {
        Self(field, "=", DomainValue::Text(value.into()))
    }
}

/// Conjunction of terms.
pub type Domain = Vec<Term>;

/// Keyword arguments accepted by `search`, `search_read` and `search_count`.
#[derive(Debug, Default, Serialize)]
pub struct SearchKwargs {
    /// Fields to return (`search_read` only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<&'static [&'static str]>,
    /// Sort specification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<&'static str>,
    /// Row cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Keyword arguments of `message_post`.
#[derive(Debug, Serialize)]
pub struct MessagePostKwargs<'a> {
    /// HTML body.
    pub body: &'a str,
    /// `comment` or `notification`.
    pub message_type: &'static str,
    /// Subtype external id.
    pub subtype_xmlid: &'static str,
    /// Posting partner; the integration user when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
}

/// Values for creating a `project.task`.
#[derive(Debug, Serialize)]
pub struct TaskValues<'a> {
    /// Title.
    pub name: &'a str,
    /// Owning project.
    pub project_id: i64,
    /// HTML description.
    pub description: String,
    /// Customer partner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_id: Option<i64>,
    /// Initial stage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<i64>,
}

/// Keyword arguments of `message_subscribe`.
#[derive(Debug, Serialize)]
pub struct SubscribeKwargs {
    /// Partners to add as followers.
    pub partner_ids: Vec<i64>,
}

/// Values for creating a `res.partner`.
#[derive(Debug, Serialize)]
pub struct PartnerValues<'a> {
    /// Display name.
    pub name: &'a str,
    /// Email address.
    pub email: &'a str,
}

/// Stage change.
#[derive(Debug, Serialize)]
pub struct StageWrite {
    /// Target stage.
    pub stage_id: i64,
}

/// Assignee replacement, encoded as the x2many `(6, 0, ids)` command.
#[derive(Debug, Serialize)]
pub struct AssigneeWrite {
    /// Commands on `user_ids`.
    pub user_ids: Vec<(u8, u8, Vec<i64>)>,
}

impl AssigneeWrite {
    /// Replace all assignees with `user_id`.
    #[must_use]
    pub fn replace_with(user_id: i64) -> Self {
        Self {
            user_ids: vec![(6, 0, vec![user_id])],
        }
    }
}

/// Values for creating an `ir.attachment` bound to a task.
#[derive(Debug, Serialize)]
pub struct AttachmentValues<'a> {
    /// Filename.
    pub name: &'a str,
    /// Base64 payload.
    pub datas: String,
    /// Owning model.
    pub res_model: &'static str,
    /// Owning record.
    pub res_id: i64,
    /// MIME type.
    pub mimetype: &'a str,
    /// Storage type.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// A many2one value: `[id, display_name]` or `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Many2One {
    /// Linked record.
    Set(i64, String),
    /// No link.
    #[default]
    Unset,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Many2OneWire {
    Set(i64, String),
    Flag(bool),
}

impl<'de> Deserialize<'de> for Many2One {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Many2OneWire::deserialize(deserializer)? {
            Many2OneWire::Set(id, name) => Ok(Self::Set(id, name)),
            Many2OneWire::Flag(false) => Ok(Self::Unset),
            Many2OneWire::Flag(true) => Err(de::Error::invalid_value(
                Unexpected::Bool(true),
                &"an [id, name] pair or false",
            )),
        }
    }
}

impl Many2One {
    /// Linked id, if any.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        match self {
            Self::Set(id, _) => Some(*id),
            Self::Unset => None,
        }
    }

    /// Linked display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Set(_, name) => Some(name),
            Self::Unset => None,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextOrFalse {
    Text(String),
    Flag(bool),
}

/// Odoo sends `false` for empty char/text fields.
fn text_or_false<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match TextOrFalse::deserialize(deserializer)? {
        TextOrFalse::Text(s) => Ok(Some(s).filter(|s| !s.is_empty())),
        TextOrFalse::Flag(false) => Ok(None),
        TextOrFalse::Flag(true) => Err(de::Error::invalid_value(
            Unexpected::Bool(true),
            &"a string or false",
        )),
    }
}

/// Fields read from `project.task`.
pub const TASK_FIELDS: &[&str] = &["id", "name", "stage_id", "partner_id", "user_ids"];

/// `project.task` row.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRow {
    /// Id.
    pub id: i64,
    /// Title.
    pub name: String,
    /// Stage link.
    #[serde(default)]
    pub stage_id: Many2One,
    /// Customer link.
    #[serde(default)]
    pub partner_id: Many2One,
    /// Assignees.
    #[serde(default)]
    pub user_ids: Vec<i64>,
}

/// Fields read from `res.partner`.
pub const PARTNER_FIELDS: &[&str] = &["id", "email"];

/// `res.partner` row.
#[derive(Debug, Clone, Deserialize)]
pub struct PartnerRow {
    /// Id.
    pub id: i64,
    /// Email address.
    #[serde(default, deserialize_with = "text_or_false")]
    pub email: Option<String>,
}

/// Fields read from `res.users`.
pub const USER_FIELDS: &[&str] = &["id", "name", "partner_id"];

/// `res.users` row.
#[derive(Debug, Clone, Deserialize)]
pub struct UserRow {
    /// Id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Linked partner.
    #[serde(default)]
    pub partner_id: Many2One,
}

/// Fields read from `mail.message`.
pub const MESSAGE_FIELDS: &[&str] = &["id", "res_id", "body", "date", "message_type", "author_id"];

/// `mail.message` row.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageRow {
    /// Id.
    pub id: i64,
    /// Owning task id.
    pub res_id: i64,
    /// HTML body.
    #[serde(default, deserialize_with = "text_or_false")]
    pub body: Option<String>,
    /// Posting time.
    pub date: String,
    /// `comment`, `notification`, ...
    pub message_type: String,
    /// Author partner.
    #[serde(default)]
    pub author_id: Many2One,
}

/// Fields read from `ir.attachment` metadata.
pub const ATTACHMENT_FIELDS: &[&str] = &["id", "name", "mimetype", "file_size"];

/// `ir.attachment` metadata row.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentRow {
    /// Id.
    pub id: i64,
    /// Filename.
    pub name: String,
    /// MIME type.
    #[serde(default, deserialize_with = "text_or_false")]
    pub mimetype: Option<String>,
    /// Size in bytes.
    #[serde(default)]
    pub file_size: i64,
}

/// `ir.attachment` payload row.
#[derive(Debug, Clone, Deserialize)]
pub struct AttachmentDataRow {
    /// Base64 payload.
    #[serde(default, deserialize_with = "text_or_false")]
    pub datas: Option<String>,
}
