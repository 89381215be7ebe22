//! Decoded inbound email and its attachments.

use serde::{Deserialize, Serialize};

/// A binary part lifted out of a MIME message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    /// Resolved filename (never empty).
    pub filename: String,
    /// MIME content type, lowercase.
    pub content_type: String,
    /// Decoded payload.
    pub data: Vec<u8>,
}

impl Attachment {
    /// Construct an attachment from its decoded payload.
    #[must_use]
    pub fn new(filename: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        }
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A decoded inbound message.
///
/// Built once per fetch and never mutated afterwards. The ledger, not the
/// `Email`, carries state between ticks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Email {
    /// Mailbox-scoped stable identifier (`<folder>-<uid>`).
    pub id: String,
    /// IMAP UID inside the polled folder.
    pub uid: u32,
    /// Decoded subject line.
    pub subject: String,
    /// Sender address.
    pub from_email: String,
    /// Sender display name; falls back to the address.
    pub from_name: String,
    /// Best-effort plain text body.
    pub body: String,
    /// Attachments in message order.
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Build the stable identifier for a message in `folder`.
    #[must_use]
    pub fn mailbox_id(folder: &str, uid: u32) -> String {
        format!("{folder}-{uid}")
    }
}
