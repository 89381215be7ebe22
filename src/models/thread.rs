//! Chat thread reference model.

use serde::{Deserialize, Serialize};

/// Location of the head message of a task's chat thread.
///
/// Stored once when the new-ticket post succeeds and never changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatThreadRef {
    /// Channel the head message lives in.
    pub channel: String,
    /// Message timestamp used as the thread id.
    pub ts: String,
}

impl ChatThreadRef {
    /// Construct a thread reference.
    #[must_use]
    pub fn new(channel: impl Into<String>, ts: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            ts: ts.into(),
        }
    }
}
