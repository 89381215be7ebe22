//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Ledger persistence failure when interacting with `SQLite`.
    Db(String),
    /// Network or storage hiccup; retried on the next tick.
    Transient(String),
    /// Credentials were rejected by a remote system.
    Unauthorized(String),
    /// Malformed payload from a remote system.
    Parse(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// Task tracker RPC fault.
    Tracker(String),
    /// Slack API or webhook failure.
    Slack(String),
    /// Outgoing email could not be built or delivered.
    Send(String),
    /// Template lookup or rendering failure.
    Render(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether the failure is worth retrying on a later tick.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Io(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Transient(msg) => write!(f, "transient: {msg}"),
            Self::Unauthorized(msg) => write!(f, "unauthorized: {msg}"),
            Self::Parse(msg) => write!(f, "parse: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Tracker(msg) => write!(f, "tracker: {msg}"),
            Self::Slack(msg) => write!(f, "slack: {msg}"),
            Self::Send(msg) => write!(f, "send: {msg}"),
            Self::Render(msg) => write!(f, "render: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Transient(err.to_string())
        }
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        Self::Render(err.to_string())
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Send(err.to_string())
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        Self::Send(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
