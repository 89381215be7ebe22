#![forbid(unsafe_code)]

//! Email to helpdesk bridge.
//!
//! Polls a mailbox, turns customer mail into tracker tasks, relays agent
//! replies and lifecycle changes back by email and chat, and tracks SLA
//! budgets. See [`orchestrator`] for the tick structure.

pub mod config;
pub mod errors;
pub mod gateway;
pub mod mail;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod sla;
pub mod slack;
pub mod templates;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
