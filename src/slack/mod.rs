//! Slack notifications for ticket threads.

pub mod blocks;
pub mod client;

pub use client::SlackChat;
