//! Odoo project tracker adapter.
//!
//! `rpc` owns the JSON-RPC envelope, `wire` the per-method request and row
//! types, and `client` maps them onto [`TaskTrackerGateway`](super::TaskTrackerGateway).

pub mod client;
pub mod rpc;
pub mod wire;

pub use client::OdooClient;
