//! Persistence layer modules.

pub mod db;
pub mod ledger;
pub mod schema;
pub mod sla_repo;
pub mod thread_repo;

/// Re-export the database pool type for convenience.
pub use sqlx::SqlitePool;
