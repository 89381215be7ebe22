//! Domain model module declarations.

pub mod email;
pub mod sla;
pub mod task;
pub mod thread;
