//! Event correlation between mailbox, tracker and chat.
//!
//! A tick runs five passes in order: inbound mail, outbound agent
//! comments, completions, reopenings and SLA evaluation. The ledger is the
//! only state carried from one tick to the next.

pub mod assignment;
pub mod context;
pub mod correlator;
pub mod emails;
pub mod inbound;
pub mod lifecycle;
pub mod outbound;
pub mod scheduler;

pub use context::{BridgeContext, Gateways};
pub use correlator::{EventCorrelator, TickReport};
