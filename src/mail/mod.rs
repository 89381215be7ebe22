//! Inbound mail decoding.
//!
//! Everything in this module is pure: it works on byte slices and strings
//! and never touches the network or the ledger.

pub mod charset;
pub mod html;
pub mod parser;
pub mod reference;

pub use parser::{parse, parse_message, ParsedBody};
pub use reference::{extract_ticket_id, format_ticket_reference, strip_quoted_reply, QuotePatterns};
