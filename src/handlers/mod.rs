//! Command Handlers module
//!
//! Handlers that orchestrate ledger operations. Each handler coordinates
//! the account registry, the pledge number sequence, and the ledger store.

mod commands;
mod opening_handler;
mod reversal_handler;

pub use commands::*;
pub use opening_handler::PledgeOpeningHandler;
pub use reversal_handler::{PledgeReversalCommand, PledgeReversalHandler, PledgeReversalReceipt};
