//! Ledger module
//!
//! Append-only posting group storage with balance snapshots.

mod error;
mod store;

pub use error::LedgerStoreError;
pub use store::{AppendedGroup, LedgerStore};
