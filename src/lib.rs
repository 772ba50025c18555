//! pledgeLedger Library
//!
//! Double-entry accounting engine for pawn pledges. Postings are written
//! in balanced, append-only groups; every balance is re-derivable from
//! history, and pledge openings are reversible by mirror groups.

pub mod domain;
pub mod handlers;
pub mod jobs;
pub mod ledger;
pub mod registry;
pub mod reporting;
pub mod sequence;

pub mod config;
pub mod db;
mod error;

pub use config::Config;
pub use error::{LedgerError, LedgerResult};
pub use domain::{Balance, Money, MoneyError, OperationContext, DomainError};
pub use domain::{Account, AccountType, EntryDirection, Posting, PostingDraft, Reference};
