//! Domain module
//!
//! Core domain types and business logic.

pub mod account;
pub mod context;
pub mod error;
pub mod money;
pub mod pledge;
pub mod posting;

pub use account::{Account, AccountType, NewAccount};
pub use context::OperationContext;
pub use error::DomainError;
pub use money::{Balance, Money, MoneyError};
pub use pledge::PledgeTerms;
pub use posting::{
    balance_delta, group_totals, EntryDirection, Posting, PostingDraft, Reference, ReferenceKind,
};
