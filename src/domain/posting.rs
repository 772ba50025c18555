//! Posting model
//!
//! Immutable ledger entries and the draft form they are submitted in.
//! A posting never changes after it is written; corrections happen by
//! appending a mirror group.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::account::AccountType;
use super::money::{Balance, Money};

/// Which side of the ledger an entry lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "entry_direction", rename_all = "snake_case")]
pub enum EntryDirection {
    Debit,
    Credit,
}

impl EntryDirection {
    /// The opposite side. Reversal groups mirror every entry through this.
    pub fn flipped(&self) -> EntryDirection {
        match self {
            EntryDirection::Debit => EntryDirection::Credit,
            EntryDirection::Credit => EntryDirection::Debit,
        }
    }
}

impl std::fmt::Display for EntryDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryDirection::Debit => write!(f, "debit"),
            EntryDirection::Credit => write!(f, "credit"),
        }
    }
}

/// The business event family a posting group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "reference_kind", rename_all = "snake_case")]
pub enum ReferenceKind {
    Pledge,
    PledgeReversal,
}

impl std::fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceKind::Pledge => write!(f, "pledge"),
            ReferenceKind::PledgeReversal => write!(f, "pledge_reversal"),
        }
    }
}

/// Identifies the business event a posting group records.
///
/// All postings written in one `append_group` call share one reference, and
/// a reference is written at most once. That makes reposting detectable and
/// reversal idempotent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: ReferenceKind,
    pub id: Uuid,
}

impl Reference {
    /// Reference for the opening group of a pledge.
    pub fn pledge(id: Uuid) -> Self {
        Self {
            kind: ReferenceKind::Pledge,
            id,
        }
    }

    /// Reference for the reversal group of a pledge.
    pub fn pledge_reversal(id: Uuid) -> Self {
        Self {
            kind: ReferenceKind::PledgeReversal,
            id,
        }
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// One leg of a posting group, before it is persisted.
///
/// Drafts carry no timestamps or balances; the store assigns those when the
/// group is appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingDraft {
    pub account_id: Uuid,
    pub direction: EntryDirection,
    pub amount: Money,
}

impl PostingDraft {
    pub fn debit(account_id: Uuid, amount: Money) -> Self {
        Self {
            account_id,
            direction: EntryDirection::Debit,
            amount,
        }
    }

    pub fn credit(account_id: Uuid, amount: Money) -> Self {
        Self {
            account_id,
            direction: EntryDirection::Credit,
            amount,
        }
    }
}

/// A persisted ledger entry.
///
/// `seq` is the global commit order, `group_seq` the entry's position inside
/// its group. `running_balance` snapshots the account's natural balance
/// immediately after this entry; it is derivable from history and kept for
/// O(1) balance reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    pub id: Uuid,
    pub seq: i64,
    pub account_id: Uuid,
    pub direction: EntryDirection,
    pub amount: Decimal,
    pub reference: Reference,
    pub group_seq: i16,
    pub running_balance: Balance,
    pub entry_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
}

/// Signed effect of one entry on an account's natural balance.
///
/// An entry on the account's normal side adds the amount, an entry on the
/// opposite side subtracts it. Summing deltas over history re-derives the
/// running balance.
pub fn balance_delta(account_type: AccountType, direction: EntryDirection, amount: Decimal) -> Decimal {
    let entry_is_debit = direction == EntryDirection::Debit;
    if account_type.is_debit_normal() == entry_is_debit {
        amount
    } else {
        -amount
    }
}

/// Total debit and credit sides of a draft group.
pub fn group_totals(drafts: &[PostingDraft]) -> (Decimal, Decimal) {
    let mut debits = Decimal::ZERO;
    let mut credits = Decimal::ZERO;
    for draft in drafts {
        match draft.direction {
            EntryDirection::Debit => debits += draft.amount.value(),
            EntryDirection::Credit => credits += draft.amount.value(),
        }
    }
    (debits, credits)
}
