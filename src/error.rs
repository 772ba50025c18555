//! Error handling module
//!
//! Top-level error type returned by the command handlers, wrapping the
//! layer-specific errors beneath them.

use uuid::Uuid;

/// Library-wide Result type
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ledger operation errors
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Reversal requested for a pledge that never posted
    #[error("No postings to reverse for pledge {0}")]
    NothingToReverse(Uuid),

    /// Reversal requested for a pledge already reversed
    #[error("Pledge {0} has already been reversed")]
    AlreadyReversed(Uuid),

    /// Opening requested for a pledge with posted entries
    #[error("Opening entries already posted for pledge {0}")]
    AlreadyPosted(Uuid),

    /// Payment account belongs to a different company
    #[error("Account {account_id} does not belong to company {company_id}")]
    AccountNotInCompany { account_id: Uuid, company_id: Uuid },

    #[error(transparent)]
    Domain(#[from] crate::domain::DomainError),

    #[error(transparent)]
    Registry(#[from] crate::registry::RegistryError),

    #[error(transparent)]
    Sequence(#[from] crate::sequence::SequenceError),

    #[error(transparent)]
    Store(#[from] crate::ledger::LedgerStoreError),

    #[error(transparent)]
    Reporting(#[from] crate::reporting::ReportingError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::NothingToReverse(_)
            | Self::AlreadyReversed(_)
            | Self::AlreadyPosted(_)
            | Self::AccountNotInCompany { .. } => true,
            Self::Domain(e) => e.is_client_error(),
            Self::Registry(e) => e.is_client_error(),
            Self::Sequence(e) => e.is_client_error(),
            Self::Store(e) => e.is_client_error(),
            Self::Reporting(_) | Self::Internal(_) => false,
        }
    }

    /// Check if this is a conflict with an already-recorded outcome.
    /// Conflicts are safe to treat as "the work is done": the postings the
    /// caller wanted exist.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::AlreadyReversed(_) | Self::AlreadyPosted(_))
    }

    /// Check if this reports a broken ledger invariant. These should be
    /// impossible and warrant an alarm, not a retry.
    pub fn is_internal_invariant(&self) -> bool {
        match self {
            Self::Store(e) => e.is_invariant_violation(),
            Self::Reporting(e) => e.is_integrity_alarm(),
            Self::Internal(_) => true,
            _ => false,
        }
    }
}
