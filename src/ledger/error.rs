//! Ledger Store Errors
//!
//! Error types for posting group operations.

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::Reference;

/// Errors that can occur in the ledger store
#[derive(Debug, thiserror::Error)]
pub enum LedgerStoreError {
    /// Group has fewer than two postings
    #[error("Posting group must contain at least two postings (got {0})")]
    GroupTooSmall(usize),

    /// Group debits and credits do not match exactly
    #[error("Unbalanced posting group: debits {debits}, credits {credits}")]
    UnbalancedGroup { debits: Decimal, credits: Decimal },

    /// A posting targets an account that does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// A posting targets a deactivated account
    #[error("Account is not active: {0}")]
    InactiveAccount(Uuid),

    /// A group with this reference was already appended
    #[error("Posting group already exists for reference {reference}")]
    DuplicateReference { reference: Reference },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Maximum retries exceeded
    #[error("Maximum retries exceeded appending posting group")]
    MaxRetriesExceeded,
}

impl LedgerStoreError {
    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::GroupTooSmall(_)
                | Self::UnbalancedGroup { .. }
                | Self::AccountNotFound(_)
                | Self::InactiveAccount(_)
                | Self::DuplicateReference { .. }
        )
    }

    /// Check if this error means the reference was already written
    pub fn is_duplicate_reference(&self) -> bool {
        matches!(self, Self::DuplicateReference { .. })
    }

    /// Check if this violates a ledger invariant that should have been
    /// enforced upstream
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::UnbalancedGroup { .. })
    }
}
