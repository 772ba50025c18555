//! Domain Error Types
//!
//! Pure domain errors that don't depend on infrastructure.

use rust_decimal::Decimal;
use thiserror::Error;

use super::money::MoneyError;

/// Business rule violations in the pledge domain.
///
/// These errors are independent of the storage layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid monetary value (zero, negative, or malformed)
    #[error(transparent)]
    InvalidMoney(#[from] MoneyError),

    /// Interest rate outside the 0..=100 percent range
    #[error("Invalid interest rate: {0} (must be between 0 and 100)")]
    InvalidInterestRate(Decimal),
}

impl DomainError {
    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidMoney(_) | Self::InvalidInterestRate(_))
    }
}
