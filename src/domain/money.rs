//! Money types
//!
//! Domain primitives for monetary values with business rule validation.
//! All posting amounts are validated at construction time, ensuring invalid
//! values cannot exist in the system. Everything is fixed-point decimal;
//! floating point never touches the money path.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximum allowed monetary value (1 trillion)
const MAX_AMOUNT: &str = "1000000000000";

/// Maximum decimal places (currency minor unit)
const MAX_SCALE: u32 = 2;

/// Money represents a validated posting amount.
///
/// # Invariants
/// - Value is always positive (> 0)
/// - Maximum 2 decimal places (currency minor unit)
/// - Maximum value is 1 trillion
///
/// # Example
/// ```
/// use rust_decimal::Decimal;
/// use pledge_ledger::domain::Money;
///
/// let amount = Money::new(Decimal::new(50000, 0)).unwrap();
/// assert_eq!(amount.value(), Decimal::new(50000, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Money(Decimal);

/// Errors that can occur when creating a Money value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
    #[error("Amount must be positive (got {0})")]
    NotPositive(Decimal),

    #[error("Amount has too many decimal places (max {MAX_SCALE}, got {0})")]
    TooManyDecimals(u32),

    #[error("Amount exceeds maximum allowed value ({MAX_AMOUNT})")]
    Overflow,

    #[error("Invalid amount format: {0}")]
    ParseError(String),
}

impl Money {
    /// Create a new Money value with validation.
    ///
    /// # Errors
    /// - `MoneyError::NotPositive` if value <= 0
    /// - `MoneyError::TooManyDecimals` if more than 2 decimal places
    /// - `MoneyError::Overflow` if value > 1 trillion
    pub fn new(value: Decimal) -> Result<Self, MoneyError> {
        if value <= Decimal::ZERO {
            return Err(MoneyError::NotPositive(value));
        }

        if value.normalize().scale() > MAX_SCALE {
            return Err(MoneyError::TooManyDecimals(value.normalize().scale()));
        }

        let max = Decimal::from_str(MAX_AMOUNT).map_err(|_| MoneyError::Overflow)?;
        if value > max {
            return Err(MoneyError::Overflow);
        }

        Ok(Self(value))
    }

    /// Create a Money value from an integer (whole currency units).
    pub fn from_integer(value: i64) -> Result<Self, MoneyError> {
        Self::new(Decimal::from(value))
    }

    /// Get the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Add two amounts, validating the result.
    pub fn try_add(&self, other: &Money) -> Result<Money, MoneyError> {
        Money::new(self.0 + other.0)
    }
}

/// Round a raw decimal to the currency minor unit, half-up.
///
/// Derived figures (interest) pass through here exactly once before they
/// become postable amounts, so the same inputs always round to the same
/// result.
pub fn round_to_minor_unit(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MAX_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decimal = Decimal::from_str(s).map_err(|e| MoneyError::ParseError(e.to_string()))?;
        Money::new(decimal)
    }
}

impl TryFrom<String> for Money {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Money::from_str(&value)
    }
}

impl From<Money> for String {
    fn from(amount: Money) -> Self {
        format!("{:.2}", amount.0)
    }
}

// Note: No Add/Sub operators. Posting amounts are combined through the
// ledger, not through arithmetic on Money values; use try_add when a sum
// genuinely is another postable amount.

/// Balance represents an account's running balance.
///
/// Unlike Money, a Balance is signed: an account whose movements run against
/// its normal polarity legitimately goes negative (a receivable credited
/// above its debits, for example).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance(Decimal);

impl Balance {
    /// Create a balance from a raw decimal
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    /// Create a zero balance
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Get the underlying value
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check whether the balance is exactly zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Default for Balance {
    fn default() -> Self {
        Self::zero()
    }
}
