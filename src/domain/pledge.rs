//! Pledge terms
//!
//! Financial terms of a pawn pledge, validated at construction. The pledge
//! lifecycle itself (item intake, redemption, forfeiture) lives outside the
//! ledger; only its accounting facts pass through here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::DomainError;
use super::money::{round_to_minor_unit, Money};

/// Validated financial terms of a pledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PledgeTerms {
    maximum_value: Money,
    loan_amount: Money,
    interest_rate: Decimal,
}

impl PledgeTerms {
    /// Create pledge terms.
    ///
    /// # Errors
    /// - `DomainError::InvalidInterestRate` if the rate is outside 0..=100
    pub fn new(
        maximum_value: Money,
        loan_amount: Money,
        interest_rate: Decimal,
    ) -> Result<Self, DomainError> {
        if interest_rate < Decimal::ZERO || interest_rate > Decimal::ONE_HUNDRED {
            return Err(DomainError::InvalidInterestRate(interest_rate));
        }

        Ok(Self {
            maximum_value,
            loan_amount,
            interest_rate,
        })
    }

    /// Appraised maximum value of the pledged items.
    pub fn maximum_value(&self) -> &Money {
        &self.maximum_value
    }

    /// Cash paid out to the customer.
    pub fn loan_amount(&self) -> &Money {
        &self.loan_amount
    }

    /// Interest rate for the first period, in percent.
    pub fn interest_rate(&self) -> Decimal {
        self.interest_rate
    }

    /// Interest for the first period: loan * rate / 100, rounded half-up to
    /// the currency minor unit. Returns `None` when the result rounds to
    /// zero, in which case no interest entries are posted.
    pub fn first_period_interest(&self) -> Option<Money> {
        let raw = self.loan_amount.value() * self.interest_rate / Decimal::ONE_HUNDRED;
        let rounded = round_to_minor_unit(raw);
        Money::new(rounded).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(value: Decimal) -> Money {
        Money::new(value).unwrap()
    }

    #[test]
    fn test_terms_validation() {
        let terms = PledgeTerms::new(money(dec!(75000)), money(dec!(50000)), dec!(2.5));
        assert!(terms.is_ok());
    }

    #[test]
    fn test_negative_rate_rejected() {
        let terms = PledgeTerms::new(money(dec!(75000)), money(dec!(50000)), dec!(-1));
        assert!(matches!(
            terms,
            Err(DomainError::InvalidInterestRate(_))
        ));
    }

    #[test]
    fn test_rate_above_hundred_rejected() {
        let terms = PledgeTerms::new(money(dec!(75000)), money(dec!(50000)), dec!(100.5));
        assert!(matches!(
            terms,
            Err(DomainError::InvalidInterestRate(_))
        ));
    }

    #[test]
    fn test_first_period_interest() {
        // 50000 * 2.5% = 1250
        let terms = PledgeTerms::new(money(dec!(75000)), money(dec!(50000)), dec!(2.5)).unwrap();
        let interest = terms.first_period_interest().unwrap();
        assert_eq!(interest.value(), dec!(1250));
    }

    #[test]
    fn test_interest_rounds_half_up() {
        // 333.33 * 2.5% = 8.33325 -> 8.33
        let terms = PledgeTerms::new(money(dec!(500)), money(dec!(333.33)), dec!(2.5)).unwrap();
        assert_eq!(terms.first_period_interest().unwrap().value(), dec!(8.33));

        // 100.20 * 2.5% = 2.505 -> 2.51
        let terms = PledgeTerms::new(money(dec!(500)), money(dec!(100.20)), dec!(2.5)).unwrap();
        assert_eq!(terms.first_period_interest().unwrap().value(), dec!(2.51));
    }

    #[test]
    fn test_zero_rate_yields_no_interest() {
        let terms = PledgeTerms::new(money(dec!(75000)), money(dec!(50000)), dec!(0)).unwrap();
        assert!(terms.first_period_interest().is_none());
    }

    #[test]
    fn test_interest_rounding_to_zero_yields_none() {
        // 0.10 * evaluated at 2.5% = 0.0025 -> rounds to 0.00
        let terms = PledgeTerms::new(money(dec!(1)), money(dec!(0.10)), dec!(2.5)).unwrap();
        assert!(terms.first_period_interest().is_none());
    }
}
