//! Command definitions
//!
//! Commands represent intentions to post to the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Money, Reference};

/// Command to post the opening entries of a pledge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PledgeOpeningCommand {
    /// Pledge being opened (owned by the pledge lifecycle system)
    pub pledge_id: Uuid,
    pub company_id: Uuid,
    pub customer_id: Uuid,
    /// Numbering scheme the pledge number is drawn from
    pub scheme_id: Uuid,
    /// Human-facing prefix of the scheme, e.g. "GOLD"
    pub scheme_prefix: String,
    /// Appraised maximum value of the pledged items
    pub maximum_value: Money,
    /// Cash paid out to the customer
    pub loan_amount: Money,
    /// First-period interest rate in percent
    pub interest_rate: Decimal,
    /// Account the loan is paid from; defaults to the company Cash account
    pub payment_account_id: Option<Uuid>,
    /// Business timestamp of the opening; defaults to now
    pub opened_at: Option<DateTime<Utc>>,
}

impl PledgeOpeningCommand {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pledge_id: Uuid,
        company_id: Uuid,
        customer_id: Uuid,
        scheme_id: Uuid,
        scheme_prefix: impl Into<String>,
        maximum_value: Money,
        loan_amount: Money,
        interest_rate: Decimal,
    ) -> Self {
        Self {
            pledge_id,
            company_id,
            customer_id,
            scheme_id,
            scheme_prefix: scheme_prefix.into(),
            maximum_value,
            loan_amount,
            interest_rate,
            payment_account_id: None,
            opened_at: None,
        }
    }

    pub fn with_payment_account(mut self, account_id: Uuid) -> Self {
        self.payment_account_id = Some(account_id);
        self
    }

    pub fn with_opened_at(mut self, opened_at: DateTime<Utc>) -> Self {
        self.opened_at = Some(opened_at);
        self
    }
}

/// Result of successfully posting a pledge opening
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PledgeOpeningReceipt {
    pub pledge_id: Uuid,
    /// Allocated pledge number, e.g. "GOLD-2025-0001"
    pub pledge_number: String,
    pub reference: Reference,
    pub posting_ids: Vec<Uuid>,
    /// Interest charged for the first period; zero when none was posted
    pub first_period_interest: Decimal,
    pub entry_at: DateTime<Utc>,
}
