//! Account model
//!
//! Chart-of-accounts entities and the normal-balance polarity rules that
//! drive every balance computation in the ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Balance;

/// The five account classes of the chart of accounts.
///
/// The class determines the account's normal balance side: asset and expense
/// accounts grow when debited, the rest grow when credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "account_type", rename_all = "snake_case")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

impl AccountType {
    /// Whether a debit increases this account's natural balance.
    pub fn is_debit_normal(&self) -> bool {
        matches!(self, AccountType::Asset | AccountType::Expense)
    }

    /// Polarity weight for the trial balance: +1 for debit-normal accounts,
    /// -1 for credit-normal ones. The weighted sum of all natural balances
    /// is exactly zero in a consistent ledger.
    pub fn polarity_sign(&self) -> Decimal {
        if self.is_debit_normal() {
            Decimal::ONE
        } else {
            Decimal::NEGATIVE_ONE
        }
    }
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Income => "income",
            AccountType::Expense => "expense",
        };
        write!(f, "{name}")
    }
}

/// A ledger account.
///
/// Accounts are scoped to a company; `(company_id, code)` is unique. Codes
/// are stable external identifiers, ids are internal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub company_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub category: Option<String>,
    pub is_active: bool,
    pub opening_balance: Balance,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub company_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub category: Option<String>,
    pub opening_balance: Balance,
}

impl NewAccount {
    pub fn new(
        company_id: Uuid,
        code: impl Into<String>,
        name: impl Into<String>,
        account_type: AccountType,
    ) -> Self {
        Self {
            company_id,
            code: code.into(),
            name: name.into(),
            account_type,
            category: None,
            opening_balance: Balance::zero(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_opening_balance(mut self, opening_balance: Balance) -> Self {
        self.opening_balance = opening_balance;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_normal_classes() {
        assert!(AccountType::Asset.is_debit_normal());
        assert!(AccountType::Expense.is_debit_normal());
        assert!(!AccountType::Liability.is_debit_normal());
        assert!(!AccountType::Equity.is_debit_normal());
        assert!(!AccountType::Income.is_debit_normal());
    }

    #[test]
    fn test_polarity_signs_cover_both_sides() {
        assert_eq!(AccountType::Asset.polarity_sign(), Decimal::ONE);
        assert_eq!(AccountType::Income.polarity_sign(), Decimal::NEGATIVE_ONE);
    }

    #[test]
    fn test_new_account_builder() {
        let company_id = Uuid::new_v4();
        let account = NewAccount::new(company_id, "1001", "Cash", AccountType::Asset)
            .with_category("current_assets");

        assert_eq!(account.company_id, company_id);
        assert_eq!(account.code, "1001");
        assert_eq!(account.category.as_deref(), Some("current_assets"));
        assert!(account.opening_balance.is_zero());
    }
}
