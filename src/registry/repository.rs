//! Account Registry
//!
//! Owns the chart of accounts: lookups by code, account creation, and the
//! idempotent per-customer receivable path. The unique index on
//! `(company_id, code)` is the arbiter for concurrent creation; losers of
//! that race re-fetch the winner's row instead of failing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::is_unique_violation;
use crate::domain::{Account, AccountType, Balance, NewAccount};

use super::chart::{self, receivable_code};

/// Account Registry Error
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Account not found: {code} (company {company_id})")]
    AccountNotFound { company_id: Uuid, code: String },

    #[error("Account not found: {0}")]
    AccountIdNotFound(Uuid),

    #[error("Account code already exists: {code} (company {company_id})")]
    DuplicateCode { company_id: Uuid, code: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl RegistryError {
    /// Check if this is a client error (caller's fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::AccountNotFound { .. } | Self::AccountIdNotFound(_) | Self::DuplicateCode { .. }
        )
    }
}

type AccountRow = (
    Uuid,
    Uuid,
    String,
    String,
    AccountType,
    Option<String>,
    bool,
    Decimal,
    DateTime<Utc>,
);

fn map_account_row(row: AccountRow) -> Account {
    let (id, company_id, code, name, account_type, category, is_active, opening, created_at) = row;
    Account {
        id,
        company_id,
        code,
        name,
        account_type,
        category,
        is_active,
        opening_balance: Balance::new(opening),
        created_at,
    }
}

/// Repository for the chart of accounts
#[derive(Debug, Clone)]
pub struct AccountRegistry {
    pool: PgPool,
}

impl AccountRegistry {
    /// Create a new AccountRegistry
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Look up an account by company and code, if it exists.
    pub async fn find_account(
        &self,
        company_id: Uuid,
        code: &str,
    ) -> Result<Option<Account>, RegistryError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, company_id, code, name, account_type, category,
                   is_active, opening_balance, created_at
            FROM accounts
            WHERE company_id = $1 AND code = $2
            "#,
        )
        .bind(company_id)
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_account_row))
    }

    /// Look up an account by company and code.
    pub async fn get_account(
        &self,
        company_id: Uuid,
        code: &str,
    ) -> Result<Account, RegistryError> {
        self.find_account(company_id, code)
            .await?
            .ok_or_else(|| RegistryError::AccountNotFound {
                company_id,
                code: code.to_string(),
            })
    }

    /// Look up an account by id.
    pub async fn get_account_by_id(&self, account_id: Uuid) -> Result<Account, RegistryError> {
        let row: Option<AccountRow> = sqlx::query_as(
            r#"
            SELECT id, company_id, code, name, account_type, category,
                   is_active, opening_balance, created_at
            FROM accounts
            WHERE id = $1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_account_row)
            .ok_or(RegistryError::AccountIdNotFound(account_id))
    }

    /// Create an account.
    ///
    /// # Errors
    /// - `RegistryError::DuplicateCode` if the company already has an
    ///   account with this code
    pub async fn create_account(&self, new: NewAccount) -> Result<Account, RegistryError> {
        let id = Uuid::new_v4();

        let result: Result<AccountRow, sqlx::Error> = sqlx::query_as(
            r#"
            INSERT INTO accounts
                (id, company_id, code, name, account_type, category, opening_balance)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, company_id, code, name, account_type, category,
                      is_active, opening_balance, created_at
            "#,
        )
        .bind(id)
        .bind(new.company_id)
        .bind(&new.code)
        .bind(&new.name)
        .bind(new.account_type)
        .bind(&new.category)
        .bind(new.opening_balance.value())
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => {
                tracing::info!(
                    account_id = %row.0,
                    company_id = %new.company_id,
                    code = %new.code,
                    "account created"
                );
                Ok(map_account_row(row))
            }
            Err(e) if is_unique_violation(&e) => Err(RegistryError::DuplicateCode {
                company_id: new.company_id,
                code: new.code,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Get or create the receivable account for a customer.
    ///
    /// Safe to call concurrently for the same customer: exactly one account
    /// row results, and every caller receives it. A caller that loses the
    /// insert race re-fetches the winner's row.
    pub async fn ensure_customer_receivable(
        &self,
        company_id: Uuid,
        customer_id: Uuid,
    ) -> Result<Account, RegistryError> {
        let code = receivable_code(customer_id);

        if let Some(account) = self.find_account(company_id, &code).await? {
            return Ok(account);
        }

        let new = NewAccount::new(
            company_id,
            code.clone(),
            "Customer Pledge Receivable",
            AccountType::Asset,
        )
        .with_category("pledge_receivables");

        match self.create_account(new).await {
            Ok(account) => Ok(account),
            Err(RegistryError::DuplicateCode { .. }) => {
                // Lost the creation race; fetch the row the winner inserted.
                tracing::debug!(
                    company_id = %company_id,
                    customer_id = %customer_id,
                    "receivable created concurrently, fetching existing account"
                );
                self.get_account(company_id, &code).await
            }
            Err(e) => Err(e),
        }
    }

    /// Mark an account inactive. Inactive accounts reject new postings but
    /// keep their history.
    pub async fn deactivate_account(&self, account_id: Uuid) -> Result<(), RegistryError> {
        let rows = sqlx::query("UPDATE accounts SET is_active = FALSE WHERE id = $1")
            .bind(account_id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows == 0 {
            return Err(RegistryError::AccountIdNotFound(account_id));
        }

        tracing::info!(account_id = %account_id, "account deactivated");
        Ok(())
    }

    /// Create the default chart for a company. Idempotent: accounts that
    /// already exist are returned as-is.
    pub async fn seed_default_chart(
        &self,
        company_id: Uuid,
    ) -> Result<Vec<Account>, RegistryError> {
        let mut accounts = Vec::new();
        for new in chart::default_chart(company_id) {
            let code = new.code.clone();
            let account = match self.create_account(new).await {
                Ok(account) => account,
                Err(RegistryError::DuplicateCode { .. }) => {
                    self.get_account(company_id, &code).await?
                }
                Err(e) => return Err(e),
            };
            accounts.push(account);
        }
        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_classification() {
        let err = RegistryError::DuplicateCode {
            company_id: Uuid::nil(),
            code: "1001".to_string(),
        };
        assert!(err.is_client_error());
        assert!(err.to_string().contains("1001"));

        let err = RegistryError::AccountIdNotFound(Uuid::nil());
        assert!(err.is_client_error());
    }
}
