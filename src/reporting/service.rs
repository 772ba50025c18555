//! Balance Reporting Service
//!
//! Read-side queries over the ledger: per-account balances, the company
//! trial balance, and the audit path that re-derives balances from posting
//! history to prove the snapshots honest.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::domain::{balance_delta, AccountType, Balance, EntryDirection};
use crate::ledger::{LedgerStore, LedgerStoreError};

/// Page size for re-deriving a balance from posting history
const REDERIVE_PAGE_SIZE: i64 = 500;

/// One account line of a trial balance
#[derive(Debug, Clone, Serialize)]
pub struct TrialBalanceRow {
    pub account_id: Uuid,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub balance: Decimal,
}

/// Trial balance of one company
///
/// `weighted_net` is the polarity-weighted sum of all natural balances.
/// In a consistent ledger it is exactly zero.
#[derive(Debug, Clone, Serialize)]
pub struct TrialBalance {
    pub company_id: Uuid,
    pub rows: Vec<TrialBalanceRow>,
    pub weighted_net: Decimal,
}

impl TrialBalance {
    pub fn new(company_id: Uuid, rows: Vec<TrialBalanceRow>) -> Self {
        let weighted_net = rows
            .iter()
            .map(|row| row.account_type.polarity_sign() * row.balance)
            .sum();
        Self {
            company_id,
            rows,
            weighted_net,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.weighted_net.is_zero()
    }

    pub fn balance_for(&self, account_id: Uuid) -> Option<Decimal> {
        self.rows
            .iter()
            .find(|row| row.account_id == account_id)
            .map(|row| row.balance)
    }
}

/// Service for balance reads and integrity checks
#[derive(Debug, Clone)]
pub struct ReportingService {
    pool: PgPool,
    store: LedgerStore,
}

impl ReportingService {
    /// Create a new ReportingService
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool.clone()),
            pool,
        }
    }

    /// Current natural balance of an account.
    pub async fn account_balance(&self, account_id: Uuid) -> Result<Balance, ReportingError> {
        self.store
            .latest_balance(account_id)
            .await
            .map_err(map_store_error)
    }

    /// Natural balance of an account as of a point in business time.
    pub async fn account_balance_as_of(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Balance, ReportingError> {
        self.store
            .balance_as_of(account_id, at)
            .await
            .map_err(map_store_error)
    }

    /// Trial balance over every account of a company, ordered by code.
    pub async fn trial_balance(&self, company_id: Uuid) -> Result<TrialBalance, ReportingError> {
        let rows: Vec<(Uuid, String, String, AccountType, Decimal)> = sqlx::query_as(
            r#"
            SELECT a.id, a.code, a.name, a.account_type,
                   COALESCE(p.running_balance, a.opening_balance) AS balance
            FROM accounts a
            LEFT JOIN LATERAL (
                SELECT running_balance
                FROM postings
                WHERE account_id = a.id
                ORDER BY seq DESC
                LIMIT 1
            ) p ON TRUE
            WHERE a.company_id = $1
            ORDER BY a.code
            "#,
        )
        .bind(company_id)
        .fetch_all(&self.pool)
        .await?;

        let rows = rows
            .into_iter()
            .map(|(account_id, code, name, account_type, balance)| TrialBalanceRow {
                account_id,
                code,
                name,
                account_type,
                balance,
            })
            .collect();

        Ok(TrialBalance::new(company_id, rows))
    }

    /// Compute the trial balance and alarm if it does not net to zero.
    ///
    /// A nonzero weighted net means money appeared or vanished; every
    /// write path is supposed to make that impossible, so this failing is
    /// a critical defect, not a user error.
    pub async fn check_integrity(&self, company_id: Uuid) -> Result<TrialBalance, ReportingError> {
        let trial = self.trial_balance(company_id).await?;

        if !trial.is_balanced() {
            tracing::error!(
                company_id = %company_id,
                weighted_net = %trial.weighted_net,
                "trial balance does not net to zero"
            );
            return Err(ReportingError::LedgerImbalance {
                company_id,
                weighted_net: trial.weighted_net,
            });
        }

        Ok(trial)
    }

    /// Re-derive an account's balance by folding its full posting history
    /// over the opening balance. Runs under a repeatable-read snapshot so
    /// pages are mutually consistent.
    pub async fn rederive_account_balance(
        &self,
        account_id: Uuid,
    ) -> Result<Balance, ReportingError> {
        let mut tx = self.begin_snapshot().await?;
        let (account_type, opening) = self.account_basis(&mut tx, account_id).await?;
        let rederived = rederive_in_tx(&mut tx, account_id, account_type, opening).await?;
        tx.rollback().await?;

        Ok(Balance::new(rederived))
    }

    /// Prove an account's latest snapshot equal to its re-derived balance.
    ///
    /// Both reads happen under one repeatable-read snapshot, so concurrent
    /// appends cannot produce a false mismatch.
    pub async fn verify_account(&self, account_id: Uuid) -> Result<Balance, ReportingError> {
        let mut tx = self.begin_snapshot().await?;
        let (account_type, opening) = self.account_basis(&mut tx, account_id).await?;

        let snapshot: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT running_balance FROM postings
            WHERE account_id = $1
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;
        let snapshot = snapshot.unwrap_or(opening);

        let rederived = rederive_in_tx(&mut tx, account_id, account_type, opening).await?;
        tx.rollback().await?;

        if snapshot != rederived {
            tracing::error!(
                account_id = %account_id,
                snapshot = %snapshot,
                rederived = %rederived,
                "balance snapshot does not match posting history"
            );
            return Err(ReportingError::SnapshotMismatch {
                account_id,
                snapshot,
                rederived,
            });
        }

        Ok(Balance::new(snapshot))
    }

    async fn begin_snapshot(&self) -> Result<Transaction<'static, Postgres>, ReportingError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn account_basis(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
    ) -> Result<(AccountType, Decimal), ReportingError> {
        let row: Option<(AccountType, Decimal)> =
            sqlx::query_as("SELECT account_type, opening_balance FROM accounts WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&mut **tx)
                .await?;

        row.ok_or(ReportingError::AccountNotFound(account_id))
    }
}

/// Fold an account's posting history over its opening balance, one page at
/// a time so unbounded histories stay in bounded memory.
async fn rederive_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    account_id: Uuid,
    account_type: AccountType,
    opening: Decimal,
) -> Result<Decimal, sqlx::Error> {
    let mut balance = opening;
    let mut cursor = 0i64;

    loop {
        let page: Vec<(i64, EntryDirection, Decimal)> = sqlx::query_as(
            r#"
            SELECT seq, direction, amount FROM postings
            WHERE account_id = $1 AND seq > $2
            ORDER BY seq ASC
            LIMIT $3
            "#,
        )
        .bind(account_id)
        .bind(cursor)
        .bind(REDERIVE_PAGE_SIZE)
        .fetch_all(&mut **tx)
        .await?;

        if page.is_empty() {
            break;
        }

        for (seq, direction, amount) in page {
            balance += balance_delta(account_type, direction, amount);
            cursor = seq;
        }
    }

    Ok(balance)
}

fn map_store_error(e: LedgerStoreError) -> ReportingError {
    match e {
        LedgerStoreError::AccountNotFound(id) => ReportingError::AccountNotFound(id),
        e => ReportingError::Store(e),
    }
}

/// Reporting errors
#[derive(Debug, thiserror::Error)]
pub enum ReportingError {
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Ledger out of balance for company {company_id}: weighted net {weighted_net}")]
    LedgerImbalance {
        company_id: Uuid,
        weighted_net: Decimal,
    },

    #[error("Balance snapshot mismatch for account {account_id}: snapshot {snapshot}, rederived {rederived}")]
    SnapshotMismatch {
        account_id: Uuid,
        snapshot: Decimal,
        rederived: Decimal,
    },

    #[error(transparent)]
    Store(#[from] LedgerStoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ReportingError {
    /// Check if this error signals corrupted ledger state rather than a
    /// failed read
    pub fn is_integrity_alarm(&self) -> bool {
        matches!(
            self,
            Self::LedgerImbalance { .. } | Self::SnapshotMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn row(account_type: AccountType, balance: Decimal) -> TrialBalanceRow {
        TrialBalanceRow {
            account_id: Uuid::new_v4(),
            code: "0000".to_string(),
            name: "Test".to_string(),
            account_type,
            balance,
        }
    }

    #[test]
    fn test_trial_balance_weighted_net() {
        // The worked scenario: all four balances net to zero under polarity
        let trial = TrialBalance::new(
            Uuid::new_v4(),
            vec![
                row(AccountType::Asset, dec!(75000)),
                row(AccountType::Asset, dec!(-25000)),
                row(AccountType::Asset, dec!(-48750)),
                row(AccountType::Income, dec!(1250)),
            ],
        );

        assert_eq!(trial.weighted_net, Decimal::ZERO);
        assert!(trial.is_balanced());
    }

    #[test]
    fn test_trial_balance_detects_imbalance() {
        let trial = TrialBalance::new(
            Uuid::new_v4(),
            vec![
                row(AccountType::Asset, dec!(100)),
                row(AccountType::Income, dec!(99)),
            ],
        );

        assert_eq!(trial.weighted_net, dec!(1));
        assert!(!trial.is_balanced());
    }

    #[test]
    fn test_trial_balance_empty_company() {
        let trial = TrialBalance::new(Uuid::new_v4(), vec![]);
        assert!(trial.is_balanced());
        assert!(trial.rows.is_empty());
    }

    #[test]
    fn test_integrity_alarm_classification() {
        let err = ReportingError::LedgerImbalance {
            company_id: Uuid::nil(),
            weighted_net: dec!(1),
        };
        assert!(err.is_integrity_alarm());

        let err = ReportingError::AccountNotFound(Uuid::nil());
        assert!(!err.is_integrity_alarm());
    }
}
