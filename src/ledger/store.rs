//! Ledger Store
//!
//! Append-only storage for balanced posting groups. A group lands in one
//! transaction or not at all; each posting carries a snapshot of its
//! account's natural balance taken with the account row locked, so
//! snapshots respect commit order even under concurrent writers.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::{is_transient, is_unique_violation};
use crate::domain::{
    balance_delta, group_totals, AccountType, Balance, EntryDirection, OperationContext, Posting,
    PostingDraft, Reference, ReferenceKind,
};

use super::LedgerStoreError;

/// Result of appending a posting group
#[derive(Debug, Clone)]
pub struct AppendedGroup {
    pub reference: Reference,
    pub posting_ids: Vec<Uuid>,
    pub entry_at: DateTime<Utc>,
}

/// Balance state of a locked account while a group is being written
struct AccountState {
    account_type: AccountType,
    balance: Decimal,
}

/// Check a draft group against the double-entry rules.
///
/// Balance comparison is exact on the fixed-point values. A group that is
/// off by the smallest representable unit is rejected.
fn validate_group(drafts: &[PostingDraft]) -> Result<(), LedgerStoreError> {
    if drafts.len() < 2 {
        return Err(LedgerStoreError::GroupTooSmall(drafts.len()));
    }

    let (debits, credits) = group_totals(drafts);
    if debits != credits {
        return Err(LedgerStoreError::UnbalancedGroup { debits, credits });
    }

    Ok(())
}

type PostingRow = (
    Uuid,
    i64,
    Uuid,
    EntryDirection,
    Decimal,
    ReferenceKind,
    Uuid,
    i16,
    Decimal,
    DateTime<Utc>,
    Option<Uuid>,
);

fn map_posting_row(row: PostingRow) -> Posting {
    let (id, seq, account_id, direction, amount, kind, reference_id, group_seq, running, entry_at, created_by) =
        row;
    Posting {
        id,
        seq,
        account_id,
        direction,
        amount,
        reference: Reference {
            kind,
            id: reference_id,
        },
        group_seq,
        running_balance: Balance::new(running),
        entry_at,
        created_by,
    }
}

/// Append-only store for posting groups
#[derive(Debug, Clone)]
pub struct LedgerStore {
    pool: PgPool,
}

impl LedgerStore {
    /// Create a new LedgerStore
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append a balanced posting group atomically.
    ///
    /// All postings land or none do. Transient serialization failures are
    /// retried; validation failures and duplicate references are not.
    ///
    /// # Errors
    /// - `LedgerStoreError::GroupTooSmall` for groups under two postings
    /// - `LedgerStoreError::UnbalancedGroup` when debits != credits
    /// - `LedgerStoreError::AccountNotFound` / `InactiveAccount` per account
    /// - `LedgerStoreError::DuplicateReference` when the reference was
    ///   already written
    pub async fn append_group(
        &self,
        reference: Reference,
        drafts: &[PostingDraft],
        entry_at: DateTime<Utc>,
        context: &OperationContext,
    ) -> Result<AppendedGroup, LedgerStoreError> {
        const MAX_RETRIES: u32 = 3;

        validate_group(drafts)?;

        for attempt in 0..MAX_RETRIES {
            match self
                .try_append_group(reference, drafts, entry_at, context)
                .await
            {
                Ok(group) => return Ok(group),
                Err(LedgerStoreError::Database(e)) if is_transient(&e) && attempt < MAX_RETRIES - 1 => {
                    let delay = Duration::from_millis(50 * (attempt as u64 + 1));
                    tokio::time::sleep(delay).await;
                    tracing::warn!(
                        reference = %reference,
                        "transient conflict appending posting group, retrying (attempt {}/{})",
                        attempt + 1,
                        MAX_RETRIES
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        Err(LedgerStoreError::MaxRetriesExceeded)
    }

    /// Try to append a posting group (single attempt).
    async fn try_append_group(
        &self,
        reference: Reference,
        drafts: &[PostingDraft],
        entry_at: DateTime<Utc>,
        context: &OperationContext,
    ) -> Result<AppendedGroup, LedgerStoreError> {
        let mut tx = self.pool.begin().await?;

        // Lock account rows in ascending id order; concurrent groups that
        // share accounts then serialize without deadlocking.
        let mut account_ids: Vec<Uuid> = drafts.iter().map(|d| d.account_id).collect();
        account_ids.sort();
        account_ids.dedup();

        let mut states: HashMap<Uuid, AccountState> = HashMap::with_capacity(account_ids.len());
        for &account_id in &account_ids {
            let state = self.lock_account(&mut tx, account_id).await?;
            states.insert(account_id, state);
        }

        // With every account lock held, the reference set is stable: a
        // duplicate seen here is committed, one not seen cannot appear
        // before we commit.
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM postings WHERE reference_kind = $1 AND reference_id = $2)",
        )
        .bind(reference.kind)
        .bind(reference.id)
        .fetch_one(&mut *tx)
        .await?;

        if exists {
            return Err(LedgerStoreError::DuplicateReference { reference });
        }

        let mut posting_ids = Vec::with_capacity(drafts.len());
        for (idx, draft) in drafts.iter().enumerate() {
            let state = states
                .get_mut(&draft.account_id)
                .ok_or(LedgerStoreError::AccountNotFound(draft.account_id))?;
            state.balance += balance_delta(state.account_type, draft.direction, draft.amount.value());

            let id = Uuid::new_v4();
            let result = sqlx::query(
                r#"
                INSERT INTO postings (
                    id, account_id, direction, amount, reference_kind, reference_id,
                    group_seq, running_balance, entry_at, created_by
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
            )
            .bind(id)
            .bind(draft.account_id)
            .bind(draft.direction)
            .bind(draft.amount.value())
            .bind(reference.kind)
            .bind(reference.id)
            .bind(idx as i16)
            .bind(state.balance)
            .bind(entry_at)
            .bind(context.created_by)
            .execute(&mut *tx)
            .await;

            match result {
                Ok(_) => posting_ids.push(id),
                // Unique index on (reference_kind, reference_id, group_seq)
                // backstops the existence check above.
                Err(e) if is_unique_violation(&e) => {
                    return Err(LedgerStoreError::DuplicateReference { reference });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit().await?;

        tracing::info!(
            reference = %reference,
            postings = drafts.len(),
            "posting group appended"
        );

        Ok(AppendedGroup {
            reference,
            posting_ids,
            entry_at,
        })
    }

    /// Lock one account row and load its current balance state.
    async fn lock_account(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
    ) -> Result<AccountState, LedgerStoreError> {
        let row: Option<(AccountType, bool, Decimal)> = sqlx::query_as(
            r#"
            SELECT account_type, is_active, opening_balance
            FROM accounts
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?;

        let (account_type, is_active, opening_balance) =
            row.ok_or(LedgerStoreError::AccountNotFound(account_id))?;

        if !is_active {
            return Err(LedgerStoreError::InactiveAccount(account_id));
        }

        let latest: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT running_balance FROM postings
            WHERE account_id = $1
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(AccountState {
            account_type,
            balance: latest.unwrap_or(opening_balance),
        })
    }

    /// All postings written under a reference, in group order. Empty when
    /// the reference was never written.
    pub async fn postings_by_reference(
        &self,
        reference: Reference,
    ) -> Result<Vec<Posting>, LedgerStoreError> {
        let rows: Vec<PostingRow> = sqlx::query_as(
            r#"
            SELECT id, seq, account_id, direction, amount, reference_kind, reference_id,
                   group_seq, running_balance, entry_at, created_by
            FROM postings
            WHERE reference_kind = $1 AND reference_id = $2
            ORDER BY group_seq
            "#,
        )
        .bind(reference.kind)
        .bind(reference.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_posting_row).collect())
    }

    /// Check whether a posting group exists for a reference.
    pub async fn reference_exists(&self, reference: Reference) -> Result<bool, LedgerStoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM postings WHERE reference_kind = $1 AND reference_id = $2)",
        )
        .bind(reference.kind)
        .bind(reference.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Current natural balance of an account: the latest snapshot, or the
    /// opening balance when nothing has been posted yet.
    pub async fn latest_balance(&self, account_id: Uuid) -> Result<Balance, LedgerStoreError> {
        let latest: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT running_balance FROM postings
            WHERE account_id = $1
            ORDER BY seq DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(balance) = latest {
            return Ok(Balance::new(balance));
        }

        self.opening_balance(account_id).await
    }

    /// Natural balance of an account as of a point in business time.
    pub async fn balance_as_of(
        &self,
        account_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Balance, LedgerStoreError> {
        let snapshot: Option<Decimal> = sqlx::query_scalar(
            r#"
            SELECT running_balance FROM postings
            WHERE account_id = $1 AND entry_at <= $2
            ORDER BY entry_at DESC, seq DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(balance) = snapshot {
            return Ok(Balance::new(balance));
        }

        self.opening_balance(account_id).await
    }

    async fn opening_balance(&self, account_id: Uuid) -> Result<Balance, LedgerStoreError> {
        let opening: Option<Decimal> =
            sqlx::query_scalar("SELECT opening_balance FROM accounts WHERE id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        opening
            .map(Balance::new)
            .ok_or(LedgerStoreError::AccountNotFound(account_id))
    }

    /// One page of an account's postings in commit order, starting after
    /// `after_seq`. Pass the last posting's `seq` back in to resume; the
    /// cursor survives restarts because `seq` is assigned at commit.
    pub async fn postings_for_account(
        &self,
        account_id: Uuid,
        after_seq: i64,
        limit: i64,
    ) -> Result<Vec<Posting>, LedgerStoreError> {
        let rows: Vec<PostingRow> = sqlx::query_as(
            r#"
            SELECT id, seq, account_id, direction, amount, reference_kind, reference_id,
                   group_seq, running_balance, entry_at, created_by
            FROM postings
            WHERE account_id = $1 AND seq > $2
            ORDER BY seq ASC
            LIMIT $3
            "#,
        )
        .bind(account_id)
        .bind(after_seq)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_posting_row).collect())
    }
}
