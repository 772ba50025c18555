//! Pledge Reversal Handler
//!
//! Backs out a pledge's opening entries by appending a mirror group. The
//! original postings stay untouched; history shows both the mistake and
//! its correction.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Money, OperationContext, Posting, PostingDraft, Reference};
use crate::error::LedgerError;
use crate::ledger::{LedgerStore, LedgerStoreError};

/// Command to reverse a pledge's opening entries
#[derive(Debug, Clone)]
pub struct PledgeReversalCommand {
    pub pledge_id: Uuid,
    /// Business timestamp of the reversal; defaults to now
    pub reversed_at: Option<DateTime<Utc>>,
}

impl PledgeReversalCommand {
    pub fn new(pledge_id: Uuid) -> Self {
        Self {
            pledge_id,
            reversed_at: None,
        }
    }

    pub fn with_reversed_at(mut self, reversed_at: DateTime<Utc>) -> Self {
        self.reversed_at = Some(reversed_at);
        self
    }
}

/// Result of a successful reversal
#[derive(Debug, Clone)]
pub struct PledgeReversalReceipt {
    pub pledge_id: Uuid,
    pub reference: Reference,
    pub posting_ids: Vec<Uuid>,
    pub entry_at: DateTime<Utc>,
}

/// Mirror a posting group: same accounts and amounts, opposite directions.
/// Appending the mirror returns every affected balance to its prior value.
pub(crate) fn mirror_postings(postings: &[Posting]) -> Result<Vec<PostingDraft>, LedgerError> {
    postings
        .iter()
        .map(|posting| {
            let amount = Money::new(posting.amount).map_err(|e| {
                LedgerError::Internal(format!(
                    "stored posting {} has unpostable amount: {e}",
                    posting.id
                ))
            })?;
            Ok(PostingDraft {
                account_id: posting.account_id,
                direction: posting.direction.flipped(),
                amount,
            })
        })
        .collect()
}

/// Handler for pledge reversal
pub struct PledgeReversalHandler {
    store: LedgerStore,
}

impl PledgeReversalHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: LedgerStore::new(pool),
        }
    }

    /// Execute the pledge reversal command
    ///
    /// Idempotency: the reversal reference can only be written once, so a
    /// pledge moves to reversed at most one time no matter how many callers
    /// race here. Whether a reversal is allowed at all (item returned,
    /// manager approval) is the pledge lifecycle's decision, not ours.
    pub async fn execute(
        &self,
        command: PledgeReversalCommand,
        context: &OperationContext,
    ) -> Result<PledgeReversalReceipt, LedgerError> {
        let original = self
            .store
            .postings_by_reference(Reference::pledge(command.pledge_id))
            .await?;

        if original.is_empty() {
            return Err(LedgerError::NothingToReverse(command.pledge_id));
        }

        let reversal = Reference::pledge_reversal(command.pledge_id);
        if self.store.reference_exists(reversal).await? {
            return Err(LedgerError::AlreadyReversed(command.pledge_id));
        }

        let drafts = mirror_postings(&original)?;
        let entry_at = command.reversed_at.unwrap_or_else(Utc::now);

        let group = self
            .store
            .append_group(reversal, &drafts, entry_at, context)
            .await
            .map_err(|e| match e {
                LedgerStoreError::DuplicateReference { .. } => {
                    LedgerError::AlreadyReversed(command.pledge_id)
                }
                e => e.into(),
            })?;

        tracing::info!(
            pledge_id = %command.pledge_id,
            postings = group.posting_ids.len(),
            "pledge opening reversed"
        );

        Ok(PledgeReversalReceipt {
            pledge_id: command.pledge_id,
            reference: group.reference,
            posting_ids: group.posting_ids,
            entry_at: group.entry_at,
        })
    }
}
