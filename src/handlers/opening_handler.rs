//! Pledge Opening Handler
//!
//! Orchestrates the accounting side of opening a pledge: allocates the
//! pledge number, resolves the affected accounts, and appends the opening
//! posting group.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{OperationContext, PledgeTerms, PostingDraft, Reference};
use crate::error::LedgerError;
use crate::ledger::{LedgerStore, LedgerStoreError};
use crate::registry::{AccountRegistry, CASH_CODE, INTEREST_INCOME_CODE, PLEDGED_ITEMS_CODE};
use crate::sequence::PledgeNumberSequence;

use super::{PledgeOpeningCommand, PledgeOpeningReceipt};

/// Build the opening group for a pledge, in posting order:
/// collateral into custody, loan paid out, first-period interest collected.
/// The group is balanced by construction because every amount appears once
/// on each side.
pub(crate) fn opening_postings(
    terms: &PledgeTerms,
    pledged_items: Uuid,
    receivable: Uuid,
    payment: Uuid,
    interest_income: Uuid,
) -> Vec<PostingDraft> {
    let mut drafts = vec![
        PostingDraft::debit(pledged_items, terms.maximum_value().clone()),
        PostingDraft::credit(receivable, terms.maximum_value().clone()),
        PostingDraft::debit(receivable, terms.loan_amount().clone()),
        PostingDraft::credit(payment, terms.loan_amount().clone()),
    ];

    if let Some(interest) = terms.first_period_interest() {
        drafts.push(PostingDraft::debit(payment, interest.clone()));
        drafts.push(PostingDraft::credit(interest_income, interest));
    }

    drafts
}

/// Handler for pledge opening
pub struct PledgeOpeningHandler {
    registry: AccountRegistry,
    sequence: PledgeNumberSequence,
    store: LedgerStore,
}

impl PledgeOpeningHandler {
    pub fn new(pool: PgPool) -> Self {
        Self {
            registry: AccountRegistry::new(pool.clone()),
            sequence: PledgeNumberSequence::new(pool.clone()),
            store: LedgerStore::new(pool),
        }
    }

    /// Execute the pledge opening command
    pub async fn execute(
        &self,
        command: PledgeOpeningCommand,
        context: &OperationContext,
    ) -> Result<PledgeOpeningReceipt, LedgerError> {
        let terms = PledgeTerms::new(
            command.maximum_value.clone(),
            command.loan_amount.clone(),
            command.interest_rate,
        )?;

        let opened_at = command.opened_at.unwrap_or_else(Utc::now);
        let reference = Reference::pledge(command.pledge_id);

        // Cheap early exit; the store re-checks under lock before writing.
        if self.store.reference_exists(reference).await? {
            return Err(LedgerError::AlreadyPosted(command.pledge_id));
        }

        let pledge_number = self
            .sequence
            .next_pledge_number(
                command.scheme_id,
                command.company_id,
                &command.scheme_prefix,
                opened_at.year(),
            )
            .await?;

        let pledged_items = self
            .registry
            .get_account(command.company_id, PLEDGED_ITEMS_CODE)
            .await?;
        let receivable = self
            .registry
            .ensure_customer_receivable(command.company_id, command.customer_id)
            .await?;
        let payment = match command.payment_account_id {
            Some(account_id) => {
                let account = self.registry.get_account_by_id(account_id).await?;
                if account.company_id != command.company_id {
                    return Err(LedgerError::AccountNotInCompany {
                        account_id,
                        company_id: command.company_id,
                    });
                }
                account
            }
            None => self.registry.get_account(command.company_id, CASH_CODE).await?,
        };
        let interest_income = self
            .registry
            .get_account(command.company_id, INTEREST_INCOME_CODE)
            .await?;

        let drafts = opening_postings(
            &terms,
            pledged_items.id,
            receivable.id,
            payment.id,
            interest_income.id,
        );

        let group = self
            .store
            .append_group(reference, &drafts, opened_at, context)
            .await
            .map_err(|e| {
                if e.is_invariant_violation() {
                    tracing::error!(
                        pledge_id = %command.pledge_id,
                        error = %e,
                        "opening group violated ledger invariants"
                    );
                }
                match e {
                    LedgerStoreError::DuplicateReference { .. } => {
                        LedgerError::AlreadyPosted(command.pledge_id)
                    }
                    e => e.into(),
                }
            })?;

        tracing::info!(
            pledge_id = %command.pledge_id,
            pledge_number = %pledge_number,
            postings = group.posting_ids.len(),
            "pledge opening posted"
        );

        Ok(PledgeOpeningReceipt {
            pledge_id: command.pledge_id,
            pledge_number,
            reference: group.reference,
            posting_ids: group.posting_ids,
            first_period_interest: terms
                .first_period_interest()
                .map(|m| m.value())
                .unwrap_or(Decimal::ZERO),
            entry_at: group.entry_at,
        })
    }
}
