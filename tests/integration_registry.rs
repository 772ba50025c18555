//! Integration tests for the account registry

use rust_decimal_macros::dec;
use uuid::Uuid;

use pledge_ledger::domain::{Balance, NewAccount};
use pledge_ledger::registry::{
    customer_id_from_receivable_code, AccountRegistry, RegistryError, CASH_CODE,
    INTEREST_INCOME_CODE, PLEDGED_ITEMS_CODE,
};
use pledge_ledger::AccountType;

mod common;

#[tokio::test]
async fn test_seed_default_chart_idempotent() {
    let Some(pool) = common::try_setup_db().await else { return };
    let registry = AccountRegistry::new(pool);
    let company_id = Uuid::new_v4();

    let first = registry.seed_default_chart(company_id).await.unwrap();
    let second = registry.seed_default_chart(company_id).await.unwrap();

    let mut codes: Vec<&str> = first.iter().map(|a| a.code.as_str()).collect();
    codes.sort();
    assert_eq!(codes, vec![CASH_CODE, PLEDGED_ITEMS_CODE, INTEREST_INCOME_CODE]);

    // Re-seeding returns the same rows, not new ones
    let first_ids: Vec<Uuid> = first.iter().map(|a| a.id).collect();
    let second_ids: Vec<Uuid> = second.iter().map(|a| a.id).collect();
    assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn test_create_account_rejects_duplicate_code() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let registry = AccountRegistry::new(pool);

    let err = registry
        .create_account(NewAccount::new(
            company_id,
            CASH_CODE,
            "Second Cash",
            AccountType::Asset,
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateCode { .. }));
    assert!(err.is_client_error());

    // The original kept its name
    let cash = registry.get_account(company_id, CASH_CODE).await.unwrap();
    assert_eq!(cash.name, "Cash");
}

#[tokio::test]
async fn test_same_code_allowed_across_companies() {
    let Some(pool) = common::try_setup_db().await else { return };
    let first = common::seed_company(&pool).await;
    let second = common::seed_company(&pool).await;
    let registry = AccountRegistry::new(pool);

    let a = registry.get_account(first, CASH_CODE).await.unwrap();
    let b = registry.get_account(second, CASH_CODE).await.unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(a.code, b.code);
}

#[tokio::test]
async fn test_ensure_customer_receivable_idempotent() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let registry = AccountRegistry::new(pool);
    let customer_id = Uuid::new_v4();

    let created = registry
        .ensure_customer_receivable(company_id, customer_id)
        .await
        .unwrap();
    let fetched = registry
        .ensure_customer_receivable(company_id, customer_id)
        .await
        .unwrap();

    assert_eq!(created.id, fetched.id);
    assert_eq!(created.account_type, AccountType::Asset);
    assert_eq!(created.category.as_deref(), Some("pledge_receivables"));
    assert_eq!(
        customer_id_from_receivable_code(&created.code),
        Some(customer_id)
    );
}

#[tokio::test]
async fn test_ensure_customer_receivable_concurrent_race() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let registry = AccountRegistry::new(pool);
    let customer_id = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..5 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .ensure_customer_receivable(company_id, customer_id)
                .await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }

    // Exactly one account came out of the race
    ids.dedup();
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn test_deactivate_account() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let registry = AccountRegistry::new(pool);

    let cash = registry.get_account(company_id, CASH_CODE).await.unwrap();
    assert!(cash.is_active);

    registry.deactivate_account(cash.id).await.unwrap();
    let cash = registry.get_account_by_id(cash.id).await.unwrap();
    assert!(!cash.is_active);

    let err = registry.deactivate_account(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, RegistryError::AccountIdNotFound(_)));
}

#[tokio::test]
async fn test_get_account_unknown_code() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let registry = AccountRegistry::new(pool);

    let err = registry.get_account(company_id, "9999").await.unwrap_err();
    assert!(matches!(err, RegistryError::AccountNotFound { .. }));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn test_account_fields_round_trip() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let registry = AccountRegistry::new(pool);

    let created = registry
        .create_account(
            NewAccount::new(company_id, "3001", "Owner Equity", AccountType::Equity)
                .with_category("capital")
                .with_opening_balance(Balance::new(dec!(10000))),
        )
        .await
        .unwrap();

    let fetched = registry.get_account_by_id(created.id).await.unwrap();
    assert_eq!(fetched.company_id, company_id);
    assert_eq!(fetched.code, "3001");
    assert_eq!(fetched.name, "Owner Equity");
    assert_eq!(fetched.account_type, AccountType::Equity);
    assert_eq!(fetched.category.as_deref(), Some("capital"));
    assert_eq!(fetched.opening_balance.value(), dec!(10000));
    assert!(fetched.is_active);
}
