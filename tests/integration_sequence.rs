//! Integration tests for pledge number allocation

use std::collections::BTreeSet;

use uuid::Uuid;

use pledge_ledger::sequence::{PledgeNumberSequence, SequenceError};

mod common;

fn counter_part(number: &str) -> i64 {
    number
        .rsplit('-')
        .next()
        .and_then(|part| part.parse().ok())
        .unwrap_or_else(|| panic!("malformed pledge number {number}"))
}

async fn force_counter(pool: &sqlx::PgPool, scheme_id: Uuid, year: i32, value: i64) {
    sqlx::query("UPDATE pledge_counters SET value = $3 WHERE scheme_id = $1 AND year = $2")
        .bind(scheme_id)
        .bind(year)
        .bind(value)
        .execute(pool)
        .await
        .expect("failed to force counter value");
}

#[tokio::test]
async fn test_sequential_allocation() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let sequence = PledgeNumberSequence::new(pool);
    let scheme_id = Uuid::new_v4();

    for expected in 1..=3 {
        let number = sequence
            .next_pledge_number(scheme_id, company_id, "GOLD", 2025)
            .await
            .unwrap();
        assert_eq!(number, format!("GOLD-2025-{expected:04}"));
    }

    assert_eq!(
        sequence.current_value(scheme_id, 2025).await.unwrap(),
        Some(3)
    );
}

#[tokio::test]
async fn test_concurrent_allocation_is_gapless_and_distinct() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let sequence = PledgeNumberSequence::new(pool);
    let scheme_id = Uuid::new_v4();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let sequence = sequence.clone();
        handles.push(tokio::spawn(async move {
            sequence
                .next_pledge_number(scheme_id, company_id, "GOLD", 2025)
                .await
        }));
    }

    let mut values = BTreeSet::new();
    for handle in handles {
        let number = handle.await.unwrap().unwrap();
        values.insert(counter_part(&number));
    }

    // No duplicates, no gaps: exactly 1..=10 in some order
    assert_eq!(values, (1..=10).collect());
    assert_eq!(
        sequence.current_value(scheme_id, 2025).await.unwrap(),
        Some(10)
    );
}

#[tokio::test]
async fn test_counters_partition_by_scheme_and_year() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let sequence = PledgeNumberSequence::new(pool);
    let gold = Uuid::new_v4();
    let silver = Uuid::new_v4();

    let first = sequence
        .next_pledge_number(gold, company_id, "GOLD", 2025)
        .await
        .unwrap();
    assert_eq!(counter_part(&first), 1);

    // A new year restarts the count; another scheme never sees it
    let next_year = sequence
        .next_pledge_number(gold, company_id, "GOLD", 2026)
        .await
        .unwrap();
    assert_eq!(next_year, "GOLD-2026-0001");

    let other_scheme = sequence
        .next_pledge_number(silver, company_id, "SILV", 2025)
        .await
        .unwrap();
    assert_eq!(other_scheme, "SILV-2025-0001");

    // And the original counter kept its place
    let second = sequence
        .next_pledge_number(gold, company_id, "GOLD", 2025)
        .await
        .unwrap();
    assert_eq!(counter_part(&second), 2);
}

#[tokio::test]
async fn test_empty_prefix_rejected_without_consuming() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let sequence = PledgeNumberSequence::new(pool);
    let scheme_id = Uuid::new_v4();

    let err = sequence
        .next_pledge_number(scheme_id, company_id, "", 2025)
        .await
        .unwrap_err();
    assert!(matches!(err, SequenceError::InvalidPrefix));
    assert!(err.is_client_error());

    assert_eq!(sequence.current_value(scheme_id, 2025).await.unwrap(), None);
}

#[tokio::test]
async fn test_numbers_widen_past_four_digits() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let sequence = PledgeNumberSequence::new(pool.clone());
    let scheme_id = Uuid::new_v4();

    sequence
        .next_pledge_number(scheme_id, company_id, "GOLD", 2025)
        .await
        .unwrap();
    force_counter(&pool, scheme_id, 2025, 9999).await;

    let number = sequence
        .next_pledge_number(scheme_id, company_id, "GOLD", 2025)
        .await
        .unwrap();
    assert_eq!(number, "GOLD-2025-10000");
}

#[tokio::test]
async fn test_exhausted_counter_stops_allocating() {
    let Some(pool) = common::try_setup_db().await else { return };
    let company_id = common::seed_company(&pool).await;
    let sequence = PledgeNumberSequence::new(pool.clone());
    let scheme_id = Uuid::new_v4();

    sequence
        .next_pledge_number(scheme_id, company_id, "GOLD", 2025)
        .await
        .unwrap();
    force_counter(&pool, scheme_id, 2025, 9_999_999).await;

    let err = sequence
        .next_pledge_number(scheme_id, company_id, "GOLD", 2025)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SequenceError::Exhausted { value, .. } if value == 10_000_000
    ));
    assert!(!err.is_client_error());
}
