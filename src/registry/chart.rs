//! Chart of Accounts
//!
//! Well-known account codes and the deterministic per-customer receivable
//! code scheme. Codes are the stable contract with downstream accounting;
//! account ids are internal.

use uuid::Uuid;

use crate::domain::{AccountType, NewAccount};

/// Default cash account, credited with loan payouts.
pub const CASH_CODE: &str = "1001";

/// Asset account tracking the appraised value of items held in pledge.
pub const PLEDGED_ITEMS_CODE: &str = "1050";

/// Prefix for per-customer receivable accounts.
pub const RECEIVABLE_BASE_CODE: &str = "1051";

/// Income account for pledge interest.
pub const INTEREST_INCOME_CODE: &str = "4001";

/// Deterministic receivable code for a customer.
///
/// The customer id is embedded so the code can be derived without a lookup
/// and collides for no two customers.
pub fn receivable_code(customer_id: Uuid) -> String {
    format!("{RECEIVABLE_BASE_CODE}-{}", customer_id.simple())
}

/// Recover the customer id from a receivable code, if it is one.
pub fn customer_id_from_receivable_code(code: &str) -> Option<Uuid> {
    let suffix = code.strip_prefix(RECEIVABLE_BASE_CODE)?.strip_prefix('-')?;
    Uuid::try_parse(suffix).ok()
}

/// The accounts every company starts with.
///
/// Receivables are not part of the default chart; they are created lazily
/// per customer when the first pledge is opened.
pub fn default_chart(company_id: Uuid) -> Vec<NewAccount> {
    vec![
        NewAccount::new(company_id, CASH_CODE, "Cash", AccountType::Asset)
            .with_category("current_assets"),
        NewAccount::new(
            company_id,
            PLEDGED_ITEMS_CODE,
            "Pledged Items",
            AccountType::Asset,
        )
        .with_category("pledge_collateral"),
        NewAccount::new(
            company_id,
            INTEREST_INCOME_CODE,
            "Pledge Interest Income",
            AccountType::Income,
        )
        .with_category("operating_income"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_receivable_code_round_trip() {
        let customer_id = Uuid::new_v4();
        let code = receivable_code(customer_id);

        assert!(code.starts_with("1051-"));
        assert_eq!(customer_id_from_receivable_code(&code), Some(customer_id));
    }

    #[test]
    fn test_non_receivable_codes_rejected() {
        assert_eq!(customer_id_from_receivable_code("1001"), None);
        assert_eq!(customer_id_from_receivable_code("1051"), None);
        assert_eq!(customer_id_from_receivable_code("1051-nonsense"), None);
    }

    #[test]
    fn test_default_chart_composition() {
        let company_id = Uuid::new_v4();
        let chart = default_chart(company_id);

        assert_eq!(chart.len(), 3);
        assert!(chart.iter().all(|a| a.company_id == company_id));

        let codes: Vec<&str> = chart.iter().map(|a| a.code.as_str()).collect();
        assert_eq!(
            codes,
            vec![CASH_CODE, PLEDGED_ITEMS_CODE, INTEREST_INCOME_CODE]
        );
    }

    proptest! {
        #[test]
        fn prop_receivable_code_round_trips(bytes in any::<[u8; 16]>()) {
            let customer_id = Uuid::from_bytes(bytes);
            let code = receivable_code(customer_id);
            prop_assert_eq!(customer_id_from_receivable_code(&code), Some(customer_id));
        }
    }
}
