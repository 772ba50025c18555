//! Account Registry module
//!
//! Chart of accounts: well-known codes, account lookup and creation, and
//! idempotent per-customer receivable provisioning.

pub mod chart;
mod repository;

pub use chart::{
    customer_id_from_receivable_code, receivable_code, CASH_CODE, INTEREST_INCOME_CODE,
    PLEDGED_ITEMS_CODE, RECEIVABLE_BASE_CODE,
};
pub use repository::{AccountRegistry, RegistryError};
