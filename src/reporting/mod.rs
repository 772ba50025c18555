//! Reporting module
//!
//! Balance queries, trial balance, and ledger integrity verification.

mod service;

pub use service::{ReportingError, ReportingService, TrialBalance, TrialBalanceRow};
