//! Scheduled Jobs
//!
//! Background integrity auditing: periodically re-checks that every
//! company's trial balance nets to zero and that sampled balance snapshots
//! agree with posting history. A ledger passing these checks has neither
//! created nor destroyed money.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::interval;
use uuid::Uuid;

use crate::reporting::ReportingService;

/// Configuration for the integrity auditor
#[derive(Debug, Clone)]
pub struct AuditorConfig {
    /// Interval between audit passes (default: 5 minutes)
    pub check_interval: Duration,
    /// Number of posted-to accounts to re-derive per pass (default: 16)
    pub rederive_sample: i64,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(300),
            rederive_sample: 16,
        }
    }
}

/// Report from one audit pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditReport {
    pub companies_checked: u64,
    pub accounts_verified: u64,
    /// Integrity violations: imbalanced trial balances, snapshot mismatches
    pub alarms: Vec<String>,
    /// Operational failures that prevented a check from running
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.alarms.is_empty() && self.errors.is_empty()
    }
}

/// Integrity Auditor - periodically proves the ledger consistent
pub struct IntegrityAuditor {
    pool: PgPool,
    reporting: ReportingService,
    config: AuditorConfig,
}

impl IntegrityAuditor {
    /// Create a new integrity auditor
    pub fn new(pool: PgPool) -> Self {
        Self {
            reporting: ReportingService::new(pool.clone()),
            pool,
            config: AuditorConfig::default(),
        }
    }

    /// Create with custom configuration
    pub fn with_config(pool: PgPool, config: AuditorConfig) -> Self {
        Self {
            reporting: ReportingService::new(pool.clone()),
            pool,
            config,
        }
    }

    /// Start the auditor in the background
    /// Returns a handle that can be used to abort it
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Run the audit loop
    async fn run(&self) {
        tracing::info!("Integrity auditor started");

        let mut check_interval = interval(self.config.check_interval);

        loop {
            check_interval.tick().await;

            let report = self.run_once().await;
            if report.is_clean() {
                tracing::debug!(
                    companies = report.companies_checked,
                    accounts = report.accounts_verified,
                    "integrity audit clean"
                );
            }
        }
    }

    /// Run one audit pass (for manual trigger or testing)
    pub async fn run_once(&self) -> AuditReport {
        let mut report = AuditReport::default();

        match self.company_ids().await {
            Ok(companies) => {
                for company_id in companies {
                    match self.reporting.check_integrity(company_id).await {
                        Ok(_) => report.companies_checked += 1,
                        Err(e) if e.is_integrity_alarm() => {
                            report.companies_checked += 1;
                            report.alarms.push(e.to_string());
                        }
                        Err(e) => report
                            .errors
                            .push(format!("Trial balance for {company_id}: {e}")),
                    }
                }
            }
            Err(e) => report.errors.push(format!("Listing companies: {e}")),
        }

        match self.sample_account_ids().await {
            Ok(accounts) => {
                for account_id in accounts {
                    match self.reporting.verify_account(account_id).await {
                        Ok(_) => report.accounts_verified += 1,
                        Err(e) if e.is_integrity_alarm() => {
                            report.accounts_verified += 1;
                            report.alarms.push(e.to_string());
                        }
                        Err(e) => report
                            .errors
                            .push(format!("Verifying account {account_id}: {e}")),
                    }
                }
            }
            Err(e) => report.errors.push(format!("Sampling accounts: {e}")),
        }

        report.completed_at = Utc::now();

        if !report.alarms.is_empty() {
            tracing::error!(
                alarms = report.alarms.len(),
                "ledger integrity audit found inconsistencies"
            );
        }

        report
    }

    async fn company_ids(&self) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT DISTINCT company_id FROM accounts")
            .fetch_all(&self.pool)
            .await
    }

    /// Random sample of accounts that have postings to re-derive.
    async fn sample_account_ids(&self) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT id FROM accounts a
            WHERE EXISTS (SELECT 1 FROM postings p WHERE p.account_id = a.id)
            ORDER BY random()
            LIMIT $1
            "#,
        )
        .bind(self.config.rederive_sample)
        .fetch_all(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auditor_config_default() {
        let config = AuditorConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(300));
        assert_eq!(config.rederive_sample, 16);
    }

    #[test]
    fn test_audit_report_default_is_clean() {
        let report = AuditReport::default();
        assert!(report.is_clean());
        assert_eq!(report.companies_checked, 0);
    }

    #[test]
    fn test_audit_report_with_alarm_is_not_clean() {
        let mut report = AuditReport::default();
        report.alarms.push("imbalance".to_string());
        assert!(!report.is_clean());
    }
}
