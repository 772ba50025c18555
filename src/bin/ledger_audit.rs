//! Ledger integrity audit tool
//!
//! Runs one audit pass over the whole ledger and prints the report as
//! JSON, exiting nonzero when any integrity check fails. With `--watch`
//! it keeps auditing on the configured interval until interrupted.
//!
//! Run with: cargo run --bin ledger_audit [-- --watch]

use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pledge_ledger::db;
use pledge_ledger::jobs::{AuditorConfig, IntegrityAuditor};
use pledge_ledger::Config;

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pledge_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let watch = std::env::args().any(|arg| arg == "--watch");
    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config).await?;
    db::run_migrations(&pool).await?;

    if !db::check_schema(&pool).await? {
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    let auditor = IntegrityAuditor::with_config(
        pool.clone(),
        AuditorConfig {
            check_interval: Duration::from_secs(config.audit_interval_secs),
            rederive_sample: config.audit_rederive_sample,
        },
    );

    if watch {
        tracing::info!(
            interval_secs = config.audit_interval_secs,
            "Auditing continuously; press Ctrl+C to stop"
        );
        let handle = auditor.start();
        tokio::signal::ctrl_c().await?;
        handle.abort();
        pool.close().await;
        return Ok(());
    }

    let report = auditor.run_once().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    pool.close().await;

    if !report.is_clean() {
        return Err(anyhow::anyhow!(
            "Ledger integrity audit failed: {} alarm(s), {} error(s)",
            report.alarms.len(),
            report.errors.len()
        ));
    }

    Ok(())
}
