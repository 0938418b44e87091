//! Tripwire Alert Checker
//!
//! Run with: cargo run
//!
//! Loads records into the in-memory backend, registers the configured
//! conditions and evaluates them until interrupted. See `tripwire::config`
//! for the environment variables; RUST_LOG sets the log level (default: info).

use std::sync::Arc;

use tripwire::alerts::AlertChecker;
use tripwire::config::{load_conditions, load_records, AppConfig};
use tripwire::search::MemorySearches;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tripwire=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    tracing::info!("Tripwire configuration:");
    tracing::info!("  Check interval: {} seconds", config.check_interval_secs);
    tracing::info!("  Query timeout: {} seconds", config.query_timeout_secs);
    tracing::info!("  Index prefix: {} ({}h per index)", config.index_prefix, config.index_hours);

    let searches = Arc::new(MemorySearches::with_config(config.index_config()));
    if let Some(path) = &config.records_file {
        load_records(path, &searches)?;
    }

    let (mut checker, mut alerts) = AlertChecker::new(searches, config.checker_config());
    match &config.conditions_file {
        Some(path) => {
            for condition in load_conditions(path)? {
                checker.register(condition);
            }
        }
        None => tracing::warn!("TRIPWIRE_CONDITIONS_FILE not set, no conditions to check"),
    }
    tracing::info!("  Conditions: {}", checker.list().len());

    let handle = checker.start();

    let drain = tokio::spawn(async move {
        while let Some(alert) = alerts.recv().await {
            tracing::info!(
                condition_id = %alert.condition_id,
                stream_id = %alert.stream_id,
                backlog = alert.summaries.len(),
                "Alert surfaced"
            );
        }
    });

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    checker.stop().await;
    handle.await?;
    drop(checker);
    drain.await?;

    Ok(())
}
