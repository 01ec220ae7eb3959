//! Aura Engine Server
//!
//! Scores GitHub contribution activity into aura points and keeps
//! leaderboards, streaks, and monthly winner history up to date.

use std::sync::Arc;
use std::time::Duration;

use aura_engine::storage::AuraStorage;
use aura_engine::{
    AuraEngine, Config, GitHubContributionClient, PgStorage, SqliteStorage, StorageBadgeIssuer,
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Aura Engine Server");

    let config = Config::load()?;

    // PostgreSQL when DATABASE_URL is set, local SQLite otherwise
    let storage: Arc<dyn AuraStorage> = match config.database_url() {
        Some(url) => {
            let storage = PgStorage::new(&url).await?;
            info!("PostgreSQL storage initialized");
            Arc::new(storage)
        }
        None => {
            let storage = SqliteStorage::new(&config.database.path)?;
            info!("SQLite storage initialized at {}", config.database.path);
            Arc::new(storage)
        }
    };

    let client = GitHubContributionClient::new(&config.github.api_url);
    match client.check_rate_limit().await {
        Ok(limits) => {
            info!(
                "GitHub rate limit: {}/{} remaining (resets in {}s)",
                limits.remaining,
                limits.limit,
                limits.seconds_until_reset()
            );
            if limits.is_low() {
                warn!("GitHub rate limit is low, refresh passes may fail");
            }
        }
        Err(e) => warn!("Could not check GitHub rate limit: {}", e),
    }

    let issuer = Arc::new(StorageBadgeIssuer::new(storage.clone()));
    let engine = AuraEngine::new(storage, Arc::new(client), issuer);

    let batch_size = config.refresh.batch_size;
    let batch_delay = config.refresh.batch_delay();
    info!(
        "Refresh loop starting (every {} seconds, batches of {})",
        config.refresh.interval_secs, batch_size
    );

    // First tick fires immediately, then every interval
    let mut interval = tokio::time::interval(config.refresh.interval());
    loop {
        interval.tick().await;
        if let Err(e) = run_pass(&engine, batch_size, batch_delay).await {
            error!("Refresh pass failed: {}", e);
        }
    }
}

/// One scheduled pass: refresh stale users, then capture winners for
/// the month that just ended. Capture is a no-op once the podium for
/// that month exists.
async fn run_pass(
    engine: &AuraEngine,
    batch_size: usize,
    batch_delay: Duration,
) -> anyhow::Result<()> {
    let report = engine.refresh_all_eligible(batch_size, batch_delay).await?;
    if report.failed > 0 {
        warn!(
            "{} of {} refreshes failed this pass",
            report.failed, report.total
        );
    }

    let winners = engine.capture_monthly_winners(None).await?;
    for winner in &winners {
        info!(
            "Captured monthly winner for {}: {} (rank {}, {} aura)",
            winner.month_year, winner.username, winner.rank, winner.total_aura
        );
    }

    Ok(())
}
