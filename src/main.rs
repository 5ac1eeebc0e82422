// =============================================================================
// Alpha Pool Scorer — Main Entry Point
// =============================================================================
//
// Starts one `Scheduler` that periodically pages the leaderboard, scores and
// enriches candidates, persists the result, and publishes the selected pool
// to the downstream bus. A single process drives every configured period.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod app_config;
mod arena;
mod bus;
mod coerce;
mod concurrency;
mod persist;
mod scheduler;
mod scorer;
mod types;
mod upstream;

use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_config::AppConfig;
use crate::bus::LoggingCandidateSink;
use crate::persist::Persister;
use crate::scheduler::Scheduler;
use crate::upstream::UpstreamClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("alpha pool scorer starting up");

    let config = AppConfig::load_from_env();

    // ── 2. Database ──────────────────────────────────────────────────────
    let connect_options: SqliteConnectOptions = config
        .database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(connect_options)
        .await?;

    let persister = Arc::new(Persister::new(pool));
    persister.bootstrap_schema().await?;
    info!("database schema bootstrapped");

    // ── 3. Upstream client ───────────────────────────────────────────────
    let upstream = Arc::new(UpstreamClient::new(
        config.leaderboard_base_url.clone(),
        config.stats_base_url.clone(),
        config.info_url.clone(),
    ));

    // ── 4. Downstream bus ────────────────────────────────────────────────
    // No real consensus/signal bus is wired up standalone — candidates are
    // logged. A process embedding this crate can swap in
    // `bus::ChannelCandidateSink` instead.
    let sink = Arc::new(LoggingCandidateSink);

    // ── 5. Scheduler ─────────────────────────────────────────────────────
    let scheduler = Scheduler::new(config, upstream, persister, sink);

    let cancel = CancellationToken::new();
    let run_cancel = cancel.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(run_cancel).await;
    });

    info!("scheduler running. Press Ctrl+C to stop.");

    // ── 6. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received — stopping gracefully");
    cancel.cancel();

    if let Err(e) = scheduler_handle.await {
        warn!(error = %e, "scheduler task did not shut down cleanly");
    }

    info!("alpha pool scorer shut down complete.");
    Ok(())
}
