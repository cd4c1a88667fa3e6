use anyhow::{Context, Result};
use stride_lib::shared::logging::init_logging;
use stride_lib::application::ports::AuthProvider;
use stride_lib::{AppConfig, AppState};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = AppConfig::from_env();
    info!(
        database = %config.database.url,
        api = %config.api.base_url,
        auto_sync = config.sync.auto_sync,
        "stride sync worker starting"
    );

    let state = AppState::initialize(config)
        .await
        .context("Failed to initialise sync engine")?;

    if !state.auth.is_authenticated() {
        warn!("STRIDE_API_TOKEN is not set, queued writes stay local until credentials are provided");
    }

    let dedup = state.dedup.deduplicate_if_needed().await?;
    info!(removed = dedup.rows_removed, "Startup deduplication finished");

    let (mut scheduler, probe_task) = state.start_scheduler();
    scheduler.trigger_now().await;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    scheduler.shutdown();
    probe_task.abort();
    if let Err(err) = probe_task.await {
        if !err.is_cancelled() {
            warn!(error = %err, "Connectivity probe ended unexpectedly");
        }
    }

    let status = state.sync.status().await?;
    info!(
        pending = status.pending,
        failed = status.failed,
        "stride sync worker stopped"
    );
    state.pool.close().await;
    Ok(())
}
