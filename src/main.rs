mod auth;
mod backup;
mod config;
mod context;
mod error;
mod logging;
mod model;
mod publish;

use std::sync::Arc;
use anyhow::Result;
use tokio_util::sync::CancellationToken;

use backup::SnapshotBuilder;
use crate::config::BackupConfig;
use context::RunContext;
use publish::PublishOutcome;

#[tokio::main]
async fn main() -> Result<()> {
    let config = BackupConfig::load();

    let level = config.as_ref().map_or("info", |c| c.log_level.as_str());
    let _log_guard = match logging::init_logging(level) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("=== Spotify Backup Starting ===");

    // Step 1: Configuration and output checks, before touching the network
    let config = match config {
        Ok(config) => Arc::new(config),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return Err(e.into());
        }
    };
    let strategy = config.publish_strategy()?;
    if let Err(e) = strategy.preflight().await {
        tracing::error!(error = %e, "Output target is not usable");
        return Err(e.into());
    }
    if config.playlist_urls.is_empty() {
        tracing::warn!("No playlists configured (playlist_urls is empty)");
    }

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    // Step 2: Authenticate
    let authorized = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(error::BackupError::Cancelled),
        client = auth::authorize(&config) => client,
    };
    let client = match authorized {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Authentication failed");
            return Err(e.into());
        }
    };
    tracing::info!(flow = client.flow_name(), "Authenticated with Spotify");

    // Step 3: Fetch everything; individual playlists may be skipped
    let ctx = RunContext::new(client, config.clone(), cancel);
    let snapshot = SnapshotBuilder::new(&ctx).build(&ctx.config.playlist_urls).await;
    if snapshot.is_empty() && !config.playlist_urls.is_empty() {
        tracing::warn!("No playlist could be fetched; publishing an empty backup");
    }

    // Step 4: Publish exactly once
    match strategy.publish(&snapshot, ctx.started_at, &ctx.cancel).await {
        Ok(PublishOutcome::Written(path)) => {
            tracing::info!(path = %path.display(), "Backup written");
        }
        Ok(PublishOutcome::Committed { path, message }) => {
            tracing::info!(path = %path.display(), message = %message, "Backup committed and pushed");
        }
        Ok(PublishOutcome::Unchanged(path)) => {
            tracing::info!(path = %path.display(), "Backup unchanged, nothing committed");
        }
        Err(e) => {
            tracing::error!(error = %e, "Publishing backup failed");
            return Err(e.into());
        }
    }

    tracing::info!("Spotify Backup finished");
    Ok(())
}
