// ABOUTME: sync command - runs the replication loop until shutdown, or a single cycle
// ABOUTME: Translates Ctrl+C / SIGTERM into the daemon's broadcast shutdown signal

use anyhow::Result;
use tokio::sync::broadcast;

use crate::config::SyncConfig;
use crate::sync::SyncDaemon;

/// Run the replicator with a validated configuration.
///
/// With `once` a single cycle runs and its error (if any) is returned, so the
/// process exit code reflects the outcome. Otherwise cycles repeat until the
/// process receives Ctrl+C or SIGTERM.
pub async fn sync(config: SyncConfig, once: bool) -> Result<()> {
    tracing::info!("Configuration: {}", config.summary());

    let interval = config.sync_interval;
    let table_count = config.targets.len();
    let daemon = SyncDaemon::new(config);

    if once {
        tracing::info!("Running single sync cycle...");
        let stats = daemon.run_sync_cycle().await?;

        println!();
        println!("========================================");
        println!("Sync cycle complete");
        println!("========================================");
        println!("  Tables synced: {}", stats.tables_synced);
        println!("  Rows synced:   {}", stats.rows_synced);
        println!("  Inserted:      {}", stats.rows_inserted);
        println!("  Updated:       {}", stats.rows_updated);
        println!("  Duration:      {}ms", stats.duration_ms);
        return Ok(());
    }

    println!();
    println!("========================================");
    println!("Starting continuous table sync");
    println!("========================================");
    println!("  Tables:        {}", table_count);
    println!("  Sync interval: {}s", interval.as_secs());
    println!("  Press Ctrl+C to stop");
    println!();

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        tracing::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    daemon.run(shutdown_rx).await
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c_or_pending() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            tracing::warn!("Failed to listen for SIGTERM: {}", e);
            ctrl_c_or_pending().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    ctrl_c_or_pending().await;
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed.
async fn ctrl_c_or_pending() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
