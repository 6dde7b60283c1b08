// ABOUTME: SyncDaemon - runs the poll/apply/mark cycle over all tables at a fixed interval
// ABOUTME: A failing cycle is logged and retried on the next tick; only shutdown stops the loop

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};

use super::syncer::{TableSyncReport, TableSyncer};
use crate::config::SyncConfig;

/// Statistics from a sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub tables_synced: usize,
    pub rows_synced: u64,
    pub rows_inserted: u64,
    pub rows_updated: u64,
    pub duration_ms: u64,
}

impl SyncStats {
    fn record(&mut self, report: &TableSyncReport) {
        self.tables_synced += 1;
        self.rows_synced += report.fetched;
        self.rows_inserted += report.inserted;
        self.rows_updated += report.updated;
    }
}

/// SyncDaemon drives [`TableSyncer`] over every configured table.
///
/// Each cycle synchronizes the tables one after another in configured order.
/// The first table that fails ends the cycle: tables before it keep their
/// committed changes, tables after it wait for the next cycle.
pub struct SyncDaemon {
    config: Arc<SyncConfig>,
    syncer: TableSyncer,
}

impl SyncDaemon {
    pub fn new(config: SyncConfig) -> Self {
        let syncer = TableSyncer::new(config.connections.clone());
        Self {
            config: Arc::new(config),
            syncer,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn sync_interval(&self) -> Duration {
        self.config.sync_interval
    }

    /// Run a single sync cycle over all configured tables.
    pub async fn run_sync_cycle(&self) -> Result<SyncStats> {
        let start = Instant::now();
        let mut stats = SyncStats::default();

        for target in &self.config.targets {
            let report = self
                .syncer
                .sync_table(target)
                .await
                .with_context(|| format!("Failed to sync {}", target.table))?;
            stats.record(&report);
        }

        stats.duration_ms = start.elapsed().as_millis() as u64;
        Ok(stats)
    }

    /// Run cycles until `shutdown` fires (or its sender is dropped).
    ///
    /// Shutdown is checked before each cycle and while waiting out the
    /// interval. A cycle that has started runs to completion. Every cycle,
    /// successful or not, is followed by the same fixed wait.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> Result<()> {
        let mut cycles = 0u64;

        tracing::info!(
            "Starting SyncDaemon with sync_interval={:?}, {} tables",
            self.config.sync_interval,
            self.config.targets.len()
        );

        loop {
            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Lagged(_)) | Err(TryRecvError::Closed) => {
                    tracing::info!("Shutdown signal received, stopping SyncDaemon");
                    break;
                }
            }

            cycles += 1;
            tracing::debug!("Starting sync cycle {}", cycles);

            match self.run_sync_cycle().await {
                Ok(stats) => {
                    if stats.rows_synced > 0 {
                        tracing::info!(
                            "Sync cycle {} completed: {} tables, {} rows ({} inserted, {} updated) in {}ms",
                            cycles,
                            stats.tables_synced,
                            stats.rows_synced,
                            stats.rows_inserted,
                            stats.rows_updated,
                            stats.duration_ms
                        );
                    } else {
                        tracing::debug!("Sync cycle {} found nothing to sync", cycles);
                    }
                }
                Err(e) => {
                    // Log with :? to show full error chain including root cause
                    tracing::error!("Error in sync_data (cycle {}): {:?}", cycles, e);
                }
            }

            tokio::select! {
                biased;

                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, stopping SyncDaemon");
                    break;
                }
                _ = tokio::time::sleep(self.config.sync_interval) => {}
            }
        }

        tracing::info!("SyncDaemon stopped after {} cycles", cycles);
        Ok(())
    }
}
