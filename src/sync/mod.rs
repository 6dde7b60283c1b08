// ABOUTME: Cloud-to-local table sync - rules, SQL, per-table syncer and run loop
// ABOUTME: Polls rows flagged Synced = 0, upserts them locally, then flags them synced

pub mod daemon;
pub mod rules;
pub mod sql;
pub mod syncer;
pub mod target;

pub use daemon::{SyncDaemon, SyncStats};
pub use rules::{ParentLookup, TableRules, SYNCED_COLUMN};
pub use syncer::{
    apply_row, ApplyOutcome, LocalTarget, TableSyncReport, TableSyncer, CLOUD_DB, LOCAL_DB,
};
pub use target::SyncTarget;
