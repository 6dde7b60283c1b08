// ABOUTME: Library root for table-replicator
// ABOUTME: Polls cloud tables for rows flagged Synced = 0 and upserts them into a local database

pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod postgres;
pub mod preflight;
pub mod sqlite;
pub mod sync;
pub mod utils;

pub use config::{ConnectionStrings, SyncConfig};
pub use error::SyncError;
pub use sync::{SyncDaemon, SyncTarget, TableSyncer};
