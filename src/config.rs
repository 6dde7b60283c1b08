// ABOUTME: Replicator configuration - connection strings, poll interval, table list
// ABOUTME: Parsed from TOML once at startup, overridable from the CLI and environment

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::sync::{SyncTarget, TableRules};
use crate::utils::{strip_password_from_url, validate_cloud_local_different, validate_connection_string};

/// Poll interval used when the config file does not set one.
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

/// The two databases the replicator talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStrings {
    /// Source of unsynced rows ("CloudDb").
    pub cloud_db: String,
    /// Destination of the upserts ("LocalDb").
    pub local_db: String,
}

impl ConnectionStrings {
    pub fn new(cloud_db: impl Into<String>, local_db: impl Into<String>) -> Self {
        Self {
            cloud_db: cloud_db.into(),
            local_db: local_db.into(),
        }
    }
}

/// Validated configuration shared by the sync loop.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub connections: ConnectionStrings,
    pub sync_interval: Duration,
    /// Tables in the order they are synchronized on every cycle.
    pub targets: Vec<SyncTarget>,
}

/// Values from the command line (or environment) that win over the file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub cloud_db: Option<String>,
    pub local_db: Option<String>,
    pub sync_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    sync_interval_secs: Option<u64>,
    #[serde(default)]
    connection_strings: ConnectionStringsFile,
    #[serde(default)]
    tables: Vec<TableConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConnectionStringsFile {
    #[serde(rename = "CloudDb")]
    cloud_db: Option<String>,
    #[serde(rename = "LocalDb")]
    local_db: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableConfig {
    name: String,
    key_columns: Vec<String>,
    /// Extra columns an UPDATE must not overwrite, on top of the built-in rules.
    #[serde(default)]
    skip_on_update: Vec<String>,
    /// Extra columns left out of an INSERT, on top of the built-in rules.
    #[serde(default)]
    skip_on_insert: Vec<String>,
}

impl SyncConfig {
    /// Load and validate a TOML config file, applying `overrides`.
    pub fn load(path: &Path, overrides: &ConfigOverrides) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&text, overrides)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate TOML config text, applying `overrides`.
    pub fn from_toml_str(text: &str, overrides: &ConfigOverrides) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text).context("Failed to parse TOML")?;

        let cloud_db = overrides
            .cloud_db
            .clone()
            .or(file.connection_strings.cloud_db)
            .context("CloudDb connection string is not set (config file, --cloud-db or CLOUD_DB_URL)")?;
        let local_db = overrides
            .local_db
            .clone()
            .or(file.connection_strings.local_db)
            .context("LocalDb connection string is not set (config file, --local-db or LOCAL_DB_URL)")?;

        validate_connection_string("CloudDb", &cloud_db)?;
        validate_connection_string("LocalDb", &local_db)?;
        validate_cloud_local_different(&cloud_db, &local_db)?;

        let interval_secs = overrides
            .sync_interval_secs
            .or(file.sync_interval_secs)
            .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS);
        if interval_secs == 0 {
            bail!("sync_interval_secs must be greater than zero");
        }

        if file.tables.is_empty() {
            bail!("No tables configured; add at least one [[tables]] entry");
        }

        let mut targets: Vec<SyncTarget> = Vec::with_capacity(file.tables.len());
        for table in file.tables {
            if targets.iter().any(|t| t.table.eq_ignore_ascii_case(&table.name)) {
                bail!("Table {} is configured more than once", table.name);
            }
            let rules = TableRules::builtin(&table.name)
                .extend(&table.skip_on_update, &table.skip_on_insert);
            let target = SyncTarget::with_rules(table.name, table.key_columns, rules)?;
            targets.push(target);
        }

        Ok(Self {
            connections: ConnectionStrings { cloud_db, local_db },
            sync_interval: Duration::from_secs(interval_secs),
            targets,
        })
    }

    /// One-line description for the startup log, without passwords.
    pub fn summary(&self) -> String {
        format!(
            "CloudDb={}, LocalDb={}, interval={:?}, tables=[{}]",
            strip_password_from_url(&self.connections.cloud_db),
            strip_password_from_url(&self.connections.local_db),
            self.sync_interval,
            self.targets
                .iter()
                .map(|t| t.table.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}
