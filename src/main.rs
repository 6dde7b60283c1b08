// ABOUTME: CLI entry point for table-replicator
// ABOUTME: Parses commands, sets up logging, and routes to the command handlers

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use table_replicator::commands;
use table_replicator::config::{ConfigOverrides, SyncConfig};

#[derive(Parser)]
#[command(name = "table-replicator")]
#[command(about = "Replicates unsynced cloud table rows into a local database", long_about = None)]
#[command(version)]
struct Cli {
    /// Allow self-signed TLS certificates (insecure - use only for testing)
    #[arg(
        long = "allow-self-signed-certs",
        global = true,
        default_value_t = false
    )]
    allow_self_signed_certs: bool,
    /// Set the log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct ConfigArgs {
    /// Path to the replicator TOML config (tables, interval, connection strings)
    #[arg(long = "config", env = "TABLE_REPLICATOR_CONFIG")]
    config_path: PathBuf,
    /// CloudDb connection string; overrides the config file
    #[arg(long = "cloud-db", env = "CLOUD_DB_URL", hide_env_values = true)]
    cloud_db: Option<String>,
    /// LocalDb connection string; overrides the config file
    #[arg(long = "local-db", env = "LOCAL_DB_URL", hide_env_values = true)]
    local_db: Option<String>,
}

impl ConfigArgs {
    fn load(&self, sync_interval_secs: Option<u64>) -> anyhow::Result<SyncConfig> {
        let overrides = ConfigOverrides {
            cloud_db: self.cloud_db.clone(),
            local_db: self.local_db.clone(),
            sync_interval_secs,
        };
        SyncConfig::load(&self.config_path, &overrides)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Replicate unsynced rows from CloudDb into LocalDb on a fixed interval
    Sync {
        #[command(flatten)]
        config: ConfigArgs,
        /// Seconds to wait between sync cycles; overrides the config file (default: 30)
        #[arg(long)]
        interval: Option<u64>,
        /// Run a single sync cycle and exit (don't run continuously)
        #[arg(long)]
        once: bool,
    },
    /// Check both databases are reachable and every configured table fits the sync contract
    Validate {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // 1. RUST_LOG environment variable has highest precedence
    // 2. --log flag is used if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log.clone()));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    table_replicator::postgres::init_tls_policy(cli.allow_self_signed_certs);

    match cli.command {
        Commands::Sync {
            config,
            interval,
            once,
        } => {
            let config = config.load(interval)?;
            commands::sync(config, once).await
        }
        Commands::Validate { config } => {
            let config = config.load(None)?;
            commands::validate(&config).await
        }
    }
}
