// ABOUTME: validate command - checks connectivity and table layout before syncing
// ABOUTME: Prints every check and fails if any issue was found

use anyhow::{bail, Result};

use crate::config::SyncConfig;
use crate::preflight::run_preflight_checks;

/// Run the pre-flight checks for `config` and print the report.
pub async fn validate(config: &SyncConfig) -> Result<()> {
    tracing::info!("Validating configuration: {}", config.summary());

    let result = run_preflight_checks(config).await;
    result.print();

    if !result.all_passed() {
        bail!("Pre-flight checks failed: {} issue(s)", result.failed_count());
    }
    Ok(())
}
