// ABOUTME: Pre-flight validation checks for the replicator configuration
// ABOUTME: Verifies both databases are reachable and every table matches the schema contract

use crate::config::SyncConfig;
use crate::db::DbConnection;
use crate::sync::{SyncTarget, CLOUD_DB, LOCAL_DB, SYNCED_COLUMN};

/// Individual check result
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
        }
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
        }
    }
}

/// Issue with suggested fixes
#[derive(Debug, Clone)]
pub struct PreflightIssue {
    pub title: String,
    pub explanation: String,
    pub fixes: Vec<String>,
}

/// Complete pre-flight results
#[derive(Debug, Default)]
pub struct PreflightResult {
    pub network: Vec<CheckResult>,
    pub tables: Vec<CheckResult>,
    pub issues: Vec<PreflightIssue>,
}

impl PreflightResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all_passed(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.issues.len()
    }

    fn fail(&mut self, check: CheckResult, explanation: String, fixes: Vec<String>) {
        self.issues.push(PreflightIssue {
            title: check.message.clone(),
            explanation,
            fixes,
        });
        self.tables.push(check);
    }

    /// Print formatted output
    pub fn print(&self) {
        println!();
        println!("Pre-flight Checks");
        println!("{}", "═".repeat(61));
        println!();

        for (heading, checks) in [("Connectivity:", &self.network), ("Tables:", &self.tables)] {
            if checks.is_empty() {
                continue;
            }
            println!("{}", heading);
            for check in checks {
                let icon = if check.passed { "✓" } else { "✗" };
                println!("  {} {}", icon, check.message);
            }
            println!();
        }

        if self.all_passed() {
            println!("All checks passed.");
            return;
        }

        println!("{} issue(s) found:", self.failed_count());
        for (i, issue) in self.issues.iter().enumerate() {
            println!();
            println!("{}. {}", i + 1, issue.title);
            println!("   {}", issue.explanation);
            for fix in &issue.fixes {
                println!("   → {}", fix);
            }
        }
    }
}

/// Run every pre-flight check for `config`.
pub async fn run_preflight_checks(config: &SyncConfig) -> PreflightResult {
    let mut result = PreflightResult::new();

    let cloud = connect_check(&mut result, CLOUD_DB, &config.connections.cloud_db).await;
    let local = connect_check(&mut result, LOCAL_DB, &config.connections.local_db).await;

    for target in &config.targets {
        if let Some(cloud) = &cloud {
            check_table(&mut result, cloud, CLOUD_DB, target, true).await;
        }
        if let Some(local) = &local {
            check_table(&mut result, local, LOCAL_DB, target, false).await;
            // Re-parented inserts read the parent's identity from the local side.
            if let Some(lookup) = &target.rules.parent_lookup {
                check_columns_present(
                    &mut result,
                    local,
                    LOCAL_DB,
                    &lookup.parent_table,
                    lookup
                        .match_columns
                        .iter()
                        .chain(std::iter::once(&lookup.identity_column)),
                )
                .await;
            }
        }
    }

    result
}

async fn connect_check(result: &mut PreflightResult, name: &str, url: &str) -> Option<DbConnection> {
    match DbConnection::connect(name, url).await {
        Ok(conn) => {
            result
                .network
                .push(CheckResult::pass(name, format!("{} reachable", name)));
            Some(conn)
        }
        Err(e) => {
            result.network.push(CheckResult::fail(
                name,
                format!("Cannot connect to {}: {}", name, e),
            ));
            result.issues.push(PreflightIssue {
                title: format!("{} unreachable", name),
                explanation: format!("{:#}", e),
                fixes: vec![
                    "Verify the connection string is correct".to_string(),
                    "Check network connectivity to the database host".to_string(),
                    "For SQLite, make sure the database file exists".to_string(),
                ],
            });
            None
        }
    }
}

async fn check_table(
    result: &mut PreflightResult,
    conn: &DbConnection,
    side: &str,
    target: &SyncTarget,
    needs_synced_flag: bool,
) {
    let mut required: Vec<&String> = target.key_columns.iter().collect();
    let synced = SYNCED_COLUMN.to_string();
    if needs_synced_flag {
        required.push(&synced);
    }
    check_columns_present(result, conn, side, &target.table, required.into_iter()).await;
}

async fn check_columns_present<'a>(
    result: &mut PreflightResult,
    conn: &DbConnection,
    side: &str,
    table: &str,
    required: impl Iterator<Item = &'a String>,
) {
    let name = format!("{}.{}", side, table);
    let layout = match conn.describe_table(table).await {
        Ok(Some(layout)) => layout,
        Ok(None) => {
            result.fail(
                CheckResult::fail(&name, format!("{}: table {} not found", side, table)),
                format!("{} has no table named {}", side, table),
                vec![format!("Create {} in {} or remove it from the config", table, side)],
            );
            return;
        }
        Err(e) => {
            result.fail(
                CheckResult::fail(&name, format!("{}: cannot inspect {}", side, table)),
                format!("{:#}", e),
                vec!["Check that the configured user may read table metadata".to_string()],
            );
            return;
        }
    };

    let missing: Vec<&str> = required
        .filter(|col| layout.column(col).is_none())
        .map(String::as_str)
        .collect();

    if missing.is_empty() {
        result
            .tables
            .push(CheckResult::pass(&name, format!("{}: {} ok", side, table)));
    } else {
        result.fail(
            CheckResult::fail(
                &name,
                format!("{}: {} is missing {}", side, table, missing.join(", ")),
            ),
            format!("Table {} in {} lacks required columns", table, side),
            vec![format!(
                "Add {} to {} or fix key_columns in the config",
                missing.join(", "),
                table
            )],
        );
    }
}
