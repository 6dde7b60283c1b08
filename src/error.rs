// ABOUTME: Domain errors the sync routine raises on purpose
// ABOUTME: Database failures travel as anyhow errors with context instead

use thiserror::Error;

/// Errors callers may want to tell apart from plain database failures.
///
/// They are usually wrapped in an `anyhow::Error`; use
/// `err.downcast_ref::<SyncError>()` to match on them.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A child row cannot be inserted because its parent has no local copy yet.
    #[error(
        "no local {parent_table} row matches {table} row ({}); cannot resolve {identity_column}",
        describe_match(.match_values)
    )]
    MissingParent {
        table: String,
        parent_table: String,
        identity_column: String,
        match_values: Vec<(String, String)>,
    },

    /// A fetched row lacks a column the configuration requires.
    #[error("row fetched from {table} has no column {column}")]
    MissingColumn { table: String, column: String },

    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier { identifier: String, reason: String },

    #[error("unsupported connection string for {name}: {reason}")]
    UnsupportedConnectionString { name: String, reason: String },
}

fn describe_match(values: &[(String, String)]) -> String {
    values
        .iter()
        .map(|(column, value)| format!("{}={}", column, value))
        .collect::<Vec<_>>()
        .join(", ")
}
