// ABOUTME: SyncTarget - one configured table and the key used to match its rows
// ABOUTME: Validated once at startup so every name is safe to interpolate into SQL

use anyhow::{bail, Context, Result};

use super::rules::{TableRules, SYNCED_COLUMN};
use crate::utils::validate_identifier;

/// A table to replicate from the cloud database into the local one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    pub table: String,
    /// Columns that identify a row on both sides, in configured order.
    pub key_columns: Vec<String>,
    pub rules: TableRules,
}

impl SyncTarget {
    /// Build a target with the built-in rules for `table`.
    pub fn new(table: impl Into<String>, key_columns: Vec<String>) -> Result<Self> {
        let table = table.into();
        let rules = TableRules::builtin(&table);
        Self::with_rules(table, key_columns, rules)
    }

    /// Build a target with explicit rules. Validates every identifier.
    pub fn with_rules(table: String, key_columns: Vec<String>, rules: TableRules) -> Result<Self> {
        validate_identifier(&table).context("Invalid table name")?;

        if key_columns.is_empty() {
            bail!("Table {} has no key columns", table);
        }
        for (i, key) in key_columns.iter().enumerate() {
            validate_identifier(key)
                .with_context(|| format!("Invalid key column for table {}", table))?;
            if key.eq_ignore_ascii_case(SYNCED_COLUMN) {
                bail!("Table {}: {} cannot be a key column", table, SYNCED_COLUMN);
            }
            if key_columns[..i].iter().any(|k| k.eq_ignore_ascii_case(key)) {
                bail!("Table {}: key column {} is listed twice", table, key);
            }
        }
        for name in rules.identifiers() {
            validate_identifier(name)
                .with_context(|| format!("Invalid column in rules for table {}", table))?;
        }

        Ok(Self {
            table,
            key_columns,
            rules,
        })
    }

    pub fn is_key_column(&self, column: &str) -> bool {
        self.key_columns
            .iter()
            .any(|k| k.eq_ignore_ascii_case(column))
    }
}
