// ABOUTME: TableSyncer - fetches unsynced cloud rows, upserts them locally, marks them synced
// ABOUTME: One connection per phase; statements run one by one with no transaction

use anyhow::{Context, Result};

use super::rules::{ParentLookup, SYNCED_COLUMN};
use super::sql;
use super::target::SyncTarget;
use crate::config::ConnectionStrings;
use crate::db::{DbConnection, Row, TableLayout, Value};
use crate::error::SyncError;
use crate::utils::validate_identifier;

pub const CLOUD_DB: &str = "CloudDb";
pub const LOCAL_DB: &str = "LocalDb";

const UNSYNCED: Value = Value::Int(0);
const SYNCED: Value = Value::Int(1);

/// What applying a single row did to the local table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Inserted,
    Updated,
}

/// Result of synchronizing one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSyncReport {
    pub table: String,
    /// Unsynced rows fetched from the cloud (and marked synced afterwards).
    pub fetched: u64,
    pub inserted: u64,
    pub updated: u64,
}

impl TableSyncReport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }
}

/// Replicates unsynced rows of one table at a time from CloudDb into LocalDb.
///
/// Each call to [`TableSyncer::sync_table`]:
/// 1. Reads every cloud row with `Synced = 0` over a short-lived connection
/// 2. Upserts each row into the local table over a single local connection
/// 3. Sets `Synced = 1` on the fetched cloud rows over a fresh connection
///
/// Nothing runs inside a transaction. A failure part-way leaves earlier rows
/// applied locally but unmarked in the cloud; they are fetched and applied
/// again on the next call, which is harmless because applying is an upsert.
pub struct TableSyncer {
    connections: ConnectionStrings,
}

impl TableSyncer {
    pub fn new(connections: ConnectionStrings) -> Self {
        Self { connections }
    }

    pub fn connections(&self) -> &ConnectionStrings {
        &self.connections
    }

    /// Synchronize one table. Returns what was fetched and how it was applied.
    ///
    /// When the cloud has no unsynced rows this returns straight after the
    /// fetch: no local connection is opened and nothing is marked.
    pub async fn sync_table(&self, target: &SyncTarget) -> Result<TableSyncReport> {
        let mut report = TableSyncReport::new(&target.table);

        let rows = self.fetch_unsynced(target).await?;
        if rows.is_empty() {
            tracing::debug!("No unsynced rows in {}", target.table);
            return Ok(report);
        }
        report.fetched = rows.len() as u64;

        {
            let local = DbConnection::connect(LOCAL_DB, &self.connections.local_db).await?;
            let local_target = LocalTarget::resolve(&local, target).await?;
            for row in &rows {
                let outcome = apply_row(&local, &local_target, row).await.with_context(|| {
                    format!("Failed to apply row from {} to {}", target.table, LOCAL_DB)
                })?;
                match outcome {
                    ApplyOutcome::Inserted => report.inserted += 1,
                    ApplyOutcome::Updated => report.updated += 1,
                }
            }
        }

        self.mark_synced(target, &rows).await?;

        tracing::info!(
            table = %target.table,
            inserted = report.inserted,
            updated = report.updated,
            "Synced {} rows from {}",
            report.fetched,
            target.table
        );

        Ok(report)
    }

    /// Read every cloud row of `target` still flagged `Synced = 0`.
    pub async fn fetch_unsynced(&self, target: &SyncTarget) -> Result<Vec<Row>> {
        let cloud = DbConnection::connect(CLOUD_DB, &self.connections.cloud_db).await?;
        let (table, synced) = cloud_flag(&cloud, target).await?;
        let rows = cloud
            .query(
                &sql::select_unsynced(cloud.dialect(), &table, &synced),
                &[UNSYNCED],
            )
            .await
            .with_context(|| format!("Failed to read unsynced rows from {}", target.table))?;

        // Column names reported by the cloud are interpolated into local SQL.
        if let Some(first) = rows.first() {
            for column in first.column_names() {
                validate_identifier(column).with_context(|| {
                    format!("Cloud table {} has an unusable column name", target.table)
                })?;
            }
        }

        tracing::debug!("Fetched {} unsynced rows from {}", rows.len(), target.table);
        Ok(rows)
    }

    /// Flag each fetched row as synced, matching on its original key values.
    ///
    /// Rows are matched by key columns, not by any row identity, so the key
    /// columns must be a real candidate key of the cloud table.
    pub async fn mark_synced(&self, target: &SyncTarget, rows: &[Row]) -> Result<()> {
        let cloud = DbConnection::connect(CLOUD_DB, &self.connections.cloud_db).await?;
        let dialect = cloud.dialect();
        let (table, synced) = cloud_flag(&cloud, target).await?;

        for row in rows {
            let (key_names, key_values) = key_values(target, row)?;
            let mut params = Vec::with_capacity(key_values.len() + 1);
            params.push(SYNCED);
            params.extend(key_values.iter().cloned());
            let affected = cloud
                .execute(&sql::mark_synced(dialect, &table, &synced, &key_names), &params)
                .await
                .with_context(|| format!("Failed to mark rows synced in {}", target.table))?;

            match affected {
                1 => {}
                0 => tracing::warn!(
                    "Row {} in {} disappeared before it could be marked synced",
                    describe_key(&key_names, &key_values),
                    target.table
                ),
                n => tracing::warn!(
                    "Marking {} in {} touched {} rows; key columns are not unique in {}",
                    describe_key(&key_names, &key_values),
                    target.table,
                    n,
                    CLOUD_DB
                ),
            }
        }

        Ok(())
    }
}

/// Stored spelling of the cloud table and of its `Synced` column.
///
/// An unknown table keeps its configured name so the database reports it.
async fn cloud_flag(cloud: &DbConnection, target: &SyncTarget) -> Result<(String, String)> {
    let layout = cloud
        .describe_table(&target.table)
        .await
        .with_context(|| format!("Failed to describe {} in {}", target.table, CLOUD_DB))?;

    match layout {
        Some(layout) => {
            let synced = layout
                .column(SYNCED_COLUMN)
                .ok_or_else(|| SyncError::MissingColumn {
                    table: target.table.clone(),
                    column: SYNCED_COLUMN.to_string(),
                })?
                .to_string();
            Ok((layout.name, synced))
        }
        None => Ok((target.table.clone(), SYNCED_COLUMN.to_string())),
    }
}

/// A [`SyncTarget`] bound to the local database's spelling of its tables.
///
/// Quoted names must match the stored ones exactly, so every table and
/// column name is passed through the local layout before it reaches SQL.
#[derive(Debug, Clone)]
pub struct LocalTarget<'a> {
    pub target: &'a SyncTarget,
    pub layout: TableLayout,
    /// Layout of the parent table when the target re-parents its inserts.
    pub parent: Option<TableLayout>,
}

impl<'a> LocalTarget<'a> {
    /// Look up the local layout of `target` and of its parent table.
    ///
    /// Tables the local database lacks keep their configured names, so the
    /// statements that need them fail with the database's own error.
    pub async fn resolve(local: &DbConnection, target: &'a SyncTarget) -> Result<Self> {
        let layout = local_layout(local, &target.table).await?;
        let parent = match &target.rules.parent_lookup {
            Some(lookup) => Some(local_layout(local, &lookup.parent_table).await?),
            None => None,
        };
        Ok(Self {
            target,
            layout,
            parent,
        })
    }

    /// Rename every column of `row` to its local spelling.
    fn spell_row(&self, row: &Row) -> Row {
        row.iter()
            .map(|(name, value)| (self.layout.spell(name).to_string(), value.clone()))
            .collect()
    }
}

async fn local_layout(local: &DbConnection, table: &str) -> Result<TableLayout> {
    let layout = local
        .describe_table(table)
        .await
        .with_context(|| format!("Failed to describe {} in {}", table, LOCAL_DB))?;
    Ok(layout.unwrap_or_else(|| TableLayout::new(table, Vec::new())))
}

/// Upsert one fetched cloud row into the local table.
///
/// The `Synced` column is never copied. Whether the row is inserted or
/// updated depends only on whether a local row with the same key values
/// exists, so applying the same row twice leaves the same local state.
pub async fn apply_row(
    local: &DbConnection,
    local_target: &LocalTarget<'_>,
    row: &Row,
) -> Result<ApplyOutcome> {
    let target = local_target.target;
    let table = &local_target.layout.name;
    let params = local_target.spell_row(&row.without(&[SYNCED_COLUMN.to_string()]));
    let (key_names, key_values) = key_values(target, &params)?;
    let dialect = local.dialect();

    let exists = local
        .query_opt(&sql::row_exists(dialect, table, &key_names), &key_values)
        .await
        .with_context(|| format!("Failed to check for existing row in {}", target.table))?
        .is_some();

    if exists {
        update_existing(local, local_target, &params, &key_names, key_values).await?;
        tracing::debug!(
            "Updated {} in {}",
            describe_key(&key_names, &params_for(&params, &key_names)),
            target.table
        );
        Ok(ApplyOutcome::Updated)
    } else {
        insert_new(local, local_target, &params).await?;
        tracing::debug!(
            "Inserted {} into {}",
            describe_key(&key_names, &params_for(&params, &key_names)),
            target.table
        );
        Ok(ApplyOutcome::Inserted)
    }
}

async fn update_existing(
    local: &DbConnection,
    local_target: &LocalTarget<'_>,
    params: &Row,
    key_names: &[String],
    key_values: Vec<Value>,
) -> Result<()> {
    let target = local_target.target;
    let mut excluded = target.key_columns.clone();
    excluded.extend(target.rules.skip_on_update.iter().cloned());
    let assignments = params.without(&excluded);

    if assignments.is_empty() {
        // Only key (or protected) columns: the matching row is already up to date.
        return Ok(());
    }

    let columns: Vec<&str> = assignments.column_names().collect();
    let mut values: Vec<Value> = assignments.iter().map(|(_, v)| v.clone()).collect();
    values.extend(key_values);

    local
        .execute(
            &sql::update_row(local.dialect(), &local_target.layout.name, &columns, key_names),
            &values,
        )
        .await
        .with_context(|| format!("Failed to update row in {}", target.table))?;
    Ok(())
}

async fn insert_new(local: &DbConnection, local_target: &LocalTarget<'_>, params: &Row) -> Result<()> {
    let target = local_target.target;
    let mut insert = params.without(&target.rules.skip_on_insert);

    if let Some(lookup) = &target.rules.parent_lookup {
        let identity = resolve_parent(local, local_target, lookup, params).await?;
        let column = local_target.layout.spell(&lookup.identity_column).to_string();
        insert.insert(column, identity);
    }

    let columns: Vec<&str> = insert.column_names().collect();
    let values: Vec<Value> = insert.iter().map(|(_, v)| v.clone()).collect();

    local
        .execute(
            &sql::insert_row(local.dialect(), &local_target.layout.name, &columns),
            &values,
        )
        .await
        .with_context(|| format!("Failed to insert row into {}", target.table))?;
    Ok(())
}

/// Find the local identity of the parent row `params` belongs to.
async fn resolve_parent(
    local: &DbConnection,
    local_target: &LocalTarget<'_>,
    lookup: &ParentLookup,
    params: &Row,
) -> Result<Value> {
    let target = local_target.target;
    let mut match_values = Vec::with_capacity(lookup.match_columns.len());
    for column in &lookup.match_columns {
        let value = params.get(column).ok_or_else(|| SyncError::MissingColumn {
            table: target.table.clone(),
            column: column.clone(),
        })?;
        match_values.push(value.clone());
    }

    let fallback;
    let parent = match &local_target.parent {
        Some(parent) => parent,
        None => {
            fallback = TableLayout::new(lookup.parent_table.clone(), Vec::new());
            &fallback
        }
    };
    let match_columns: Vec<&str> = lookup
        .match_columns
        .iter()
        .map(|c| parent.spell(c))
        .collect();
    let query = sql::select_column(
        local.dialect(),
        &parent.name,
        parent.spell(&lookup.identity_column),
        &match_columns,
    );
    let found = local.query_opt(&query, &match_values).await.with_context(|| {
        format!(
            "Failed to look up {} in {}",
            lookup.identity_column, lookup.parent_table
        )
    })?;

    match found {
        Some(parent) => Ok(parent
            .get(&lookup.identity_column)
            .cloned()
            .unwrap_or(Value::Null)),
        None => Err(SyncError::MissingParent {
            table: target.table.clone(),
            parent_table: lookup.parent_table.clone(),
            identity_column: lookup.identity_column.clone(),
            match_values: lookup
                .match_columns
                .iter()
                .cloned()
                .zip(match_values.iter().map(Value::to_string))
                .collect(),
        }
        .into()),
    }
}

/// Key column names (as spelled in `row`) and their values, in configured order.
fn key_values(target: &SyncTarget, row: &Row) -> Result<(Vec<String>, Vec<Value>)> {
    let mut names = Vec::with_capacity(target.key_columns.len());
    let mut values = Vec::with_capacity(target.key_columns.len());
    for key in &target.key_columns {
        let name = row.column_name(key).ok_or_else(|| SyncError::MissingColumn {
            table: target.table.clone(),
            column: key.clone(),
        })?;
        names.push(name.to_string());
        values.push(row.get(key).cloned().unwrap_or(Value::Null));
    }
    Ok((names, values))
}

fn params_for(row: &Row, columns: &[String]) -> Vec<Value> {
    columns
        .iter()
        .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
        .collect()
}

fn describe_key(names: &[String], values: &[Value]) -> String {
    names
        .iter()
        .zip(values)
        .map(|(n, v)| format!("{}={}", n, v))
        .collect::<Vec<_>>()
        .join(", ")
}
