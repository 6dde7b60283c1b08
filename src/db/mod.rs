// ABOUTME: Backend-neutral database connection used by the sync routine
// ABOUTME: Wraps a tokio_postgres client or a rusqlite connection behind one API

pub mod layout;
pub mod row;
pub mod value;

use anyhow::{Context, Result};
use rusqlite::OptionalExtension;
use tokio_postgres::types::ToSql as PgToSql;

pub use layout::TableLayout;
pub use row::Row;
pub use value::Value;

use crate::utils::{detect_backend, sqlite_path, strip_password_from_url, Backend};

/// SQL flavour differences the query builders need to know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    /// Positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", index),
            Dialect::Sqlite => format!("?{}", index),
        }
    }

    /// Equality operator under which NULL matches NULL.
    pub fn null_safe_eq(&self) -> &'static str {
        match self {
            Dialect::Postgres => "IS NOT DISTINCT FROM",
            Dialect::Sqlite => "IS",
        }
    }
}

/// An open connection to either side of the replication.
///
/// Dropping the value closes the connection.
pub enum DbConnection {
    Postgres(tokio_postgres::Client),
    Sqlite(rusqlite::Connection),
}

impl DbConnection {
    /// Open a connection described by `url`.
    ///
    /// `name` identifies the connection string in error messages
    /// (e.g. "CloudDb").
    pub async fn connect(name: &str, url: &str) -> Result<Self> {
        let backend = detect_backend(name, url)?;
        tracing::debug!("Connecting to {} ({})", name, strip_password_from_url(url));

        let conn = match backend {
            Backend::Postgres => DbConnection::Postgres(
                crate::postgres::connect(url)
                    .await
                    .with_context(|| format!("Failed to connect to {}", name))?,
            ),
            Backend::Sqlite => {
                let path = sqlite_path(url.trim()).unwrap_or_default();
                DbConnection::Sqlite(
                    crate::sqlite::open_sqlite(path)
                        .with_context(|| format!("Failed to connect to {}", name))?,
                )
            }
        };
        Ok(conn)
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            DbConnection::Postgres(_) => Dialect::Postgres,
            DbConnection::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Run a query and materialize every returned row.
    pub async fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        match self {
            DbConnection::Postgres(client) => {
                let refs = pg_params(params);
                let rows = client
                    .query(sql, &refs)
                    .await
                    .with_context(|| format!("Query failed: {}", sql))?;
                rows.iter().map(crate::postgres::pg_row_to_row).collect()
            }
            DbConnection::Sqlite(conn) => {
                let mut stmt = conn
                    .prepare(sql)
                    .with_context(|| format!("Failed to prepare: {}", sql))?;
                let names: Vec<String> = stmt
                    .column_names()
                    .into_iter()
                    .map(String::from)
                    .collect();

                let mut rows = stmt
                    .query(rusqlite::params_from_iter(params.iter()))
                    .with_context(|| format!("Query failed: {}", sql))?;

                let mut out = Vec::new();
                while let Some(row) = rows.next().with_context(|| format!("Query failed: {}", sql))? {
                    let mut record = Row::with_capacity(names.len());
                    for (idx, name) in names.iter().enumerate() {
                        record.insert(name.as_str(), crate::sqlite::value_from_ref(row.get_ref(idx)?));
                    }
                    out.push(record);
                }
                Ok(out)
            }
        }
    }

    /// Run a query expected to return at most one row (e.g. `... LIMIT 1`).
    pub async fn query_opt(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        match self {
            DbConnection::Postgres(client) => {
                let refs = pg_params(params);
                let row = client
                    .query_opt(sql, &refs)
                    .await
                    .with_context(|| format!("Query failed: {}", sql))?;
                row.as_ref().map(crate::postgres::pg_row_to_row).transpose()
            }
            DbConnection::Sqlite(conn) => {
                let mut stmt = conn
                    .prepare(sql)
                    .with_context(|| format!("Failed to prepare: {}", sql))?;
                let names: Vec<String> = stmt
                    .column_names()
                    .into_iter()
                    .map(String::from)
                    .collect();

                let mut rows = stmt
                    .query(rusqlite::params_from_iter(params.iter()))
                    .with_context(|| format!("Query failed: {}", sql))?;
                let Some(row) = rows.next().with_context(|| format!("Query failed: {}", sql))? else {
                    return Ok(None);
                };
                let mut record = Row::with_capacity(names.len());
                for (idx, name) in names.iter().enumerate() {
                    record.insert(name.as_str(), crate::sqlite::value_from_ref(row.get_ref(idx)?));
                }
                Ok(Some(record))
            }
        }
    }

    /// Execute a statement and return the number of affected rows.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        match self {
            DbConnection::Postgres(client) => {
                let refs = pg_params(params);
                client
                    .execute(sql, &refs)
                    .await
                    .with_context(|| format!("Statement failed: {}", sql))
            }
            DbConnection::Sqlite(conn) => {
                let affected = conn
                    .execute(sql, rusqlite::params_from_iter(params.iter()))
                    .with_context(|| format!("Statement failed: {}", sql))?;
                Ok(affected as u64)
            }
        }
    }

    /// Layout of `table` as stored, matching the name ignoring ASCII case.
    ///
    /// Returns `None` when no such table exists. On PostgreSQL only the
    /// current schema is searched, and an exact spelling wins over a
    /// case-insensitive match.
    pub async fn describe_table(&self, table: &str) -> Result<Option<TableLayout>> {
        match self {
            DbConnection::Postgres(client) => {
                let rows = client
                    .query(
                        "SELECT table_name::text, column_name::text
                         FROM information_schema.columns
                         WHERE table_schema = current_schema()
                           AND lower(table_name::text) = lower($1::text)
                         ORDER BY (table_name::text = $1::text) DESC, table_name, ordinal_position",
                        &[&table],
                    )
                    .await
                    .with_context(|| format!("Failed to get columns for {}", table))?;

                let Some(first) = rows.first() else {
                    return Ok(None);
                };
                let name: String = first.get(0);
                let columns = rows
                    .iter()
                    .filter(|row| row.get::<_, &str>(0) == name)
                    .map(|row| row.get(1))
                    .collect();
                Ok(Some(TableLayout::new(name, columns)))
            }
            DbConnection::Sqlite(conn) => {
                let name: Option<String> = conn
                    .query_row(
                        "SELECT name FROM sqlite_master
                         WHERE type IN ('table', 'view') AND name = ?1 COLLATE NOCASE
                         ORDER BY name = ?1 DESC
                         LIMIT 1",
                        [table],
                        |row| row.get(0),
                    )
                    .optional()
                    .with_context(|| format!("Failed to look up table {}", table))?;
                let Some(name) = name else {
                    return Ok(None);
                };

                let mut stmt = conn
                    .prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")
                    .context("Failed to prepare table_info query")?;
                let columns = stmt
                    .query_map([&name], |row| row.get::<_, String>(0))
                    .with_context(|| format!("Failed to get columns for {}", name))?
                    .collect::<Result<Vec<String>, _>>()
                    .with_context(|| format!("Failed to collect columns for {}", name))?;
                Ok(Some(TableLayout::new(name, columns)))
            }
        }
    }
}

fn pg_params(params: &[Value]) -> Vec<&(dyn PgToSql + Sync)> {
    params.iter().map(|v| v as &(dyn PgToSql + Sync)).collect()
}
