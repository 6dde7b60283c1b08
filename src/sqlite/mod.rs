// ABOUTME: SQLite backend - opening database files and converting values
// ABOUTME: Never creates a database; the local or cloud file must already exist

pub mod convert;

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

pub use convert::value_from_ref;

/// Open an existing SQLite database for reading and writing.
///
/// Fails when the file does not exist: a typo in a connection string must not
/// leave behind a fresh, empty database that then receives replicated rows.
pub fn open_sqlite(path: &str) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    if !path.starts_with("file:") && !Path::new(path).exists() {
        anyhow::bail!("SQLite database '{}' does not exist", path);
    }

    let conn = Connection::open_with_flags(path, flags)
        .with_context(|| format!("Failed to open SQLite database '{}'", path))?;

    tracing::debug!("Opened SQLite database '{}'", path);

    Ok(conn)
}
