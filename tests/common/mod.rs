// ABOUTME: Shared fixture for integration tests - a CloudDb and a LocalDb SQLite file
// ABOUTME: Both carry HMS-shaped tables; the cloud side has the Synced flag

#![allow(dead_code)]

use rusqlite::Connection;
use std::path::PathBuf;
use tempfile::TempDir;

use table_replicator::ConnectionStrings;

const CLOUD_SCHEMA: &str = "
    CREATE TABLE HMS_GUESTS (
        GUEST_CODE TEXT NOT NULL,
        NAME TEXT,
        PHONE TEXT,
        Synced INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE HMS_CHECKIN_HEADER (
        Auto_No INTEGER NOT NULL,
        RESV_ID TEXT NOT NULL,
        CHECKIN_ID TEXT NOT NULL,
        ROOM_NO TEXT,
        Synced INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE HMS_CHECKIN_LINES (
        Auto_No INTEGER NOT NULL,
        RESV_ID TEXT NOT NULL,
        CHECKIN_ID TEXT NOT NULL,
        LINE_NO INTEGER NOT NULL,
        AMOUNT REAL,
        Synced INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE HMS_RESERVATION_ROOM_GUEST (
        Auto_No INTEGER NOT NULL,
        RESV_ID TEXT NOT NULL,
        GUEST_CODE TEXT NOT NULL,
        Synced INTEGER NOT NULL DEFAULT 0
    );
";

const LOCAL_SCHEMA: &str = "
    CREATE TABLE HMS_GUESTS (
        GUEST_CODE TEXT PRIMARY KEY,
        NAME TEXT,
        PHONE TEXT
    );
    CREATE TABLE HMS_CHECKIN_HEADER (
        Auto_No INTEGER PRIMARY KEY AUTOINCREMENT,
        RESV_ID TEXT NOT NULL,
        CHECKIN_ID TEXT NOT NULL,
        ROOM_NO TEXT
    );
    CREATE TABLE HMS_CHECKIN_LINES (
        LINE_ID INTEGER PRIMARY KEY,
        Auto_No INTEGER NOT NULL,
        RESV_ID TEXT NOT NULL,
        CHECKIN_ID TEXT NOT NULL,
        LINE_NO INTEGER NOT NULL,
        AMOUNT REAL
    );
    CREATE TABLE HMS_RESERVATION_ROOM_GUEST (
        Auto_No INTEGER PRIMARY KEY AUTOINCREMENT,
        RESV_ID TEXT NOT NULL,
        GUEST_CODE TEXT NOT NULL
    );
";

pub struct Fixture {
    pub dir: TempDir,
    pub cloud_path: PathBuf,
    pub local_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cloud_path = dir.path().join("cloud.db");
        let local_path = dir.path().join("local.db");

        Connection::open(&cloud_path)
            .unwrap()
            .execute_batch(CLOUD_SCHEMA)
            .unwrap();
        Connection::open(&local_path)
            .unwrap()
            .execute_batch(LOCAL_SCHEMA)
            .unwrap();

        Self {
            dir,
            cloud_path,
            local_path,
        }
    }

    pub fn cloud(&self) -> Connection {
        Connection::open(&self.cloud_path).unwrap()
    }

    pub fn local(&self) -> Connection {
        Connection::open(&self.local_path).unwrap()
    }

    pub fn cloud_url(&self) -> String {
        format!("sqlite://{}", self.cloud_path.display())
    }

    pub fn local_url(&self) -> String {
        format!("sqlite://{}", self.local_path.display())
    }

    pub fn connections(&self) -> ConnectionStrings {
        ConnectionStrings::new(self.cloud_url(), self.local_url())
    }

    /// Write a config file for the CLI that syncs `tables` (name, key columns).
    pub fn write_config(&self, tables: &[(&str, &[&str])]) -> PathBuf {
        let mut text = format!(
            "sync_interval_secs = 1\n\n[connection_strings]\nCloudDb = \"{}\"\nLocalDb = \"{}\"\n",
            self.cloud_url(),
            self.local_url()
        );
        for (name, keys) in tables {
            let keys = keys
                .iter()
                .map(|k| format!("\"{}\"", k))
                .collect::<Vec<_>>()
                .join(", ");
            text.push_str(&format!(
                "\n[[tables]]\nname = \"{}\"\nkey_columns = [{}]\n",
                name, keys
            ));
        }
        let path = self.dir.path().join("replicator.toml");
        std::fs::write(&path, text).unwrap();
        path
    }
}

/// Count rows of `table` matching an optional SQL condition.
pub fn count(conn: &Connection, table: &str, condition: &str) -> i64 {
    let sql = if condition.is_empty() {
        format!("SELECT COUNT(*) FROM {}", table)
    } else {
        format!("SELECT COUNT(*) FROM {} WHERE {}", table, condition)
    };
    conn.query_row(&sql, [], |row| row.get(0)).unwrap()
}

pub fn unsynced(conn: &Connection, table: &str) -> i64 {
    count(conn, table, "Synced = 0")
}
