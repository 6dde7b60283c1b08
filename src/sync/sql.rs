// ABOUTME: SQL text builders for the fetch, upsert and mark-synced statements
// ABOUTME: Identifiers are quoted and interpolated; values are always placeholders

use crate::db::Dialect;
use crate::utils::quote_ident;

/// `"k1" IS NOT DISTINCT FROM $n AND ...`, numbering placeholders from `first`.
///
/// Key columns may hold NULL, and a NULL key must still find its own row.
fn key_predicate<S: AsRef<str>>(dialect: Dialect, keys: &[S], first: usize) -> String {
    keys.iter()
        .enumerate()
        .map(|(i, key)| {
            format!(
                "{} {} {}",
                quote_ident(key.as_ref()),
                dialect.null_safe_eq(),
                dialect.placeholder(first + i)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote_ident(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every column of every row still waiting to be replicated.
/// Parameters: the unsynced flag value.
///
/// ```sql
/// SELECT * FROM "table" WHERE "Synced" = $1
/// ```
pub fn select_unsynced(dialect: Dialect, table: &str, synced: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = {}",
        quote_ident(table),
        quote_ident(synced),
        dialect.placeholder(1)
    )
}

/// Existence check on the key columns. Parameters: key values in order.
///
/// ```sql
/// SELECT 1 FROM "table" WHERE "k1" IS NOT DISTINCT FROM $1 AND ... LIMIT 1
/// ```
pub fn row_exists<S: AsRef<str>>(dialect: Dialect, table: &str, keys: &[S]) -> String {
    format!(
        "SELECT 1 FROM {} WHERE {} LIMIT 1",
        quote_ident(table),
        key_predicate(dialect, keys, 1)
    )
}

/// Parameters: the `set_columns` values, then the key values.
///
/// ```sql
/// UPDATE "table" SET "a" = $1, "b" = $2 WHERE "k1" IS NOT DISTINCT FROM $3
/// ```
pub fn update_row<S: AsRef<str>, K: AsRef<str>>(
    dialect: Dialect,
    table: &str,
    set_columns: &[S],
    keys: &[K],
) -> String {
    let assignments = set_columns
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = {}", quote_ident(c.as_ref()), dialect.placeholder(i + 1)))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "UPDATE {} SET {} WHERE {}",
        quote_ident(table),
        assignments,
        key_predicate(dialect, keys, set_columns.len() + 1)
    )
}

/// Parameters: the column values in order.
///
/// ```sql
/// INSERT INTO "table" ("a", "b") VALUES ($1, $2)
/// ```
pub fn insert_row<S: AsRef<str>>(dialect: Dialect, table: &str, columns: &[S]) -> String {
    let placeholders = (1..=columns.len())
        .map(|i| dialect.placeholder(i))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        column_list(columns),
        placeholders
    )
}

/// Flag one fetched row as replicated. Parameters: the synced flag value,
/// then the key values in order.
///
/// ```sql
/// UPDATE "table" SET "Synced" = $1 WHERE "k1" IS NOT DISTINCT FROM $2
/// ```
pub fn mark_synced<S: AsRef<str>>(
    dialect: Dialect,
    table: &str,
    synced: &str,
    keys: &[S],
) -> String {
    format!(
        "UPDATE {} SET {} = {} WHERE {}",
        quote_ident(table),
        quote_ident(synced),
        dialect.placeholder(1),
        key_predicate(dialect, keys, 2)
    )
}

/// Read one column from the first row matching `match_columns`.
///
/// ```sql
/// SELECT "Auto_No" FROM "HMS_CHECKIN_HEADER"
/// WHERE "RESV_ID" IS NOT DISTINCT FROM $1 AND "CHECKIN_ID" IS NOT DISTINCT FROM $2 LIMIT 1
/// ```
pub fn select_column<S: AsRef<str>>(
    dialect: Dialect,
    table: &str,
    column: &str,
    match_columns: &[S],
) -> String {
    format!(
        "SELECT {} FROM {} WHERE {} LIMIT 1",
        quote_ident(column),
        quote_ident(table),
        key_predicate(dialect, match_columns, 1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_unsynced_binds_flag() {
        assert_eq!(
            select_unsynced(Dialect::Postgres, "HMS_GUESTS", "Synced"),
            "SELECT * FROM \"HMS_GUESTS\" WHERE \"Synced\" = $1"
        );
        assert_eq!(
            select_unsynced(Dialect::Sqlite, "hms_rooms", "synced"),
            "SELECT * FROM \"hms_rooms\" WHERE \"synced\" = ?1"
        );
    }

    #[test]
    fn test_row_exists_composite_key() {
        assert_eq!(
            row_exists(Dialect::Postgres, "HMS_CHECKIN_LINES", &["RESV_ID", "LINE_NO"]),
            "SELECT 1 FROM \"HMS_CHECKIN_LINES\" WHERE \"RESV_ID\" IS NOT DISTINCT FROM $1 \
             AND \"LINE_NO\" IS NOT DISTINCT FROM $2 LIMIT 1"
        );
        assert_eq!(
            row_exists(Dialect::Sqlite, "HMS_GUESTS", &["GUEST_CODE"]),
            "SELECT 1 FROM \"HMS_GUESTS\" WHERE \"GUEST_CODE\" IS ?1 LIMIT 1"
        );
    }

    #[test]
    fn test_update_numbers_keys_after_set_columns() {
        let query = update_row(
            Dialect::Sqlite,
            "HMS_GUESTS",
            &["NAME", "PHONE"],
            &["GUEST_CODE", "BRANCH"],
        );
        assert_eq!(
            query,
            "UPDATE \"HMS_GUESTS\" SET \"NAME\" = ?1, \"PHONE\" = ?2 \
             WHERE \"GUEST_CODE\" IS ?3 AND \"BRANCH\" IS ?4"
        );
    }

    #[test]
    fn test_insert_row() {
        assert_eq!(
            insert_row(Dialect::Sqlite, "HMS_GUESTS", &["GUEST_CODE", "NAME"]),
            "INSERT INTO \"HMS_GUESTS\" (\"GUEST_CODE\", \"NAME\") VALUES (?1, ?2)"
        );
    }

    #[test]
    fn test_mark_synced_numbers_keys_after_flag() {
        assert_eq!(
            mark_synced(Dialect::Postgres, "HMS_GUESTS", "Synced", &["GUEST_CODE"]),
            "UPDATE \"HMS_GUESTS\" SET \"Synced\" = $1 WHERE \"GUEST_CODE\" IS NOT DISTINCT FROM $2"
        );
    }

    #[test]
    fn test_select_column_takes_first_match() {
        assert_eq!(
            select_column(
                Dialect::Sqlite,
                "HMS_CHECKIN_HEADER",
                "Auto_No",
                &["RESV_ID", "CHECKIN_ID"]
            ),
            "SELECT \"Auto_No\" FROM \"HMS_CHECKIN_HEADER\" \
             WHERE \"RESV_ID\" IS ?1 AND \"CHECKIN_ID\" IS ?2 LIMIT 1"
        );
    }
}
