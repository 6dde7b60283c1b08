// ABOUTME: Per-table replication rules - column exclusions and parent key backfill
// ABOUTME: Built-in rules cover the HMS check-in and reservation tables

/// Flag column on every cloud table; never copied to the local database.
pub const SYNCED_COLUMN: &str = "Synced";

const AUTO_NO: &str = "Auto_No";
const CHECKIN_HEADER: &str = "HMS_CHECKIN_HEADER";
const CHECKIN_LINES: &str = "HMS_CHECKIN_LINES";
const RESERVATION_ROOM_GUEST: &str = "HMS_RESERVATION_ROOM_GUEST";

/// How to find the local identity of a child row's parent before inserting it.
///
/// The child's `identity_column` is overwritten with the value of the parent's
/// `identity_column` from the local parent row whose `match_columns` equal the
/// child's values for the same columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentLookup {
    pub parent_table: String,
    pub match_columns: Vec<String>,
    pub identity_column: String,
}

/// Column handling that differs from the plain "copy every column" upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableRules {
    /// Non-key columns an UPDATE must leave untouched.
    pub skip_on_update: Vec<String>,
    /// Columns dropped from an INSERT (local identity columns).
    pub skip_on_insert: Vec<String>,
    /// Re-parenting applied before an INSERT.
    pub parent_lookup: Option<ParentLookup>,
}

impl TableRules {
    /// Rules the replicator applies to `table` without any configuration.
    ///
    /// - `HMS_CHECKIN_HEADER`: `Auto_No` is a local identity; never updated, never inserted.
    /// - `HMS_RESERVATION_ROOM_GUEST`: `Auto_No` is a local identity; never inserted.
    /// - `HMS_CHECKIN_LINES`: `Auto_No` on insert is taken from the local
    ///   `HMS_CHECKIN_HEADER` row with the same `RESV_ID` and `CHECKIN_ID`.
    pub fn builtin(table: &str) -> Self {
        if table.eq_ignore_ascii_case(CHECKIN_HEADER) {
            TableRules {
                skip_on_update: vec![AUTO_NO.to_string()],
                skip_on_insert: vec![AUTO_NO.to_string()],
                parent_lookup: None,
            }
        } else if table.eq_ignore_ascii_case(RESERVATION_ROOM_GUEST) {
            TableRules {
                skip_on_insert: vec![AUTO_NO.to_string()],
                ..TableRules::default()
            }
        } else if table.eq_ignore_ascii_case(CHECKIN_LINES) {
            TableRules {
                parent_lookup: Some(ParentLookup {
                    parent_table: CHECKIN_HEADER.to_string(),
                    match_columns: vec!["RESV_ID".to_string(), "CHECKIN_ID".to_string()],
                    identity_column: AUTO_NO.to_string(),
                }),
                ..TableRules::default()
            }
        } else {
            TableRules::default()
        }
    }

    /// Add configured exclusions on top of the current rules, skipping duplicates.
    pub fn extend(mut self, skip_on_update: &[String], skip_on_insert: &[String]) -> Self {
        merge_columns(&mut self.skip_on_update, skip_on_update);
        merge_columns(&mut self.skip_on_insert, skip_on_insert);
        self
    }

    /// Every identifier these rules will place in SQL text.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .skip_on_update
            .iter()
            .chain(&self.skip_on_insert)
            .map(String::as_str)
            .collect();
        if let Some(lookup) = &self.parent_lookup {
            names.push(&lookup.parent_table);
            names.push(&lookup.identity_column);
            names.extend(lookup.match_columns.iter().map(String::as_str));
        }
        names
    }
}

fn merge_columns(into: &mut Vec<String>, extra: &[String]) {
    for column in extra {
        if !into.iter().any(|c| c.eq_ignore_ascii_case(column)) {
            into.push(column.clone());
        }
    }
}
