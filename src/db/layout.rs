// ABOUTME: TableLayout - a table's name and columns exactly as the database stores them
// ABOUTME: Maps configured names onto stored spellings before they are quoted into SQL

/// Name and column names of one table, spelled the way the database stores them.
///
/// Quoted identifiers are case-sensitive in PostgreSQL, so a table created
/// without quotes stores `hms_rooms.synced` while the configuration says
/// `HMS_ROOMS` and the flag column is `Synced`. Every name that reaches SQL
/// text goes through [`TableLayout::spell`] first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableLayout {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Stored spelling of `column`, matched ignoring ASCII case.
    ///
    /// An exact match wins over a case-insensitive one, so a table that has
    /// both `Synced` and `synced` resolves each to itself.
    pub fn column(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.as_str() == column)
            .or_else(|| self.columns.iter().find(|c| c.eq_ignore_ascii_case(column)))
            .map(String::as_str)
    }

    /// Stored spelling of `column`, or `column` itself when the table lacks it.
    ///
    /// Falling back keeps the statement as written, so the database reports
    /// the missing column by name.
    pub fn spell<'a>(&'a self, column: &'a str) -> &'a str {
        self.column(column).unwrap_or(column)
    }
}
