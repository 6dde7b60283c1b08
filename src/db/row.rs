// ABOUTME: Ordered row representation with case-insensitive column lookup
// ABOUTME: Keeps the column names exactly as the source database reported them

use super::value::Value;

/// One record fetched from a table.
///
/// Columns keep the order and spelling the database returned; lookups ignore
/// ASCII case so `auto_no`, `Auto_No` and `AUTO_NO` all address the same column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            columns: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|(name, _)| name.eq_ignore_ascii_case(column))
    }

    pub fn contains(&self, column: &str) -> bool {
        self.position(column).is_some()
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.position(column).map(|idx| &self.columns[idx].1)
    }

    /// The stored spelling of `column`, if present.
    pub fn column_name(&self, column: &str) -> Option<&str> {
        self.position(column).map(|idx| self.columns[idx].0.as_str())
    }

    /// Set a column, replacing an existing one regardless of case.
    ///
    /// A replaced column keeps its original spelling and position.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.position(&column) {
            Some(idx) => self.columns[idx].1 = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.position(column).map(|idx| self.columns.remove(idx).1)
    }

    /// Copy of this row without the listed columns (case-insensitive).
    pub fn without(&self, excluded: &[String]) -> Row {
        Row {
            columns: self
                .columns
                .iter()
                .filter(|(name, _)| !excluded.iter().any(|e| e.eq_ignore_ascii_case(name)))
                .cloned()
                .collect(),
        }
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (name, value) in iter {
            row.insert(name, value);
        }
        row
    }
}
