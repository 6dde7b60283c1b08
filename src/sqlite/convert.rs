// ABOUTME: Conversion between rusqlite values and Value
// ABOUTME: Timestamps, dates and decimals travel as text in SQLite

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};

use crate::db::value::{DATETIME_FORMAT, DATE_FORMAT};
use crate::db::Value;

/// Convert a borrowed SQLite value into a [`Value`].
///
/// SQLite only has five storage classes, so the result is always one of
/// Null, Int, Float, Text or Bytes. Text that is not valid UTF-8 is replaced
/// lossily rather than failing the whole fetch.
pub fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        use rusqlite::types::Value as SqliteValue;

        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqliteValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqliteValue::Integer(i64::from(*b))),
            Value::Int(i) => ToSqlOutput::Owned(SqliteValue::Integer(*i)),
            Value::Decimal(d) => ToSqlOutput::Owned(SqliteValue::Text(d.to_string())),
            Value::Float(f) => ToSqlOutput::Owned(SqliteValue::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::DateTime(dt) => {
                ToSqlOutput::Owned(SqliteValue::Text(dt.format(DATETIME_FORMAT).to_string()))
            }
            Value::Date(d) => {
                ToSqlOutput::Owned(SqliteValue::Text(d.format(DATE_FORMAT).to_string()))
            }
            Value::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}
