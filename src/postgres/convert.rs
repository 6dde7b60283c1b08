// ABOUTME: Conversion between tokio_postgres wire types and Value
// ABOUTME: Binds Value parameters to whatever column type the server inferred

use anyhow::{bail, Context, Result};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use std::error::Error;
use std::str::FromStr;
use tokio_postgres::types::{to_sql_checked, IsNull, ToSql, Type};
use tokio_postgres::Row as PgRow;

use crate::db::value::{DATETIME_FORMAT, DATE_FORMAT};
use crate::db::{Row, Value};

type BoxError = Box<dyn Error + Sync + Send>;

/// Convert a tokio_postgres row into a [`Row`], keeping column order and names.
pub fn pg_row_to_row(row: &PgRow) -> Result<Row> {
    let mut out = Row::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let value = read_column(row, idx, column.type_()).with_context(|| {
            format!(
                "Failed to read column {} ({})",
                column.name(),
                column.type_().name()
            )
        })?;
        out.insert(column.name(), value);
    }
    Ok(out)
}

fn read_column(row: &PgRow, idx: usize, ty: &Type) -> Result<Value> {
    let value: Value = if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx)?.into()
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)?.map(i64::from).into()
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)?.map(i64::from).into()
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx)?.into()
    } else if *ty == Type::OID {
        row.try_get::<_, Option<u32>>(idx)?.map(i64::from).into()
    } else if *ty == Type::NUMERIC {
        row.try_get::<_, Option<Decimal>>(idx)?.into()
    } else if *ty == Type::FLOAT4 {
        opt(row.try_get::<_, Option<f32>>(idx)?, |f| Value::Float(f64::from(f)))
    } else if *ty == Type::FLOAT8 {
        opt(row.try_get::<_, Option<f64>>(idx)?, Value::Float)
    } else if is_text(ty) {
        row.try_get::<_, Option<String>>(idx)?.into()
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?.into()
    } else if *ty == Type::TIMESTAMPTZ {
        opt(row.try_get::<_, Option<DateTime<Utc>>>(idx)?, |dt| {
            Value::DateTime(dt.naive_utc())
        })
    } else if *ty == Type::DATE {
        opt(row.try_get::<_, Option<NaiveDate>>(idx)?, Value::Date)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        opt(row.try_get::<_, Option<serde_json::Value>>(idx)?, |v| {
            Value::Text(v.to_string())
        })
    } else if *ty == Type::UUID {
        opt(row.try_get::<_, Option<uuid::Uuid>>(idx)?, |u| {
            Value::Text(u.to_string())
        })
    } else if *ty == Type::BYTEA {
        opt(row.try_get::<_, Option<Vec<u8>>>(idx)?, Value::Bytes)
    } else {
        bail!("unsupported column type {}", ty.name());
    };
    Ok(value)
}

fn opt<T>(value: Option<T>, f: impl FnOnce(T) -> Value) -> Value {
    value.map(f).unwrap_or(Value::Null)
}

fn is_text(ty: &Type) -> bool {
    *ty == Type::TEXT
        || *ty == Type::VARCHAR
        || *ty == Type::BPCHAR
        || *ty == Type::NAME
        || *ty == Type::UNKNOWN
}

fn is_integer(ty: &Type) -> bool {
    *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8 || *ty == Type::OID
}

fn mismatch(value: &Value, ty: &Type) -> BoxError {
    format!("cannot bind {} value to column of type {}", value.kind(), ty.name()).into()
}

fn bind_int(i: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::INT2 {
        i16::try_from(i)?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(i)?.to_sql(ty, out)
    } else if *ty == Type::INT8 {
        i.to_sql(ty, out)
    } else if *ty == Type::OID {
        u32::try_from(i)?.to_sql(ty, out)
    } else if *ty == Type::BOOL {
        (i != 0).to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from(i).to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (i as f32).to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        (i as f64).to_sql(ty, out)
    } else if is_text(ty) {
        i.to_string().to_sql(ty, out)
    } else {
        Err(mismatch(&Value::Int(i), ty))
    }
}

fn bind_decimal(d: Decimal, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::NUMERIC {
        d.to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        d.to_f64()
            .ok_or_else(|| format!("{} does not fit in float8", d))?
            .to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        d.to_f32()
            .ok_or_else(|| format!("{} does not fit in float4", d))?
            .to_sql(ty, out)
    } else if is_integer(ty) {
        if !d.fract().is_zero() {
            return Err(format!("{} has a fractional part; column is {}", d, ty.name()).into());
        }
        let i = d
            .to_i64()
            .ok_or_else(|| format!("{} does not fit in a 64-bit integer", d))?;
        bind_int(i, ty, out)
    } else if is_text(ty) {
        d.to_string().to_sql(ty, out)
    } else {
        Err(mismatch(&Value::Decimal(d), ty))
    }
}

fn bind_float(f: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::FLOAT8 {
        f.to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (f as f32).to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from_f64(f)
            .ok_or_else(|| format!("{} cannot be represented as numeric", f))?
            .to_sql(ty, out)
    } else if is_integer(ty) && f.fract() == 0.0 {
        bind_int(f as i64, ty, out)
    } else if is_text(ty) {
        f.to_string().to_sql(ty, out)
    } else {
        Err(mismatch(&Value::Float(f), ty))
    }
}

fn bind_text(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if is_text(ty) {
        s.to_sql(ty, out)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out)
    } else if *ty == Type::UUID {
        uuid::Uuid::parse_str(s.trim())?.to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from_str(s.trim())?.to_sql(ty, out)
    } else if is_integer(ty) {
        bind_int(s.trim().parse::<i64>()?, ty, out)
    } else if *ty == Type::FLOAT4 || *ty == Type::FLOAT8 {
        bind_float(s.trim().parse::<f64>()?, ty, out)
    } else if *ty == Type::BOOL {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" | "yes" => true.to_sql(ty, out),
            "0" | "false" | "f" | "no" => false.to_sql(ty, out),
            other => Err(format!("'{}' is not a boolean", other).into()),
        }
    } else if *ty == Type::TIMESTAMP || *ty == Type::TIMESTAMPTZ {
        bind_datetime(NaiveDateTime::parse_from_str(s.trim(), DATETIME_FORMAT)?, ty, out)
    } else if *ty == Type::DATE {
        NaiveDate::parse_from_str(s.trim(), DATE_FORMAT)?.to_sql(ty, out)
    } else {
        Err(mismatch(&Value::Text(s.to_string()), ty))
    }
}

fn bind_datetime(dt: NaiveDateTime, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::TIMESTAMP {
        dt.to_sql(ty, out)
    } else if *ty == Type::TIMESTAMPTZ {
        Utc.from_utc_datetime(&dt).to_sql(ty, out)
    } else if *ty == Type::DATE {
        dt.date().to_sql(ty, out)
    } else if is_text(ty) {
        dt.format(DATETIME_FORMAT).to_string().to_sql(ty, out)
    } else {
        Err(mismatch(&Value::DateTime(dt), ty))
    }
}

fn bind_date(d: NaiveDate, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::DATE {
        d.to_sql(ty, out)
    } else if *ty == Type::TIMESTAMP || *ty == Type::TIMESTAMPTZ {
        let midnight = d
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| format!("{} has no midnight", d))?;
        bind_datetime(midnight, ty, out)
    } else if is_text(ty) {
        d.format(DATE_FORMAT).to_string().to_sql(ty, out)
    } else {
        Err(mismatch(&Value::Date(d), ty))
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => {
                if *ty == Type::BOOL {
                    b.to_sql(ty, out)
                } else {
                    bind_int(i64::from(*b), ty, out)
                }
            }
            Value::Int(i) => bind_int(*i, ty, out),
            Value::Decimal(d) => bind_decimal(*d, ty, out),
            Value::Float(f) => bind_float(*f, ty, out),
            Value::Text(s) => bind_text(s, ty, out),
            Value::DateTime(dt) => bind_datetime(*dt, ty, out),
            Value::Date(d) => bind_date(*d, ty, out),
            Value::Bytes(b) => {
                if *ty == Type::BYTEA {
                    b.as_slice().to_sql(ty, out)
                } else {
                    Err(mismatch(self, ty))
                }
            }
        }
    }

    // Type compatibility is decided per value in to_sql.
    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: &Value, ty: &Type) -> Result<BytesMut, BoxError> {
        let mut buf = BytesMut::new();
        value.to_sql_checked(ty, &mut buf)?;
        Ok(buf)
    }

    #[test]
    fn test_int_narrows_to_int4() {
        let buf = encode(&Value::Int(42), &Type::INT4).unwrap();
        assert_eq!(&buf[..], &42i32.to_be_bytes());
    }

    #[test]
    fn test_int_out_of_range_for_int2_fails() {
        assert!(encode(&Value::Int(70_000), &Type::INT2).is_err());
    }

    #[test]
    fn test_null_binds_as_null() {
        let mut buf = BytesMut::new();
        let is_null = Value::Null.to_sql_checked(&Type::INT4, &mut buf).unwrap();
        assert!(matches!(is_null, IsNull::Yes));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_text_binds_to_varchar_and_parses_into_int() {
        let buf = encode(&Value::from("G1"), &Type::VARCHAR).unwrap();
        assert_eq!(&buf[..], b"G1");

        let buf = encode(&Value::from(" 7 "), &Type::INT8).unwrap();
        assert_eq!(&buf[..], &7i64.to_be_bytes());
    }

    #[test]
    fn test_decimal_with_fraction_rejected_for_integer_column() {
        let d = Decimal::from_str("12.50").unwrap();
        assert!(encode(&Value::Decimal(d), &Type::INT4).is_err());
        let whole = Decimal::from_str("12.00").unwrap();
        assert!(encode(&Value::Decimal(whole), &Type::INT4).is_ok());
    }

    #[test]
    fn test_bool_into_integer_flag_column() {
        let buf = encode(&Value::Bool(true), &Type::INT2).unwrap();
        assert_eq!(&buf[..], &1i16.to_be_bytes());
    }

    #[test]
    fn test_bytes_only_bind_to_bytea() {
        assert!(encode(&Value::Bytes(vec![1, 2]), &Type::BYTEA).is_ok());
        assert!(encode(&Value::Bytes(vec![1, 2]), &Type::TEXT).is_err());
    }

    #[test]
    fn test_text_timestamp_parses() {
        assert!(encode(&Value::from("2024-01-02 10:11:12"), &Type::TIMESTAMP).is_ok());
        assert!(encode(&Value::from("yesterday"), &Type::TIMESTAMP).is_err());
    }
}
