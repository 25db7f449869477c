//! Conversion between `mysql_async` values and [`SqlValue`].
//!
//! Rows are fetched over the binary protocol, so integers and floats arrive
//! typed and everything else arrives as bytes or packed date/time values that
//! need the column type to interpret.

use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::Value;
use rust_decimal::Decimal;

use crate::core::{Column, Row, SqlNullType, SqlValue};

/// Character set id MySQL reports for binary data.
const BINARY_CHARSET: u16 = 63;

/// Convert a result set into rows of `table`. Column metadata is shared by
/// every row of the result set.
pub fn rows_from_mysql(table: &str, rows: Vec<mysql_async::Row>) -> Vec<Row> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let mysql_columns = first.columns();
    let columns: Arc<[Column]> = mysql_columns.iter().map(column_from_mysql).collect();

    rows.into_iter()
        .map(|row| {
            let values = row
                .unwrap()
                .into_iter()
                .zip(mysql_columns.iter())
                .map(|(v, c)| value_from_mysql(v, c))
                .collect();
            Row::new(table, columns.clone(), values)
        })
        .collect()
}

fn column_from_mysql(column: &mysql_async::Column) -> Column {
    Column::new(
        column.name_str().into_owned(),
        type_name(column),
        !column.flags().contains(ColumnFlags::NOT_NULL_FLAG),
    )
}

fn is_binary(column: &mysql_async::Column) -> bool {
    column.character_set() == BINARY_CHARSET
}

fn type_name(column: &mysql_async::Column) -> &'static str {
    use ColumnType::*;
    match column.column_type() {
        MYSQL_TYPE_TINY => "tinyint",
        MYSQL_TYPE_SHORT => "smallint",
        MYSQL_TYPE_INT24 => "mediumint",
        MYSQL_TYPE_LONG => "int",
        MYSQL_TYPE_LONGLONG => "bigint",
        MYSQL_TYPE_FLOAT => "float",
        MYSQL_TYPE_DOUBLE => "double",
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => "decimal",
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE => "date",
        MYSQL_TYPE_DATETIME | MYSQL_TYPE_DATETIME2 => "datetime",
        MYSQL_TYPE_TIMESTAMP | MYSQL_TYPE_TIMESTAMP2 => "timestamp",
        MYSQL_TYPE_TIME | MYSQL_TYPE_TIME2 => "time",
        MYSQL_TYPE_YEAR => "year",
        MYSQL_TYPE_BIT => "bit",
        MYSQL_TYPE_JSON => "json",
        MYSQL_TYPE_ENUM => "enum",
        MYSQL_TYPE_SET => "set",
        MYSQL_TYPE_GEOMETRY => "geometry",
        MYSQL_TYPE_TINY_BLOB | MYSQL_TYPE_MEDIUM_BLOB | MYSQL_TYPE_LONG_BLOB | MYSQL_TYPE_BLOB => {
            if is_binary(column) {
                "blob"
            } else {
                "text"
            }
        }
        MYSQL_TYPE_VARCHAR | MYSQL_TYPE_VAR_STRING => {
            if is_binary(column) {
                "varbinary"
            } else {
                "varchar"
            }
        }
        MYSQL_TYPE_STRING => {
            if is_binary(column) {
                "binary"
            } else {
                "char"
            }
        }
        _ => "unknown",
    }
}

fn null_type(column: &mysql_async::Column) -> SqlNullType {
    use ColumnType::*;
    match column.column_type() {
        MYSQL_TYPE_TINY | MYSQL_TYPE_SHORT | MYSQL_TYPE_INT24 | MYSQL_TYPE_LONG
        | MYSQL_TYPE_LONGLONG | MYSQL_TYPE_YEAR => {
            if column.flags().contains(ColumnFlags::UNSIGNED_FLAG) {
                SqlNullType::U64
            } else {
                SqlNullType::I64
            }
        }
        MYSQL_TYPE_FLOAT => SqlNullType::F32,
        MYSQL_TYPE_DOUBLE => SqlNullType::F64,
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => SqlNullType::Decimal,
        MYSQL_TYPE_DATE | MYSQL_TYPE_NEWDATE => SqlNullType::Date,
        MYSQL_TYPE_DATETIME | MYSQL_TYPE_DATETIME2 | MYSQL_TYPE_TIMESTAMP
        | MYSQL_TYPE_TIMESTAMP2 => SqlNullType::DateTime,
        MYSQL_TYPE_TIME | MYSQL_TYPE_TIME2 => SqlNullType::Time,
        MYSQL_TYPE_BIT | MYSQL_TYPE_GEOMETRY => SqlNullType::Bytes,
        _ if is_binary(column) => SqlNullType::Bytes,
        _ => SqlNullType::String,
    }
}

/// Interpret a fetched value using its column's metadata.
///
/// Values chrono cannot represent (zero dates, negative or multi-day TIME)
/// are kept as their MySQL text form so they can be written back verbatim.
pub fn value_from_mysql(value: Value, column: &mysql_async::Column) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null(null_type(column)),
        Value::Int(v) => SqlValue::I64(v),
        Value::UInt(v) => SqlValue::U64(v),
        Value::Float(v) => SqlValue::F32(v),
        Value::Double(v) => SqlValue::F64(v),
        Value::Date(y, m, d, h, mi, s, us) => {
            let date = NaiveDate::from_ymd_opt(y as i32, m as u32, d as u32);
            let is_date = matches!(
                column.column_type(),
                ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE
            );
            match date {
                Some(date) if is_date => SqlValue::Date(date),
                Some(date) => date
                    .and_hms_micro_opt(h as u32, mi as u32, s as u32, us)
                    .map(SqlValue::DateTime)
                    .unwrap_or_else(|| SqlValue::Text(format_datetime(y, m, d, h, mi, s, us))),
                None if is_date => SqlValue::Text(format!("{:04}-{:02}-{:02}", y, m, d)),
                None => SqlValue::Text(format_datetime(y, m, d, h, mi, s, us)),
            }
        }
        Value::Time(negative, days, h, m, s, us) => {
            let time = (!negative && days == 0)
                .then(|| NaiveTime::from_hms_micro_opt(h as u32, m as u32, s as u32, us))
                .flatten();
            match time {
                Some(t) => SqlValue::Time(t),
                None => {
                    let hours = days * 24 + h as u32;
                    let sign = if negative { "-" } else { "" };
                    SqlValue::Text(format!("{}{:02}:{:02}:{:02}.{:06}", sign, hours, m, s, us))
                }
            }
        }
        Value::Bytes(bytes) => bytes_from_mysql(bytes, column),
    }
}

fn bytes_from_mysql(bytes: Vec<u8>, column: &mysql_async::Column) -> SqlValue {
    use ColumnType::*;
    match column.column_type() {
        MYSQL_TYPE_DECIMAL | MYSQL_TYPE_NEWDECIMAL => {
            let parsed = std::str::from_utf8(&bytes)
                .ok()
                .and_then(|s| s.parse::<Decimal>().ok());
            match parsed {
                Some(d) => SqlValue::Decimal(d),
                None => text_or_bytes(bytes),
            }
        }
        MYSQL_TYPE_BIT | MYSQL_TYPE_GEOMETRY => SqlValue::Bytes(bytes),
        _ if is_binary(column) => SqlValue::Bytes(bytes),
        _ => text_or_bytes(bytes),
    }
}

fn text_or_bytes(bytes: Vec<u8>) -> SqlValue {
    match String::from_utf8(bytes) {
        Ok(s) => SqlValue::Text(s),
        Err(e) => SqlValue::Bytes(e.into_bytes()),
    }
}

fn format_datetime(y: u16, m: u8, d: u8, h: u8, mi: u8, s: u8, us: u32) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:06}",
        y, m, d, h, mi, s, us
    )
}

/// Convert a value to a `mysql_async` parameter.
pub fn sql_value_to_mysql(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null(_) => Value::NULL,
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::I64(i) => Value::Int(*i),
        SqlValue::U64(u) => Value::UInt(*u),
        SqlValue::F32(f) => Value::Float(*f),
        SqlValue::F64(f) => Value::Double(*f),
        SqlValue::Decimal(d) => Value::Bytes(d.to_string().into_bytes()),
        SqlValue::Text(s) => Value::Bytes(s.as_bytes().to_vec()),
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
        SqlValue::Date(d) => Value::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        SqlValue::DateTime(dt) => Value::Date(
            dt.year() as u16,
            dt.month() as u8,
            dt.day() as u8,
            dt.hour() as u8,
            dt.minute() as u8,
            dt.second() as u8,
            dt.nanosecond() / 1_000,
        ),
        SqlValue::Time(t) => Value::Time(
            false,
            0,
            t.hour() as u8,
            t.minute() as u8,
            t.second() as u8,
            t.nanosecond() / 1_000,
        ),
    }
}
