//! Row decoding.
//!
//! Each result column carries the schema [`Datatype`] it was selected with, so
//! values are decoded by what the schema declares instead of by whatever type
//! name the driver reports. Decoding is lenient: a value that cannot be decoded
//! as its declared type is returned as a string when possible, otherwise null.

use crate::models::{Datatype, DatatypeFamily};
use crate::query::OutputColumn;
use serde_json::Value as JsonValue;
use sqlx::Row;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;

/// Trait for converting database rows to JSON values.
pub trait RowToJson {
    fn decode_value(&self, idx: usize, datatype: Datatype) -> JsonValue;

    /// Decode every output column of the row, in order.
    fn to_json_values(&self, columns: &[OutputColumn]) -> Vec<JsonValue> {
        columns
            .iter()
            .enumerate()
            .map(|(idx, c)| self.decode_value(idx, c.datatype))
            .collect()
    }
}

impl RowToJson for PgRow {
    fn decode_value(&self, idx: usize, datatype: Datatype) -> JsonValue {
        postgres::decode_column(self, idx, datatype)
    }
}

impl RowToJson for SqliteRow {
    fn decode_value(&self, idx: usize, datatype: Datatype) -> JsonValue {
        sqlite::decode_column(self, idx, datatype)
    }
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

mod postgres {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

    pub fn decode_column(row: &PgRow, idx: usize, datatype: Datatype) -> JsonValue {
        if let Ok(None) = row.try_get::<Option<String>, _>(idx) {
            return JsonValue::Null;
        }
        match datatype.family() {
            DatatypeFamily::Integer => decode_integer(row, idx),
            DatatypeFamily::Float => decode_float(row, idx),
            DatatypeFamily::Boolean => decode_boolean(row, idx),
            DatatypeFamily::Temporal => decode_temporal(row, idx),
            DatatypeFamily::Text => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i32>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        if let Ok(Some(v)) = row.try_get::<Option<i16>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        decode_float(row, idx)
    }

    fn decode_float(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<f32>, _>(idx) {
            return float_value(v as f64);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return float_value(v as f64);
        }
        decode_text(row, idx)
    }

    fn decode_boolean(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<bool>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::Bool)
            .unwrap_or_else(|| decode_text(row, idx))
    }

    fn decode_temporal(row: &PgRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return JsonValue::String(v.format("%Y-%m-%d").to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return JsonValue::String(v.format(DATETIME_FORMAT).to_string());
        }
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return JsonValue::String(v.naive_utc().format(DATETIME_FORMAT).to_string());
        }
        decode_text(row, idx)
    }

    fn decode_text(row: &PgRow, idx: usize) -> JsonValue {
        row.try_get::<Option<String>, _>(idx)
            .ok()
            .flatten()
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null)
    }
}

mod sqlite {
    use super::*;

    pub fn decode_column(row: &SqliteRow, idx: usize, datatype: Datatype) -> JsonValue {
        match datatype.family() {
            DatatypeFamily::Integer => decode_integer(row, idx),
            DatatypeFamily::Float => decode_float(row, idx),
            DatatypeFamily::Boolean => decode_boolean(row, idx),
            DatatypeFamily::Text | DatatypeFamily::Temporal => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> JsonValue {
        if let Ok(None) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Null;
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Number(v.into());
        }
        decode_float(row, idx)
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<f64>, _>(idx) {
            return float_value(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return float_value(v as f64);
        }
        decode_text(row, idx)
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<bool>, _>(idx) {
            return JsonValue::Bool(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::Bool(v != 0);
        }
        decode_text(row, idx)
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> JsonValue {
        if let Ok(Some(v)) = row.try_get::<Option<String>, _>(idx) {
            return JsonValue::String(v);
        }
        if let Ok(Some(v)) = row.try_get::<Option<i64>, _>(idx) {
            return JsonValue::String(v.to_string());
        }
        JsonValue::Null
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_value_handles_non_finite() {
        assert_eq!(float_value(1.5), serde_json::json!(1.5));
        assert_eq!(float_value(f64::NAN), JsonValue::String("NaN".to_string()));
    }
}
