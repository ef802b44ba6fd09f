//! Parameter and result types shared by both backends

use serde::{Deserialize, Serialize};

/// One result row, keyed by column name
///
/// Integers come back as JSON numbers, text as strings and SQL NULL as
/// `null`, whichever engine produced the row. Booleans are numbers (`0`/`1`)
/// on both engines since SQLite has no boolean type.
///
/// PostgreSQL-only column types map to strings: timestamps and dates in
/// ISO-8601, `NUMERIC` in its exact decimal form, `UUID` hyphenated.
/// `JSON`/`JSONB` columns come back as parsed JSON.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// A value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<i32> for SqlValue {
    fn from(value: i32) -> Self {
        SqlValue::Integer(value as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(inner) => inner.into(),
            None => SqlValue::Null,
        }
    }
}

/// Result of a mutating statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateOutcome {
    /// Number of rows inserted, updated or deleted
    pub rows_affected: u64,
}
