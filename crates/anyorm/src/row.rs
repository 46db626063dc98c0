//! Driver-agnostic result rows and value decoding.
//!
//! Executors convert their driver's native rows into [`Row`]: the result
//! set's actual column names (which may be a subset or reordering of the
//! schema's columns) paired with one [`Value`] per column. Model scanning is
//! by column name, so projected and reordered result sets decode without any
//! positional bookkeeping, and result columns no model field maps to are
//! simply ignored.
//!
//! # Example
//!
//! ```ignore
//! use anyorm::Row;
//!
//! let row = Row::new(vec!["id".into(), "name".into()], vec![1i64.into(), "jo".into()]);
//! let name: String = row.try_get("name")?;
//! assert_eq!(name, "jo");
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{OrmError, OrmResult};
use crate::value::{Value, parse_timestamp};

/// One result row: column names aligned with values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<Value>,
}

impl Row {
    /// Build a row from column names and values in result-set order.
    pub fn new(columns: impl Into<Arc<[String]>>, values: Vec<Value>) -> Self {
        Self {
            columns: columns.into(),
            values,
        }
    }

    /// Column names in result-set order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Position of a column in this result set.
    ///
    /// Matches exactly first, then ASCII case-insensitively, since drivers
    /// disagree about identifier case folding.
    pub fn index_of(&self, column: &str) -> Option<usize> {
        if let Some(idx) = self.columns.iter().position(|c| c == column) {
            return Some(idx);
        }
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    /// Raw value at a position.
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Raw value for a column, `None` when the column is not in this
    /// result set.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.index_of(column).and_then(|idx| self.values.get(idx))
    }

    /// Decode a column into a concrete type.
    ///
    /// Fails with a decode error naming the column when the column is
    /// missing from the result set or the value does not convert; the
    /// underlying conversion failure is preserved in the message.
    pub fn try_get<T: FromValue>(&self, column: &str) -> OrmResult<T> {
        match self.value(column) {
            Some(value) => {
                T::from_value(value).map_err(|message| OrmError::decode(column, message))
            }
            None => Err(OrmError::decode(column, "column missing from result set")),
        }
    }

    /// The whole row as a column-keyed map, for callers without a schema.
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }

    /// Consume the row into its values, dropping the column names.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Decode a [`Value`] into a concrete Rust type.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, String>;
}

fn mismatch(expected: &str, got: &Value) -> String {
    format!("expected {expected}, got {}", got.type_name())
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(v) => Ok(*v),
            Value::Int(0) => Ok(false),
            Value::Int(1) => Ok(true),
            other => Err(mismatch("bool", other)),
        }
    }
}

impl FromValue for i16 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(v) => i16::try_from(*v).map_err(|e| e.to_string()),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(v) => i32::try_from(*v).map_err(|e| e.to_string()),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Int(v) => Ok(*v),
            other => Err(mismatch("int", other)),
        }
    }
}

impl FromValue for f32 {
    fn from_value(value: &Value) -> Result<Self, String> {
        f64::from_value(value).map(|v| v as f32)
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(mismatch("float", other)),
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Text(v) => Ok(v.clone()),
            other => Err(mismatch("text", other)),
        }
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bytes(v) => Ok(v.clone()),
            other => Err(mismatch("bytes", other)),
        }
    }
}

impl FromValue for DateTime<Utc> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Timestamp(v) => Ok(*v),
            // Proxy rows carry timestamps as wire-format text.
            Value::Text(v) => {
                parse_timestamp(v).ok_or_else(|| format!("unparseable timestamp '{v}'"))
            }
            other => Err(mismatch("timestamp", other)),
        }
    }
}

impl FromValue for Uuid {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Uuid(v) => Ok(*v),
            Value::Text(v) => Uuid::parse_str(v).map_err(|e| e.to_string()),
            other => Err(mismatch("uuid", other)),
        }
    }
}

#[cfg(feature = "rust_decimal")]
impl FromValue for rust_decimal::Decimal {
    fn from_value(value: &Value) -> Result<Self, String> {
        use std::str::FromStr;
        match value {
            Value::Decimal(v) => Ok(*v),
            Value::Int(v) => Ok(rust_decimal::Decimal::from(*v)),
            Value::Text(v) => rust_decimal::Decimal::from_str(v).map_err(|e| e.to_string()),
            other => Err(mismatch("decimal", other)),
        }
    }
}

impl FromValue for serde_json::Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Json(v) => Ok(v.clone()),
            other => Err(mismatch("json", other)),
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, String> {
        Ok(value.clone())
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Decode a boolean persisted under sentinel literals (for example `"Y"` /
/// `"N"`). Native booleans and 0/1 integers still decode; any other text
/// must match one of the two literals.
pub fn decode_sentinel_bool(
    value: &Value,
    true_literal: &str,
    false_literal: &str,
) -> Result<bool, String> {
    match value {
        Value::Text(v) if v == true_literal => Ok(true),
        Value::Text(v) if v == false_literal => Ok(false),
        Value::Text(v) => Err(format!(
            "expected '{true_literal}' or '{false_literal}', got '{v}'"
        )),
        other => bool::from_value(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::new(
            vec!["id".to_string(), "name".to_string(), "age".to_string()],
            vec![Value::Text("u1".into()), Value::Text("jo".into()), Value::Int(40)],
        )
    }

    #[test]
    fn get_by_name() {
        let row = sample();
        let name: String = row.try_get("name").unwrap();
        assert_eq!(name, "jo");
        let age: i32 = row.try_get("age").unwrap();
        assert_eq!(age, 40);
    }

    #[test]
    fn case_insensitive_fallback() {
        let row = sample();
        assert_eq!(row.index_of("NAME"), Some(1));
        assert_eq!(row.index_of("missing"), None);
    }

    #[test]
    fn missing_column_names_the_column() {
        let row = sample();
        let err = row.try_get::<String>("email").unwrap_err();
        assert!(err.to_string().contains("email"));
    }

    #[test]
    fn mismatch_preserves_underlying_reason() {
        let row = sample();
        let err = row.try_get::<i64>("name").unwrap_err();
        assert!(err.to_string().contains("expected int"));
    }

    #[test]
    fn option_decoding() {
        let row = Row::new(
            vec!["note".to_string()],
            vec![Value::Null],
        );
        let note: Option<String> = row.try_get("note").unwrap();
        assert_eq!(note, None);
    }

    #[test]
    fn timestamp_from_wire_text() {
        let row = Row::new(
            vec!["created_at".to_string()],
            vec![Value::Text("2026-01-02T15:04:05Z".into())],
        );
        let ts: DateTime<Utc> = row.try_get("created_at").unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-01-02T15:04:05+00:00");
    }

    #[test]
    fn sentinel_bools() {
        assert_eq!(decode_sentinel_bool(&Value::Text("Y".into()), "Y", "N"), Ok(true));
        assert_eq!(decode_sentinel_bool(&Value::Text("N".into()), "Y", "N"), Ok(false));
        assert!(decode_sentinel_bool(&Value::Text("X".into()), "Y", "N").is_err());
        assert_eq!(decode_sentinel_bool(&Value::Bool(true), "Y", "N"), Ok(true));
        assert_eq!(decode_sentinel_bool(&Value::Int(0), "1", "0"), Ok(false));
    }

    #[test]
    fn to_map_round_trip() {
        let map = sample().to_map();
        assert_eq!(map.get("age"), Some(&Value::Int(40)));
        assert_eq!(map.len(), 3);
    }
}
