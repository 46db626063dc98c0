//! Rendered statements and the proxy wire format.
//!
//! A [`Statement`] pairs SQL text with its positional arguments; builders
//! produce one per call and executors consume it immediately. For proxy
//! mode the statement crosses the network as JSON, which only carries
//! JSON-safe scalars: [`WireStatement`] lists the zero-based positions of
//! timestamp parameters in `dates` so the receiving side can re-parse them
//! into native timestamps before binding.
//!
//! # Example
//!
//! ```ignore
//! use anyorm::Statement;
//!
//! let stmt = Statement::new("SELECT * FROM users WHERE id = $1", vec!["u1".into()]);
//! let wire = stmt.to_wire()?;
//! assert_eq!(wire.dates, Vec::<usize>::new());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{OrmError, OrmResult};
use crate::value::{Value, parse_timestamp};

/// SQL text plus its positional arguments, aligned with placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub query: String,
    pub values: Vec<Value>,
}

impl Statement {
    pub fn new(query: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            query: query.into(),
            values,
        }
    }

    /// Encode for the proxy transport.
    ///
    /// Timestamps serialize as RFC 3339 text and their positions go into
    /// `dates`. Byte-array values have no JSON-safe spelling in this wire
    /// format and fail the encode.
    pub fn to_wire(&self) -> OrmResult<WireStatement> {
        let mut params = Vec::with_capacity(self.values.len());
        let mut dates = Vec::new();

        for (position, value) in self.values.iter().enumerate() {
            let encoded = match value {
                Value::Null => json!(null),
                Value::Bool(v) => json!(v),
                Value::Int(v) => json!(v),
                Value::Float(v) => serde_json::Number::from_f64(*v)
                    .map(serde_json::Value::Number)
                    .ok_or_else(|| {
                        OrmError::Serialization(format!(
                            "non-finite float at param {position}"
                        ))
                    })?,
                Value::Text(v) => json!(v),
                Value::Bytes(_) => {
                    return Err(OrmError::Serialization(format!(
                        "byte-array param {position} cannot cross the proxy wire"
                    )));
                }
                Value::Timestamp(v) => {
                    dates.push(position);
                    json!(v.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
                }
                Value::Uuid(v) => json!(v.to_string()),
                #[cfg(feature = "rust_decimal")]
                Value::Decimal(v) => json!(v.to_string()),
                Value::Json(v) => v.clone(),
            };
            params.push(encoded);
        }

        Ok(WireStatement {
            query: self.query.clone(),
            params,
            dates,
        })
    }

    /// Decode a statement received from the proxy transport.
    ///
    /// Every position listed in `dates` must hold text in one of the fixed
    /// timestamp layouts; other parameters decode by their JSON kind.
    pub fn from_wire(wire: &WireStatement) -> OrmResult<Self> {
        let mut values = Vec::with_capacity(wire.params.len());

        for (position, param) in wire.params.iter().enumerate() {
            if wire.dates.contains(&position) {
                let text = param.as_str().ok_or_else(|| {
                    OrmError::Serialization(format!(
                        "date param {position} is not a string"
                    ))
                })?;
                let ts = parse_timestamp(text).ok_or_else(|| {
                    OrmError::Serialization(format!(
                        "date param {position} '{text}' matches no timestamp layout"
                    ))
                })?;
                values.push(Value::Timestamp(ts));
                continue;
            }
            values.push(decode_scalar(param));
        }

        for position in &wire.dates {
            if *position >= wire.params.len() {
                return Err(OrmError::Serialization(format!(
                    "date position {position} out of range ({} params)",
                    wire.params.len()
                )));
            }
        }

        Ok(Self::new(wire.query.clone(), values))
    }
}

pub(crate) fn decode_scalar(param: &serde_json::Value) -> Value {
    match param {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(v) => Value::Bool(*v),
        serde_json::Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                Value::Int(v)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(v) => Value::Text(v.clone()),
        other => Value::Json(other.clone()),
    }
}

/// The fixed statement shape carried by the proxy transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireStatement {
    pub query: String,
    pub params: Vec<serde_json::Value>,
    #[serde(default)]
    pub dates: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn wire_encode_marks_date_positions() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 15, 4, 5).unwrap();
        let stmt = Statement::new(
            "INSERT INTO events (id, at, note) VALUES ($1, $2, $3)",
            vec![Value::Int(1), Value::Timestamp(ts), Value::Text("x".into())],
        );

        let wire = stmt.to_wire().unwrap();
        assert_eq!(wire.dates, vec![1]);
        assert_eq!(wire.params[1], json!("2026-01-02T15:04:05Z"));
        assert_eq!(wire.params[2], json!("x"));
    }

    #[test]
    fn wire_round_trip_restores_timestamps() {
        let ts = Utc.with_ymd_and_hms(2026, 1, 2, 15, 4, 5).unwrap();
        let stmt = Statement::new(
            "UPDATE t SET at = $1 WHERE id = $2",
            vec![Value::Timestamp(ts), Value::Int(9)],
        );

        let decoded = Statement::from_wire(&stmt.to_wire().unwrap()).unwrap();
        assert_eq!(decoded, stmt);
    }

    #[test]
    fn wire_decode_accepts_all_layouts() {
        let wire = WireStatement {
            query: "SELECT 1".into(),
            params: vec![
                json!("2026-01-02T15:04:05Z"),
                json!("2026-01-02T17:04:05+02:00"),
                json!("2026-01-02T17:04:05.250+02:00"),
            ],
            dates: vec![0, 1, 2],
        };

        let stmt = Statement::from_wire(&wire).unwrap();
        let base = Utc.with_ymd_and_hms(2026, 1, 2, 15, 4, 5).unwrap();
        assert_eq!(stmt.values[0], Value::Timestamp(base));
        assert_eq!(stmt.values[1], Value::Timestamp(base));
        match &stmt.values[2] {
            Value::Timestamp(t) => assert_eq!(t.timestamp_subsec_millis(), 250),
            other => panic!("expected timestamp, got {other:?}"),
        }
    }

    #[test]
    fn undated_strings_stay_text() {
        let wire = WireStatement {
            query: "SELECT 1".into(),
            params: vec![json!("2026-01-02T15:04:05Z")],
            dates: vec![],
        };
        let stmt = Statement::from_wire(&wire).unwrap();
        assert_eq!(stmt.values[0], Value::Text("2026-01-02T15:04:05Z".into()));
    }

    #[test]
    fn bad_date_text_fails_decode() {
        let wire = WireStatement {
            query: "SELECT 1".into(),
            params: vec![json!("yesterday")],
            dates: vec![0],
        };
        assert!(Statement::from_wire(&wire).is_err());
    }

    #[test]
    fn bytes_refuse_to_encode() {
        let stmt = Statement::new("SELECT $1", vec![Value::Bytes(vec![1, 2])]);
        assert!(stmt.to_wire().is_err());
    }

    #[test]
    fn wire_json_shape() {
        let stmt = Statement::new("SELECT $1", vec![Value::Int(5)]);
        let text = serde_json::to_string(&stmt.to_wire().unwrap()).unwrap();
        assert_eq!(text, r#"{"query":"SELECT $1","params":[5],"dates":[]}"#);
    }
}
