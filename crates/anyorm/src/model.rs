//! The mapped-struct contract and key predicates.
//!
//! `#[derive(Model)]` implements [`Model`] for a struct: the table name, the
//! static field descriptor table the [`Schema`](crate::Schema) is built
//! from, positional access to field values at write time, the primary-key
//! value(s) of an instance, and row scanning. Everything the statement
//! builders know about a type flows through this trait, so a hand-written
//! impl works exactly like a derived one.

use std::fmt;

use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::schema::FieldDef;
use crate::value::Value;

/// A struct mapped to one table.
pub trait Model: Sized + Send + Sync + 'static {
    /// Table name statements are rendered against.
    const TABLE: &'static str;

    /// Field descriptors in declaration order, `ignore`d fields excluded.
    fn fields() -> &'static [FieldDef];

    /// Value of the field at `index` (positions match [`Model::fields`]).
    ///
    /// `None` means the field is an unset `Option`: the column is omitted
    /// from INSERT column lists and contributes no predicate. An explicit
    /// NULL is `Some(Value::Null)`.
    fn value(&self, index: usize) -> Option<Value>;

    /// Primary-key value(s) of this instance.
    fn key(&self) -> Key;

    /// Scan a result row into a new instance.
    ///
    /// Columns are looked up by name in the row's own column order, so a
    /// projected or reordered result set scans correctly; row columns no
    /// field maps to are ignored.
    fn from_row(row: &Row) -> OrmResult<Self>;
}

/// A primary-key predicate input: one scalar for single-column keys, a
/// column/value list for composite keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    Single(Value),
    Composite(Vec<(String, Value)>),
}

impl Key {
    /// Align this key with a schema's key columns, in schema order.
    ///
    /// A scalar against a composite-key schema is ambiguous and fails, as
    /// does a composite map missing one of the schema's key columns.
    pub fn pairs(&self, key_columns: &[&'static str]) -> OrmResult<Vec<(&'static str, Value)>> {
        match self {
            Self::Single(value) => match key_columns {
                [column] => Ok(vec![(column, value.clone())]),
                _ => Err(OrmError::statement(format!(
                    "scalar key is ambiguous for composite key ({})",
                    key_columns.join(", ")
                ))),
            },
            Self::Composite(parts) => {
                let mut pairs = Vec::with_capacity(key_columns.len());
                for column in key_columns {
                    let part = parts
                        .iter()
                        .find(|(name, _)| name == column)
                        .ok_or_else(|| {
                            OrmError::statement(format!("missing key column '{column}'"))
                        })?;
                    pairs.push((*column, part.1.clone()));
                }
                Ok(pairs)
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(value) => write!(f, "{value}"),
            Self::Composite(parts) => {
                for (idx, (column, value)) in parts.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{column}={value}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<Value> for Key {
    fn from(value: Value) -> Self {
        Self::Single(value)
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Self::Single(value.into())
    }
}

impl From<String> for Key {
    fn from(value: String) -> Self {
        Self::Single(value.into())
    }
}

impl From<i32> for Key {
    fn from(value: i32) -> Self {
        Self::Single(value.into())
    }
}

impl From<i64> for Key {
    fn from(value: i64) -> Self {
        Self::Single(value.into())
    }
}

impl From<uuid::Uuid> for Key {
    fn from(value: uuid::Uuid) -> Self {
        Self::Single(value.into())
    }
}

impl From<Vec<(String, Value)>> for Key {
    fn from(parts: Vec<(String, Value)>) -> Self {
        Self::Composite(parts)
    }
}
