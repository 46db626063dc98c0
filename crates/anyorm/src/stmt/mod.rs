//! Schema-driven statement builders.
//!
//! Every builder here is a pure function over `(dialect, table, schema,
//! model)` producing a [`Statement`]: the SQL text rendered with the
//! dialect's placeholder strategy and the argument list aligned with it.
//! Builders never touch a connection; execution belongs to the
//! [`Repository`](crate::repository::Repository) and the batch writers.
//!
//! # Example
//!
//! ```ignore
//! use anyorm::{Dialect, stmt};
//!
//! let stmt = stmt::build_insert(Dialect::Postgres, User::TABLE, schema, &user)?;
//! assert_eq!(stmt.query, "INSERT INTO users (id, name) VALUES ($1, $2)");
//! ```

mod delete;
mod dup;
mod insert;
mod patch;
mod save;
mod update;

pub use delete::build_delete;
pub use dup::{handle_duplicate, is_duplicate_key};
pub use insert::{build_insert, build_insert_batch, build_insert_with_version};
pub use patch::build_patch;
pub use save::build_save;
pub use update::build_update;

use crate::error::{OrmError, OrmResult};
use crate::model::Model;
use crate::schema::Schema;
use crate::value::Value;

/// Apply the schema's sentinel-boolean encoding to a field value.
///
/// Columns with true/false literal overrides persist booleans as those
/// literals; everything else passes through.
pub(crate) fn encode_value(schema: &Schema, column: &str, value: Value) -> Value {
    if let Value::Bool(b) = value
        && let Some((true_lit, false_lit)) = schema.bool_literals(column)
    {
        return Value::Text(if b { true_lit } else { false_lit }.to_owned());
    }
    value
}

/// Columns of the insert set that are present on this model, with their
/// encoded values. Unset `Option` fields are omitted entirely, which keeps
/// the column list and the value list the same length by construction.
pub(crate) fn present_columns<T: Model>(
    schema: &Schema,
    model: &T,
) -> Vec<(&'static str, Value)> {
    let mut present = Vec::with_capacity(schema.insert_columns().len());
    for &column in schema.insert_columns() {
        let Some(index) = schema.field_index(column) else {
            continue;
        };
        if let Some(value) = model.value(index) {
            present.push((column, encode_value(schema, column, value)));
        }
    }
    present
}

/// Current value of the model's version field as an integer.
///
/// The version type is checked here, at call time: builders that bump the
/// version only accept the integer family.
pub(crate) fn current_version<T: Model>(schema: &Schema, model: &T) -> OrmResult<i64> {
    let index = schema
        .version_index()
        .ok_or_else(|| OrmError::statement("model has no version field"))?;
    match model.value(index) {
        Some(Value::Int(version)) => Ok(version),
        Some(other) => Err(OrmError::statement(format!(
            "version field must be an integer, got {}",
            other.type_name()
        ))),
        None => Err(OrmError::statement("version field is unset")),
    }
}

/// Key column/value pairs read off a model, in schema key order.
pub(crate) fn model_key_pairs<T: Model>(
    schema: &Schema,
    model: &T,
) -> OrmResult<Vec<(&'static str, Value)>> {
    let mut pairs = Vec::with_capacity(schema.keys().len());
    for &column in schema.keys() {
        let index = schema
            .field_index(column)
            .ok_or_else(|| OrmError::statement(format!("unknown key column '{column}'")))?;
        let value = model
            .value(index)
            .ok_or_else(|| OrmError::statement(format!("key column '{column}' is unset")))?;
        pairs.push((column, encode_value(schema, column, value)));
    }
    Ok(pairs)
}
