//! UPDATE statement builder with optimistic-concurrency support.

use crate::dialect::Placeholder;
use crate::error::{OrmError, OrmResult};
use crate::model::Model;
use crate::schema::Schema;
use crate::statement::Statement;
use crate::stmt::{current_version, encode_value, model_key_pairs};
use crate::value::Value;

/// Build an UPDATE over the model's key columns.
///
/// SET covers every update column present (non-`None`) on the model. With a
/// version field, SET binds `current + 1` and WHERE additionally constrains
/// the version to `current`; zero rows affected is then ambiguous between
/// "row absent" and "stale version", which the caller resolves by
/// re-querying the key.
pub fn build_update<T: Model>(
    placeholder: Placeholder,
    table: &str,
    schema: &Schema,
    model: &T,
) -> OrmResult<Statement> {
    let mut set_parts: Vec<(&'static str, Value)> = Vec::new();
    for &column in schema.update_columns() {
        let Some(index) = schema.field_index(column) else {
            continue;
        };
        if let Some(value) = model.value(index) {
            set_parts.push((column, encode_value(schema, column, value)));
        }
    }

    // Version bump rides in SET; the expected version guards in WHERE.
    let version = match schema.version_column() {
        Some(column) => {
            let current = current_version(schema, model)?;
            set_parts.push((column, Value::Int(current + 1)));
            Some((column, current))
        }
        None => None,
    };

    if set_parts.is_empty() {
        return Err(OrmError::statement("no columns to update"));
    }

    let keys = model_key_pairs(schema, model)?;

    let mut query = String::with_capacity(48 + set_parts.len() * 12);
    let mut values = Vec::with_capacity(set_parts.len() + keys.len() + 1);
    let mut index = 0usize;

    query.push_str("UPDATE ");
    query.push_str(table);
    query.push_str(" SET ");
    for (pos, (column, value)) in set_parts.into_iter().enumerate() {
        if pos > 0 {
            query.push_str(", ");
        }
        query.push_str(column);
        query.push_str(" = ");
        index += 1;
        placeholder.write(&mut query, index);
        values.push(value);
    }

    query.push_str(" WHERE ");
    for (pos, (column, value)) in keys.into_iter().enumerate() {
        if pos > 0 {
            query.push_str(" AND ");
        }
        query.push_str(column);
        query.push_str(" = ");
        index += 1;
        placeholder.write(&mut query, index);
        values.push(value);
    }

    if let Some((column, current)) = version {
        query.push_str(" AND ");
        query.push_str(column);
        query.push_str(" = ");
        index += 1;
        placeholder.write(&mut query, index);
        values.push(Value::Int(current));
    }

    Ok(Statement::new(query, values))
}
