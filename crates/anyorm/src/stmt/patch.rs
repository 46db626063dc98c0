//! PATCH builder: partial update driven by a sparse field/value list.
//!
//! Input arrives as `(name, value)` pairs in caller order, typically decoded
//! from a JSON body. Names are translated through the schema's JSON-name
//! map, so both JSON field names and raw column names resolve; unknown
//! names fail loudly rather than being dropped. An explicit [`Value::Null`]
//! sets the column to NULL, which is distinct from leaving the pair out.

use crate::dialect::Placeholder;
use crate::error::{OrmError, OrmResult};
use crate::schema::Schema;
use crate::statement::Statement;
use crate::stmt::encode_value;
use crate::value::Value;

/// Build a partial UPDATE from a sparse change list.
///
/// Key columns in the change list feed the WHERE predicate and never the
/// SET list; every schema key must be present. When the schema has a
/// version field and the change list carries it, the statement is
/// version-guarded exactly like
/// [`build_update`](crate::stmt::build_update): WHERE constrains the
/// supplied version and SET binds it plus one.
pub fn build_patch(
    placeholder: Placeholder,
    table: &str,
    schema: &Schema,
    changes: &[(String, Value)],
) -> OrmResult<Statement> {
    let version_column = schema.version_column();

    let mut set_parts: Vec<(&'static str, Value)> = Vec::with_capacity(changes.len());
    let mut key_parts: Vec<(&'static str, Value)> = Vec::with_capacity(schema.keys().len());
    let mut version: Option<i64> = None;

    for (name, value) in changes {
        let column = schema
            .column_for_json(name)
            .or_else(|| schema.field(name).map(|f| f.column))
            .ok_or_else(|| OrmError::statement(format!("unknown field '{name}'")))?;

        if schema.is_key(column) {
            key_parts.push((column, encode_value(schema, column, value.clone())));
            continue;
        }
        if Some(column) == version_column {
            match value {
                Value::Int(v) => version = Some(*v),
                other => {
                    return Err(OrmError::statement(format!(
                        "version field must be an integer, got {}",
                        other.type_name()
                    )));
                }
            }
            continue;
        }
        set_parts.push((column, encode_value(schema, column, value.clone())));
    }

    for &key in schema.keys() {
        if !key_parts.iter().any(|(c, _)| *c == key) {
            return Err(OrmError::statement(format!(
                "missing key column '{key}'"
            )));
        }
    }
    if set_parts.is_empty() && version.is_none() {
        return Err(OrmError::statement("no columns to patch"));
    }

    let mut query = String::with_capacity(48 + set_parts.len() * 12);
    let mut values = Vec::with_capacity(set_parts.len() + key_parts.len() + 2);
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

    if let Some(current) = version {
        if index > 0 {
            query.push_str(", ");
        }
        // Supplied version plus one, bound explicitly.
        query.push_str(version_column.unwrap_or("version"));
        query.push_str(" = ");
        index += 1;
        placeholder.write(&mut query, index);
        values.push(Value::Int(current + 1));
    }

    query.push_str(" WHERE ");
    for (pos, (column, value)) in key_parts.into_iter().enumerate() {
        if pos > 0 {
            query.push_str(" AND ");
        }
        query.push_str(column);
        query.push_str(" = ");
        index += 1;
        placeholder.write(&mut query, index);
        values.push(value);
    }

    if let (Some(current), Some(column)) = (version, version_column) {
        query.push_str(" AND ");
        query.push_str(column);
        query.push_str(" = ");
        index += 1;
        placeholder.write(&mut query, index);
        values.push(Value::Int(current));
    }

    Ok(Statement::new(query, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::fixtures::user_schema;

    fn changes(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn patch_sets_only_supplied_fields() {
        let input = changes(&[
            ("id", Value::Text("u1".into())),
            ("name", Value::Text("newname".into())),
        ]);
        let stmt = build_patch(Placeholder::Dollar, "users", user_schema(), &input).unwrap();
        assert_eq!(stmt.query, "UPDATE users SET name = $1 WHERE id = $2");
        assert_eq!(
            stmt.values,
            vec![Value::Text("newname".into()), Value::Text("u1".into())]
        );
    }

    #[test]
    fn explicit_null_is_set_null_not_omitted() {
        let input = changes(&[
            ("id", Value::Text("u1".into())),
            ("note", Value::Null),
        ]);
        let stmt = build_patch(Placeholder::Dollar, "users", user_schema(), &input).unwrap();
        assert_eq!(stmt.query, "UPDATE users SET note = $1 WHERE id = $2");
        assert_eq!(stmt.values[0], Value::Null);
    }

    #[test]
    fn patch_with_version_guards_and_bumps() {
        let input = changes(&[
            ("id", Value::Text("u1".into())),
            ("name", Value::Text("x".into())),
            ("version", Value::Int(6)),
        ]);
        let stmt = build_patch(Placeholder::Dollar, "users", user_schema(), &input).unwrap();
        assert_eq!(
            stmt.query,
            "UPDATE users SET name = $1, version = $2 WHERE id = $3 AND version = $4"
        );
        assert_eq!(stmt.values[1], Value::Int(7));
        assert_eq!(stmt.values[3], Value::Int(6));
    }

    #[test]
    fn sentinel_bool_encodes_in_patch() {
        let input = changes(&[
            ("id", Value::Text("u1".into())),
            ("active", Value::Bool(false)),
        ]);
        let stmt = build_patch(Placeholder::Question, "users", user_schema(), &input).unwrap();
        assert_eq!(stmt.query, "UPDATE users SET active = ? WHERE id = ?");
        assert_eq!(stmt.values[0], Value::Text("N".into()));
    }

    #[test]
    fn unknown_field_fails_loudly() {
        let input = changes(&[
            ("id", Value::Text("u1".into())),
            ("nickname", Value::Text("x".into())),
        ]);
        let err = build_patch(Placeholder::Dollar, "users", user_schema(), &input).unwrap_err();
        assert!(err.to_string().contains("unknown field 'nickname'"));
    }

    #[test]
    fn missing_key_fails() {
        let input = changes(&[("name", Value::Text("x".into()))]);
        let err = build_patch(Placeholder::Dollar, "users", user_schema(), &input).unwrap_err();
        assert!(err.to_string().contains("missing key column 'id'"));
    }

    #[test]
    fn empty_set_fails() {
        let input = changes(&[("id", Value::Text("u1".into()))]);
        assert!(build_patch(Placeholder::Dollar, "users", user_schema(), &input).is_err());
    }
}
