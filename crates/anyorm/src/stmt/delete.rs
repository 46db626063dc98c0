//! DELETE builder over key predicates.

use crate::dialect::Placeholder;
use crate::error::OrmResult;
use crate::model::Key;
use crate::schema::Schema;
use crate::statement::Statement;
use crate::stmt::encode_value;

/// Build a DELETE whose WHERE covers exactly the schema's key columns.
///
/// The key input is a scalar for single-column keys or a column/value list
/// for composite keys; a scalar against a composite key is rejected as
/// ambiguous.
pub fn build_delete(
    placeholder: Placeholder,
    table: &str,
    schema: &Schema,
    key: &Key,
) -> OrmResult<Statement> {
    let pairs = key.pairs(schema.keys())?;

    let mut query = String::with_capacity(32 + pairs.len() * 12);
    let mut values = Vec::with_capacity(pairs.len());

    query.push_str("DELETE FROM ");
    query.push_str(table);
    query.push_str(" WHERE ");
    for (pos, (column, value)) in pairs.into_iter().enumerate() {
        if pos > 0 {
            query.push_str(" AND ");
        }
        query.push_str(column);
        query.push_str(" = ");
        placeholder.write(&mut query, pos + 1);
        values.push(encode_value(schema, column, value));
    }

    Ok(Statement::new(query, values))
}
