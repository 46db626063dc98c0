//! INSERT statement builders.

use crate::dialect::Placeholder;
use crate::error::{OrmError, OrmResult};
use crate::model::Model;
use crate::schema::Schema;
use crate::statement::Statement;
use crate::stmt::{encode_value, present_columns};
use crate::value::Value;

/// Build a single-row INSERT.
///
/// Unset `Option` fields are omitted from both the column list and the
/// placeholder list, so the two always have the same length. Fails when the
/// model contributes no columns at all.
pub fn build_insert<T: Model>(
    placeholder: Placeholder,
    table: &str,
    schema: &Schema,
    model: &T,
) -> OrmResult<Statement> {
    render_insert(placeholder, table, present_columns(schema, model))
}

/// Build a single-row INSERT forcing the version column to 1.
///
/// The caller's model is not touched; the emitted statement simply binds 1
/// for the version column (adding it if the model left it unset). Models
/// without a version field insert unchanged.
pub fn build_insert_with_version<T: Model>(
    placeholder: Placeholder,
    table: &str,
    schema: &Schema,
    model: &T,
) -> OrmResult<Statement> {
    let mut present = present_columns(schema, model);
    if let Some(version_column) = schema.version_column() {
        match present.iter_mut().find(|(column, _)| *column == version_column) {
            Some(slot) => slot.1 = Value::Int(1),
            None => present.push((version_column, Value::Int(1))),
        }
    }
    render_insert(placeholder, table, present)
}

/// Build one multi-row INSERT for a slice of models.
///
/// Placeholder numbering continues across rows, so row two starts where row
/// one ended. A multi-row VALUES list cannot vary its column list per row:
/// the full insert column set is used and unset `Option` fields bind NULL
/// instead of being omitted.
pub fn build_insert_batch<T: Model>(
    placeholder: Placeholder,
    table: &str,
    schema: &Schema,
    models: &[T],
) -> OrmResult<Statement> {
    if models.is_empty() {
        return Err(OrmError::statement("no rows to insert"));
    }
    let columns = schema.insert_columns();
    if columns.is_empty() {
        return Err(OrmError::statement("no columns to insert"));
    }

    let mut query = String::with_capacity(64 + columns.len() * models.len() * 4);
    query.push_str("INSERT INTO ");
    query.push_str(table);
    query.push_str(" (");
    query.push_str(&columns.join(", "));
    query.push_str(") VALUES ");

    let mut values = Vec::with_capacity(columns.len() * models.len());
    let mut index = 0usize;
    for (row, model) in models.iter().enumerate() {
        if row > 0 {
            query.push_str(", ");
        }
        query.push('(');
        for (pos, &column) in columns.iter().enumerate() {
            if pos > 0 {
                query.push_str(", ");
            }
            index += 1;
            placeholder.write(&mut query, index);
            let value = schema
                .field_index(column)
                .and_then(|idx| model.value(idx))
                .map_or(Value::Null, |v| encode_value(schema, column, v));
            values.push(value);
        }
        query.push(')');
    }

    Ok(Statement::new(query, values))
}

fn render_insert(
    placeholder: Placeholder,
    table: &str,
    present: Vec<(&'static str, Value)>,
) -> OrmResult<Statement> {
    if present.is_empty() {
        return Err(OrmError::statement("no columns to insert"));
    }

    let mut query = String::with_capacity(48 + present.len() * 8);
    query.push_str("INSERT INTO ");
    query.push_str(table);
    query.push_str(" (");
    for (pos, (column, _)) in present.iter().enumerate() {
        if pos > 0 {
            query.push_str(", ");
        }
        query.push_str(column);
    }
    query.push_str(") VALUES (");
    for pos in 1..=present.len() {
        if pos > 1 {
            query.push_str(", ");
        }
        placeholder.write(&mut query, pos);
    }
    query.push(')');

    let values = present.into_iter().map(|(_, value)| value).collect();
    Ok(Statement::new(query, values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::fixtures::{User, user_schema};

    #[test]
    fn insert_omits_unset_options() {
        let stmt = build_insert(
            Placeholder::Dollar,
            User::TABLE,
            user_schema(),
            &User::default(),
        )
        .unwrap();
        assert_eq!(
            stmt.query,
            "INSERT INTO users (id, name, active, version) VALUES ($1, $2, $3, $4)"
        );
        assert_eq!(stmt.values.len(), 4);
        assert_eq!(stmt.values[2], Value::Text("Y".into()));
    }

    #[test]
    fn insert_includes_set_options() {
        let user = User {
            note: Some("vip".into()),
            ..User::default()
        };
        let stmt =
            build_insert(Placeholder::Dollar, User::TABLE, user_schema(), &user).unwrap();
        assert_eq!(
            stmt.query,
            "INSERT INTO users (id, name, active, note, version) VALUES ($1, $2, $3, $4, $5)"
        );
        assert_eq!(stmt.values[3], Value::Text("vip".into()));
    }

    #[test]
    fn insert_renders_each_strategy() {
        let user = User::default();
        let schema = user_schema();

        let mysql = build_insert(Placeholder::Question, "users", schema, &user).unwrap();
        assert_eq!(
            mysql.query,
            "INSERT INTO users (id, name, active, version) VALUES (?, ?, ?, ?)"
        );

        let oracle = build_insert(Placeholder::Colon, "users", schema, &user).unwrap();
        assert_eq!(
            oracle.query,
            "INSERT INTO users (id, name, active, version) VALUES (:1, :2, :3, :4)"
        );

        let oracle_named =
            build_insert(Placeholder::ColonVal, "users", schema, &user).unwrap();
        assert_eq!(
            oracle_named.query,
            "INSERT INTO users (id, name, active, version) VALUES (:val1, :val2, :val3, :val4)"
        );

        let mssql = build_insert(Placeholder::AtP, "users", schema, &user).unwrap();
        assert_eq!(
            mssql.query,
            "INSERT INTO users (id, name, active, version) VALUES (@p1, @p2, @p3, @p4)"
        );
    }

    #[test]
    fn insert_with_version_forces_one() {
        let user = User {
            version: 7,
            ..User::default()
        };
        let stmt =
            build_insert_with_version(Placeholder::Dollar, User::TABLE, user_schema(), &user)
                .unwrap();
        assert_eq!(stmt.values[3], Value::Int(1));
        // The caller's model keeps its own value.
        assert_eq!(user.version, 7);
    }

    #[test]
    fn batch_renumbers_across_rows() {
        let users = vec![
            User::default(),
            User {
                id: "u2".into(),
                note: Some("x".into()),
                ..User::default()
            },
        ];
        let stmt =
            build_insert_batch(Placeholder::Dollar, User::TABLE, user_schema(), &users).unwrap();
        assert_eq!(
            stmt.query,
            "INSERT INTO users (id, name, active, note, version) VALUES \
             ($1, $2, $3, $4, $5), ($6, $7, $8, $9, $10)"
        );
        // Row one's unset note binds NULL in batch mode.
        assert_eq!(stmt.values[3], Value::Null);
        assert_eq!(stmt.values[8], Value::Text("x".into()));
    }

    #[test]
    fn batch_keeps_question_marks_unnumbered() {
        let users = vec![User::default(), User::default()];
        let stmt =
            build_insert_batch(Placeholder::Question, User::TABLE, user_schema(), &users)
                .unwrap();
        assert_eq!(
            stmt.query,
            "INSERT INTO users (id, name, active, note, version) VALUES \
             (?, ?, ?, ?, ?), (?, ?, ?, ?, ?)"
        );
        assert_eq!(stmt.values.len(), 10);
    }

    #[test]
    fn batch_rejects_empty_input() {
        let stmt = build_insert_batch::<User>(
            Placeholder::Dollar,
            User::TABLE,
            user_schema(),
            &[],
        );
        assert!(stmt.is_err());
    }
}
