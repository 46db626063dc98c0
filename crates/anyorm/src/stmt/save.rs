//! Upsert ("save") builder across the dialect merge syntaxes.
//!
//! All four forms are insert-or-update-by-primary-key in one round trip and
//! bind a single round of positional parameters. The MERGE dialects
//! reference bound values through the source alias rather than repeating
//! placeholders, so no driver support for parameter reuse is required.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::model::Model;
use crate::schema::Schema;
use crate::statement::Statement;
use crate::stmt::present_columns;
use crate::value::Value;

/// Build an upsert for the model's dialect family.
///
/// With a version field, the insert side binds version 1 and the update
/// side bumps the stored version by one; the model's own version value is
/// not consulted for the update side, which is what makes the statement a
/// single parameter round.
pub fn build_save<T: Model>(
    dialect: Dialect,
    table: &str,
    schema: &Schema,
    model: &T,
) -> OrmResult<Statement> {
    let mut present = present_columns(schema, model);
    if present.is_empty() {
        return Err(OrmError::statement("no columns to save"));
    }

    let version_column = schema.version_column();
    if let Some(version_column) = version_column {
        match present.iter_mut().find(|(c, _)| *c == version_column) {
            Some(slot) => slot.1 = Value::Int(1),
            None => present.push((version_column, Value::Int(1))),
        }
    }

    for &key in schema.keys() {
        if !present.iter().any(|(c, _)| *c == key) {
            return Err(OrmError::statement(format!(
                "key column '{key}' is unset"
            )));
        }
    }

    // Update branch: non-key present columns, version handled as a bump.
    let update_columns: Vec<&'static str> = present
        .iter()
        .map(|(c, _)| *c)
        .filter(|c| !schema.is_key(c) && Some(*c) != version_column)
        .collect();

    match dialect {
        Dialect::Postgres | Dialect::Sqlite => {
            Ok(on_conflict(dialect, table, schema, present, &update_columns, version_column))
        }
        Dialect::Mysql => {
            Ok(on_duplicate(dialect, table, schema, present, &update_columns, version_column))
        }
        Dialect::Mssql | Dialect::Oracle => {
            Ok(merge(dialect, table, schema, present, &update_columns, version_column))
        }
    }
}

fn on_conflict(
    dialect: Dialect,
    table: &str,
    schema: &Schema,
    present: Vec<(&'static str, Value)>,
    update_columns: &[&'static str],
    version_column: Option<&'static str>,
) -> Statement {
    let placeholder = dialect.placeholder();
    let mut query = String::with_capacity(96 + present.len() * 16);

    query.push_str("INSERT INTO ");
    query.push_str(table);
    query.push_str(" (");
    push_columns(&mut query, &present);
    query.push_str(") VALUES (");
    for pos in 1..=present.len() {
        if pos > 1 {
            query.push_str(", ");
        }
        placeholder.write(&mut query, pos);
    }
    query.push_str(") ON CONFLICT (");
    query.push_str(&schema.keys().join(", "));
    query.push(')');

    if update_columns.is_empty() && version_column.is_none() {
        query.push_str(" DO NOTHING");
    } else {
        query.push_str(" DO UPDATE SET ");
        for (pos, column) in update_columns.iter().enumerate() {
            if pos > 0 {
                query.push_str(", ");
            }
            query.push_str(column);
            query.push_str(" = EXCLUDED.");
            query.push_str(column);
        }
        if let Some(version) = version_column {
            if !update_columns.is_empty() {
                query.push_str(", ");
            }
            // Existing row's version, qualified to disambiguate from EXCLUDED.
            query.push_str(version);
            query.push_str(" = ");
            query.push_str(table);
            query.push('.');
            query.push_str(version);
            query.push_str(" + 1");
        }
    }

    let values = present.into_iter().map(|(_, v)| v).collect();
    Statement::new(query, values)
}

fn on_duplicate(
    dialect: Dialect,
    table: &str,
    schema: &Schema,
    present: Vec<(&'static str, Value)>,
    update_columns: &[&'static str],
    version_column: Option<&'static str>,
) -> Statement {
    let placeholder = dialect.placeholder();
    let mut query = String::with_capacity(96 + present.len() * 16);

    query.push_str("INSERT INTO ");
    query.push_str(table);
    query.push_str(" (");
    push_columns(&mut query, &present);
    query.push_str(") VALUES (");
    for pos in 1..=present.len() {
        if pos > 1 {
            query.push_str(", ");
        }
        placeholder.write(&mut query, pos);
    }
    query.push_str(") ON DUPLICATE KEY UPDATE ");

    if update_columns.is_empty() && version_column.is_none() {
        // ODKU needs at least one assignment; self-assign the first key.
        let key = schema.keys()[0];
        query.push_str(key);
        query.push_str(" = ");
        query.push_str(key);
    } else {
        for (pos, column) in update_columns.iter().enumerate() {
            if pos > 0 {
                query.push_str(", ");
            }
            query.push_str(column);
            query.push_str(" = VALUES(");
            query.push_str(column);
            query.push(')');
        }
        if let Some(version) = version_column {
            if !update_columns.is_empty() {
                query.push_str(", ");
            }
            query.push_str(version);
            query.push_str(" = ");
            query.push_str(version);
            query.push_str(" + 1");
        }
    }

    let values = present.into_iter().map(|(_, v)| v).collect();
    Statement::new(query, values)
}

fn merge(
    dialect: Dialect,
    table: &str,
    schema: &Schema,
    present: Vec<(&'static str, Value)>,
    update_columns: &[&'static str],
    version_column: Option<&'static str>,
) -> Statement {
    let placeholder = dialect.placeholder();
    let mut query = String::with_capacity(160 + present.len() * 24);

    query.push_str("MERGE INTO ");
    query.push_str(table);
    match dialect {
        Dialect::Mssql => {
            query.push_str(" AS t USING (VALUES (");
            for pos in 1..=present.len() {
                if pos > 1 {
                    query.push_str(", ");
                }
                placeholder.write(&mut query, pos);
            }
            query.push_str(")) AS s (");
            push_columns(&mut query, &present);
            query.push(')');
        }
        _ => {
            // Oracle sources a one-row SELECT from dual.
            query.push_str(" t USING (SELECT ");
            for (pos, (column, _)) in present.iter().enumerate() {
                if pos > 0 {
                    query.push_str(", ");
                }
                placeholder.write(&mut query, pos + 1);
                query.push_str(" AS ");
                query.push_str(column);
            }
            query.push_str(" FROM dual) s");
        }
    }

    query.push_str(" ON (");
    for (pos, key) in schema.keys().iter().enumerate() {
        if pos > 0 {
            query.push_str(" AND ");
        }
        query.push_str("t.");
        query.push_str(key);
        query.push_str(" = s.");
        query.push_str(key);
    }
    query.push(')');

    if !update_columns.is_empty() || version_column.is_some() {
        query.push_str(" WHEN MATCHED THEN UPDATE SET ");
        for (pos, column) in update_columns.iter().enumerate() {
            if pos > 0 {
                query.push_str(", ");
            }
            query.push_str("t.");
            query.push_str(column);
            query.push_str(" = s.");
            query.push_str(column);
        }
        if let Some(version) = version_column {
            if !update_columns.is_empty() {
                query.push_str(", ");
            }
            query.push_str("t.");
            query.push_str(version);
            query.push_str(" = t.");
            query.push_str(version);
            query.push_str(" + 1");
        }
    }

    query.push_str(" WHEN NOT MATCHED THEN INSERT (");
    push_columns(&mut query, &present);
    query.push_str(") VALUES (");
    for (pos, (column, _)) in present.iter().enumerate() {
        if pos > 0 {
            query.push_str(", ");
        }
        query.push_str("s.");
        query.push_str(column);
    }
    query.push(')');

    if dialect == Dialect::Mssql {
        query.push(';');
    }

    let values = present.into_iter().map(|(_, v)| v).collect();
    Statement::new(query, values)
}

fn push_columns(query: &mut String, present: &[(&'static str, Value)]) {
    for (pos, (column, _)) in present.iter().enumerate() {
        if pos > 0 {
            query.push_str(", ");
        }
        query.push_str(column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Key;
    use crate::row::Row;
    use crate::schema::FieldDef;
    use crate::stmt::fixtures::{Membership, User, membership_schema, user_schema};

    #[test]
    fn postgres_on_conflict_bumps_version() {
        let stmt =
            build_save(Dialect::Postgres, User::TABLE, user_schema(), &User::default())
                .unwrap();
        assert_eq!(
            stmt.query,
            "INSERT INTO users (id, name, active, version) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, \
             active = EXCLUDED.active, version = users.version + 1"
        );
        // Insert side always starts at version 1.
        assert_eq!(stmt.values[3], Value::Int(1));
        assert_eq!(stmt.values.len(), 4);
    }

    #[test]
    fn sqlite_uses_on_conflict_with_question_marks() {
        let m = Membership {
            org: "o1".into(),
            id: "m1".into(),
            label: "staff".into(),
        };
        let stmt =
            build_save(Dialect::Sqlite, Membership::TABLE, membership_schema(), &m).unwrap();
        assert_eq!(
            stmt.query,
            "INSERT INTO memberships (org, id, label) VALUES (?, ?, ?) \
             ON CONFLICT (org, id) DO UPDATE SET label = EXCLUDED.label"
        );
    }

    #[test]
    fn mysql_on_duplicate_key() {
        let stmt =
            build_save(Dialect::Mysql, User::TABLE, user_schema(), &User::default()).unwrap();
        assert_eq!(
            stmt.query,
            "INSERT INTO users (id, name, active, version) VALUES (?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE name = VALUES(name), active = VALUES(active), \
             version = version + 1"
        );
    }

    #[test]
    fn mssql_merge_binds_one_round() {
        let stmt =
            build_save(Dialect::Mssql, User::TABLE, user_schema(), &User::default()).unwrap();
        assert_eq!(
            stmt.query,
            "MERGE INTO users AS t USING (VALUES (@p1, @p2, @p3, @p4)) \
             AS s (id, name, active, version) ON (t.id = s.id) \
             WHEN MATCHED THEN UPDATE SET t.name = s.name, t.active = s.active, \
             t.version = t.version + 1 \
             WHEN NOT MATCHED THEN INSERT (id, name, active, version) \
             VALUES (s.id, s.name, s.active, s.version);"
        );
        assert_eq!(stmt.values.len(), 4);
    }

    #[test]
    fn oracle_merge_selects_from_dual() {
        let m = Membership {
            org: "o1".into(),
            id: "m1".into(),
            label: "staff".into(),
        };
        let stmt =
            build_save(Dialect::Oracle, Membership::TABLE, membership_schema(), &m).unwrap();
        assert_eq!(
            stmt.query,
            "MERGE INTO memberships t USING (SELECT :1 AS org, :2 AS id, :3 AS label \
             FROM dual) s ON (t.org = s.org AND t.id = s.id) \
             WHEN MATCHED THEN UPDATE SET t.label = s.label \
             WHEN NOT MATCHED THEN INSERT (org, id, label) \
             VALUES (s.org, s.id, s.label)"
        );
    }

    // Keys-only model: nothing to update on conflict.
    struct Tag {
        id: String,
    }

    impl crate::model::Model for Tag {
        const TABLE: &'static str = "tags";

        fn fields() -> &'static [FieldDef] {
            static FIELDS: &[FieldDef] = &[FieldDef {
                name: "id",
                column: "id",
                json: "id",
                key: true,
                updatable: false,
                version: false,
                bools: None,
            }];
            FIELDS
        }

        fn value(&self, index: usize) -> Option<Value> {
            (index == 0).then(|| self.id.as_str().into())
        }

        fn key(&self) -> Key {
            Key::Single(self.id.as_str().into())
        }

        fn from_row(row: &Row) -> crate::OrmResult<Self> {
            Ok(Self {
                id: row.try_get("id")?,
            })
        }
    }

    #[test]
    fn keys_only_model_degrades_gracefully() {
        let schema = crate::schema::schema_of::<Tag>().unwrap();
        let tag = Tag { id: "t1".into() };

        let pg = build_save(Dialect::Postgres, Tag::TABLE, schema, &tag).unwrap();
        assert_eq!(
            pg.query,
            "INSERT INTO tags (id) VALUES ($1) ON CONFLICT (id) DO NOTHING"
        );

        let my = build_save(Dialect::Mysql, Tag::TABLE, schema, &tag).unwrap();
        assert_eq!(
            my.query,
            "INSERT INTO tags (id) VALUES (?) ON DUPLICATE KEY UPDATE id = id"
        );

        let ora = build_save(Dialect::Oracle, Tag::TABLE, schema, &tag).unwrap();
        assert!(!ora.query.contains("WHEN MATCHED"));
        assert!(ora.query.contains("WHEN NOT MATCHED THEN INSERT (id) VALUES (s.id)"));
    }
}
