//! WHERE/ORDER BY assembly from a filter against its model's schema.
//!
//! [`build_query`] renders the fragments and argument list; [`build_select`]
//! assembles the complete SELECT. Predicates land in a fixed order: the
//! filter's own fields first, then keyword matches, then exclusion sets,
//! all joined with `AND` (the clause is a flat conjunction, no OR groups).
//! Placeholder numbering threads across the whole clause so numbered
//! dialects come out contiguous.

use crate::dialect::{Dialect, Placeholder};
use crate::error::OrmResult;
use crate::query::filter::{Filter, Match, Predicate, SearchQuery};
use crate::query::sort;
use crate::schema::{Schema, schema_of};
use crate::statement::{Statement, decode_scalar};
use crate::stmt::encode_value;
use crate::value::Value;

/// Rendered fragments for a dynamic SELECT.
///
/// `where_clause` and `order_by` carry no leading keyword and are empty when
/// nothing applies; `columns` is the resolved projection.
#[derive(Debug, Clone, Default)]
pub struct DynamicQuery {
    pub where_clause: String,
    pub order_by: String,
    pub values: Vec<Value>,
    pub columns: Vec<&'static str>,
}

/// Render a filter into WHERE/ORDER BY fragments and bound values.
pub fn build_query<F: Filter>(dialect: Dialect, filter: &F) -> OrmResult<DynamicQuery> {
    let schema = schema_of::<F::Model>()?;
    let placeholder = dialect.placeholder();
    let mut fragments = Vec::new();
    let mut values = Vec::new();

    for condition in filter.conditions() {
        let column = field_column(schema, condition.field, condition.column);
        let predicate = encode_predicate(schema, column, condition.predicate);
        fragments.push(render_predicate(
            dialect,
            placeholder,
            column,
            predicate,
            &mut values,
        ));
    }

    let meta = filter.search();

    if let Some(keyword) = meta.and_then(SearchQuery::keyword) {
        for tagged in F::keyword_fields() {
            let column = field_column(schema, tagged.field, tagged.column);
            let predicate = match tagged.mode {
                Match::Exact => Predicate::Eq(Value::Text(keyword.to_owned())),
                mode => Predicate::Text {
                    value: keyword.to_owned(),
                    mode,
                },
            };
            fragments.push(render_predicate(
                dialect,
                placeholder,
                column,
                predicate,
                &mut values,
            ));
        }
    }

    if let Some(meta) = meta {
        for (name, excluded) in &meta.excluding {
            if excluded.is_empty() {
                continue;
            }
            let Some(column) = sort::resolve_name(schema, F::overrides(), name) else {
                continue;
            };
            let list = excluded.iter().map(decode_scalar).collect();
            let predicate = encode_predicate(schema, &column, Predicate::NotIn(list));
            fragments.push(render_predicate(
                dialect,
                placeholder,
                &column,
                predicate,
                &mut values,
            ));
        }
    }

    let order_by = match meta.and_then(SearchQuery::sort_expr) {
        Some(expr) => sort::order_by(schema, F::overrides(), expr),
        None => String::new(),
    };

    let columns = match meta {
        Some(meta) if !meta.fields.is_empty() => projection(schema, &meta.fields),
        _ => schema.columns().to_vec(),
    };

    Ok(DynamicQuery {
        where_clause: fragments.join(" AND "),
        order_by,
        values,
        columns,
    })
}

/// Assemble the full SELECT for a filter.
///
/// Paging, when wanted, is appended by [`paginate`](crate::page::paginate).
pub fn build_select<F: Filter>(dialect: Dialect, table: &str, filter: &F) -> OrmResult<Statement> {
    let query = build_query(dialect, filter)?;
    let mut sql = String::with_capacity(64 + query.where_clause.len() + query.order_by.len());
    sql.push_str("SELECT ");
    for (i, column) in query.columns.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(column);
    }
    sql.push_str(" FROM ");
    sql.push_str(table);
    if !query.where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&query.where_clause);
    }
    if !query.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(&query.order_by);
    }
    Ok(Statement::new(sql, query.values))
}

/// Resolve a declared filter field to its column: attribute override, the
/// schema's JSON-name map, the schema's own columns, then the field name
/// itself (a Rust identifier already is its snake_case column).
fn field_column(
    schema: &Schema,
    field: &'static str,
    declared: Option<&'static str>,
) -> &'static str {
    if let Some(column) = declared {
        return column;
    }
    if let Some(column) = schema.column_for_json(field) {
        return column;
    }
    if let Some(def) = schema.field(field) {
        return def.column;
    }
    field
}

/// Resolve the projection to schema columns, dropping names the schema does
/// not know; an empty result falls back to the full column list.
fn projection(schema: &Schema, fields: &[String]) -> Vec<&'static str> {
    let mut columns = Vec::with_capacity(fields.len());
    for name in fields {
        let resolved = schema
            .column_for_json(name)
            .or_else(|| schema.field(name).map(|def| def.column));
        if let Some(column) = resolved
            && !columns.contains(&column)
        {
            columns.push(column);
        }
    }
    if columns.is_empty() {
        schema.columns().to_vec()
    } else {
        columns
    }
}

/// Apply sentinel-boolean encoding to the predicate shapes that carry
/// comparable values.
fn encode_predicate(schema: &Schema, column: &str, predicate: Predicate) -> Predicate {
    match predicate {
        Predicate::Eq(value) => Predicate::Eq(encode_value(schema, column, value)),
        Predicate::In(list) => Predicate::In(
            list.into_iter()
                .map(|value| encode_value(schema, column, value))
                .collect(),
        ),
        Predicate::NotIn(list) => Predicate::NotIn(
            list.into_iter()
                .map(|value| encode_value(schema, column, value))
                .collect(),
        ),
        other => other,
    }
}

fn render_predicate(
    dialect: Dialect,
    placeholder: Placeholder,
    column: &str,
    predicate: Predicate,
    values: &mut Vec<Value>,
) -> String {
    let mut sql = String::new();
    match predicate {
        Predicate::Eq(value) => {
            sql.push_str(column);
            sql.push_str(" = ");
            bind(placeholder, &mut sql, values, value);
        }
        Predicate::Text { value, mode } => {
            sql.push_str(column);
            sql.push(' ');
            sql.push_str(if dialect.case_insensitive_like() {
                "ilike"
            } else {
                "like"
            });
            sql.push(' ');
            bind(placeholder, &mut sql, values, Value::Text(mode.pattern(&value)));
        }
        Predicate::In(list) => {
            render_membership(placeholder, &mut sql, column, "IN", list, values);
        }
        Predicate::NotIn(list) => {
            render_membership(placeholder, &mut sql, column, "NOT IN", list, values);
        }
        Predicate::Span { start, end } => {
            sql.push_str(column);
            sql.push_str(" >= ");
            bind(placeholder, &mut sql, values, Value::Timestamp(start));
            sql.push_str(" AND ");
            sql.push_str(column);
            sql.push_str(" < ");
            bind(placeholder, &mut sql, values, Value::Timestamp(end));
        }
        Predicate::Bounds {
            min,
            lower,
            max,
            upper,
        } => {
            let mut wrote = false;
            if let Some((op, value)) = pick_bound(min, lower, " >= ", " > ") {
                sql.push_str(column);
                sql.push_str(op);
                bind(placeholder, &mut sql, values, value);
                wrote = true;
            }
            if let Some((op, value)) = pick_bound(max, upper, " <= ", " < ") {
                if wrote {
                    sql.push_str(" AND ");
                }
                sql.push_str(column);
                sql.push_str(op);
                bind(placeholder, &mut sql, values, value);
            }
        }
    }
    sql
}

fn render_membership(
    placeholder: Placeholder,
    sql: &mut String,
    column: &str,
    op: &str,
    list: Vec<Value>,
    values: &mut Vec<Value>,
) {
    if list.is_empty() {
        // Empty membership decides the predicate outright.
        sql.push_str(if op == "IN" { "1=0" } else { "1=1" });
        return;
    }
    sql.push_str(column);
    sql.push(' ');
    sql.push_str(op);
    sql.push_str(" (");
    for (i, value) in list.into_iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        bind(placeholder, sql, values, value);
    }
    sql.push(')');
}

// Inclusive bound wins when both variants of one side are set.
fn pick_bound(
    inclusive: Option<Value>,
    exclusive: Option<Value>,
    inclusive_op: &'static str,
    exclusive_op: &'static str,
) -> Option<(&'static str, Value)> {
    match (inclusive, exclusive) {
        (Some(value), _) => Some((inclusive_op, value)),
        (None, Some(value)) => Some((exclusive_op, value)),
        (None, None) => None,
    }
}

/// Push a value and write its 1-based placeholder token.
fn bind(placeholder: Placeholder, sql: &mut String, values: &mut Vec<Value>, value: Value) {
    values.push(value);
    placeholder.write(sql, values.len());
}
