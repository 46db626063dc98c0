//! Merging a template with a data map into a [`Statement`].
//!
//! Each node's test runs against a dotted-path lookup into the data map
//! (a `serde_json` object); included nodes render their segments in order.
//! `#{name}` binds the resolved value: a scalar consumes one placeholder
//! slot, an array expands to one comma-joined placeholder per element, and
//! a missing or null value binds SQL NULL. `${name}` and `{name}` are
//! substituted as literal text and bind nothing. One placeholder index
//! threads across all nodes, so numbered dialects come out contiguous even
//! when a merge continues from an earlier statement's index.

use crate::dialect::Placeholder;
use crate::error::OrmResult;
use crate::statement::{Statement, decode_scalar};
use crate::template::node::{Segment, Template, Test};
use crate::value::Value;

/// Merge a template starting at the given 1-based placeholder index.
///
/// Returns the statement and the next free index.
pub fn merge(
    data: &serde_json::Value,
    template: &Template,
    placeholder: Placeholder,
    start_index: usize,
) -> OrmResult<(Statement, usize)> {
    let mut sql = String::new();
    let mut values = Vec::new();
    let mut index = start_index;

    for node in &template.nodes {
        if !included(data, &node.test) {
            continue;
        }
        let mut fragment = String::new();
        for segment in &node.segments {
            match segment {
                Segment::Literal(text) => fragment.push_str(text),
                Segment::Bind(path) => {
                    index = bind(placeholder, &mut fragment, &mut values, index, lookup(data, path));
                }
                Segment::Inline(path) => {
                    fragment.push_str(&inline(lookup(data, path)));
                }
            }
        }
        join(&mut sql, &fragment);
    }

    Ok((Statement::new(sql, values), index))
}

/// Merge a whole template from index 1.
pub fn build(
    data: &serde_json::Value,
    template: &Template,
    placeholder: Placeholder,
) -> OrmResult<Statement> {
    merge(data, template, placeholder, 1).map(|(statement, _)| statement)
}

fn included(data: &serde_json::Value, test: &Test) -> bool {
    match test {
        Test::Always => true,
        Test::IsNull(path) => absent(lookup(data, path)),
        Test::IsNotNull(path) => !absent(lookup(data, path)),
        Test::IsEmpty(path) => empty(lookup(data, path)),
        Test::IsNotEmpty(path) => !empty(lookup(data, path)),
        Test::Equals { property, literal } => stringify(lookup(data, property)) == *literal,
        Test::NotEquals { property, literal } => stringify(lookup(data, property)) != *literal,
    }
}

/// Missing paths, JSON null, and empty arrays all read as absent.
fn absent(value: Option<&serde_json::Value>) -> bool {
    match value {
        None | Some(serde_json::Value::Null) => true,
        Some(serde_json::Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Absent, or an empty string.
fn empty(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::String(text)) => text.is_empty(),
        other => absent(other),
    }
}

/// Dotted-path lookup into nested JSON objects.
fn lookup<'a>(data: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = data;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// Bind a resolved value, writing its placeholder tokens; returns the next
/// free index. Arrays expand to one placeholder per element.
fn bind(
    placeholder: Placeholder,
    sql: &mut String,
    values: &mut Vec<Value>,
    index: usize,
    resolved: Option<&serde_json::Value>,
) -> usize {
    match resolved {
        Some(serde_json::Value::Array(items)) => {
            let mut next = index;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                values.push(decode_scalar(item));
                placeholder.write(sql, next);
                next += 1;
            }
            next
        }
        Some(value) => {
            values.push(decode_scalar(value));
            placeholder.write(sql, index);
            index + 1
        }
        None => {
            values.push(Value::Null);
            placeholder.write(sql, index);
            index + 1
        }
    }
}

/// Literal text for an inline substitution. Arrays join their stringified
/// elements with commas; missing paths substitute nothing.
fn inline(resolved: Option<&serde_json::Value>) -> String {
    match resolved {
        Some(serde_json::Value::Array(items)) => {
            let parts: Vec<String> = items.iter().map(|item| stringify(Some(item))).collect();
            parts.join(", ")
        }
        other => stringify(other),
    }
}

fn stringify(value: Option<&serde_json::Value>) -> String {
    match value {
        None => String::new(),
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Null) => "null".to_owned(),
        Some(other) => other.to_string(),
    }
}

/// Append a rendered node, inserting one space where fragments would
/// otherwise run together.
fn join(sql: &mut String, fragment: &str) {
    if fragment.is_empty() {
        return;
    }
    if !sql.is_empty()
        && !sql.ends_with(char::is_whitespace)
        && !fragment.starts_with(char::is_whitespace)
    {
        sql.push(' ');
    }
    sql.push_str(fragment);
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::template::node::{TemplateKind, TemplateNode};

    fn select(nodes: Vec<TemplateNode>) -> Template {
        Template::new("t", TemplateKind::Select, nodes).unwrap()
    }

    #[test]
    fn text_nodes_merge_unchanged() {
        let template = select(vec![TemplateNode::text("SELECT * FROM users")]);
        let stmt = build(&json!({}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(stmt.query, "SELECT * FROM users");
        assert!(stmt.values.is_empty());
    }

    #[test]
    fn scalar_bind_consumes_one_slot() {
        let template = select(vec![TemplateNode::text("SELECT * FROM users WHERE id = #{id}")]);
        let stmt = build(&json!({"id": 5}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(stmt.query, "SELECT * FROM users WHERE id = $1");
        assert_eq!(stmt.values, vec![Value::Int(5)]);
    }

    #[test]
    fn slice_bind_expands_and_advances_index() {
        let template = select(vec![TemplateNode::text("id IN (#{ids})")]);
        let (stmt, next) = merge(
            &json!({"ids": [1, 2, 3]}),
            &template,
            Placeholder::Dollar,
            1,
        )
        .unwrap();
        assert_eq!(stmt.query, "id IN ($1, $2, $3)");
        assert_eq!(stmt.values.len(), 3);
        assert_eq!(next, 4);
    }

    #[test]
    fn merge_continues_from_start_index() {
        let template = select(vec![TemplateNode::text("a = #{a} AND b = #{b}")]);
        let (stmt, next) = merge(&json!({"a": 1, "b": 2}), &template, Placeholder::Dollar, 3).unwrap();
        assert_eq!(stmt.query, "a = $3 AND b = $4");
        assert_eq!(next, 5);
    }

    #[test]
    fn inline_substitutes_without_binding() {
        let template = select(vec![TemplateNode::text("SELECT * FROM {table} ORDER BY ${col}")]);
        let stmt = build(
            &json!({"table": "users", "col": "name"}),
            &template,
            Placeholder::Dollar,
        )
        .unwrap();
        assert_eq!(stmt.query, "SELECT * FROM users ORDER BY name");
        assert!(stmt.values.is_empty());
    }

    #[test]
    fn is_not_null_gates_on_presence() {
        let template = select(vec![
            TemplateNode::text("SELECT * FROM users"),
            TemplateNode::new(
                Test::IsNotNull("name".into()),
                "WHERE name like #{name}",
            ),
        ]);
        let with = build(&json!({"name": "jo%"}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(with.query, "SELECT * FROM users WHERE name like $1");
        let without = build(&json!({}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(without.query, "SELECT * FROM users");
    }

    #[test]
    fn empty_arrays_read_as_absent() {
        let template = select(vec![TemplateNode::new(
            Test::IsNotNull("ids".into()),
            "id IN (#{ids})",
        )]);
        let stmt = build(&json!({"ids": []}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(stmt.query, "");
        let negated = select(vec![TemplateNode::new(Test::IsNull("ids".into()), "1=1")]);
        let stmt = build(&json!({"ids": []}), &negated, Placeholder::Dollar).unwrap();
        assert_eq!(stmt.query, "1=1");
    }

    #[test]
    fn emptiness_also_covers_blank_strings() {
        let template = select(vec![TemplateNode::new(
            Test::IsNotEmpty("name".into()),
            "name = #{name}",
        )]);
        let blank = build(&json!({"name": ""}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(blank.query, "");
        let set = build(&json!({"name": "jo"}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(set.query, "name = $1");
    }

    #[test]
    fn equality_tests_stringify_first() {
        let template = select(vec![TemplateNode::new(
            Test::Equals {
                property: "kind".into(),
                literal: "5".into(),
            },
            "kind_five = 1",
        )]);
        let stmt = build(&json!({"kind": 5}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(stmt.query, "kind_five = 1");
        let stmt = build(&json!({"kind": 6}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(stmt.query, "");
    }

    #[test]
    fn missing_bind_becomes_null() {
        let template = select(vec![TemplateNode::text("v = #{missing}")]);
        let stmt = build(&json!({}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(stmt.query, "v = $1");
        assert_eq!(stmt.values, vec![Value::Null]);
    }

    #[test]
    fn dotted_paths_walk_nested_objects() {
        let template = select(vec![TemplateNode::text("id = #{user.id}")]);
        let stmt = build(&json!({"user": {"id": 9}}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(stmt.values, vec![Value::Int(9)]);
    }

    #[test]
    fn question_placeholders_repeat() {
        let template = select(vec![TemplateNode::text("id IN (#{ids})")]);
        let stmt = build(&json!({"ids": ["a", "b"]}), &template, Placeholder::Question).unwrap();
        assert_eq!(stmt.query, "id IN (?, ?)");
    }

    #[test]
    fn nodes_join_with_single_space() {
        let template = select(vec![
            TemplateNode::text("SELECT * FROM users"),
            TemplateNode::text("WHERE active = 'Y'"),
        ]);
        let stmt = build(&json!({}), &template, Placeholder::Dollar).unwrap();
        assert_eq!(stmt.query, "SELECT * FROM users WHERE active = 'Y'");
    }
}
