//! A statement catalog parsed from markup and merged per request.

use anyorm::template::{build, merge};
use anyorm::{Placeholder, TemplateKind, TemplateSet, Value};
use serde_json::json;

const CATALOG: &str = r#"
    <select id="find_orders">
        SELECT id, customer, status, total FROM orders
        <isNotNull property="status">WHERE status = #{status}</isNotNull>
        <isNotEqual property="scope" value="all">AND archived = 0</isNotEqual>
        <isNotNull property="sort">ORDER BY ${sort}</isNotNull>
    </select>
    <update id="reprice">
        UPDATE orders SET total = #{total} WHERE id IN (#{ids})
    </update>
    <delete id="purge">DELETE FROM orders WHERE archived = 1</delete>
"#;

fn catalog() -> TemplateSet {
    TemplateSet::parse(CATALOG).unwrap()
}

#[test]
fn catalog_parses_every_root() {
    let set = catalog();
    assert_eq!(set.len(), 3);
    assert_eq!(set.get("find_orders").unwrap().kind, TemplateKind::Select);
    assert_eq!(set.get("reprice").unwrap().kind, TemplateKind::Update);
    assert_eq!(set.get("purge").unwrap().kind, TemplateKind::Delete);
    assert!(set.get("missing").is_none());
}

#[test]
fn conditionals_shape_the_statement() {
    let set = catalog();
    let find = set.get("find_orders").unwrap();

    // Default scope keeps the archived filter and sorts inline.
    let stmt = build(
        &json!({"status": "open", "sort": "total"}),
        find,
        Placeholder::Dollar,
    )
    .unwrap();
    assert_eq!(
        stmt.query,
        "SELECT id, customer, status, total FROM orders \
         WHERE status = $1 AND archived = 0 ORDER BY total"
    );
    assert_eq!(stmt.values, vec![Value::Text("open".into())]);

    // Asking for everything drops the archived filter.
    let stmt = build(
        &json!({"status": "open", "scope": "all"}),
        find,
        Placeholder::Dollar,
    )
    .unwrap();
    assert_eq!(
        stmt.query,
        "SELECT id, customer, status, total FROM orders WHERE status = $1"
    );
}

#[test]
fn array_binds_expand_per_dialect() {
    let set = catalog();
    let reprice = set.get("reprice").unwrap();
    let data = json!({"total": 99, "ids": [3, 4, 5]});

    let stmt = build(&data, reprice, Placeholder::Dollar).unwrap();
    assert_eq!(
        stmt.query,
        "UPDATE orders SET total = $1 WHERE id IN ($2, $3, $4)"
    );
    assert_eq!(
        stmt.values,
        vec![Value::Int(99), Value::Int(3), Value::Int(4), Value::Int(5)]
    );

    let stmt = build(&data, reprice, Placeholder::Question).unwrap();
    assert_eq!(stmt.query, "UPDATE orders SET total = ? WHERE id IN (?, ?, ?)");
}

#[test]
fn merge_threads_indexes_across_templates() {
    let set = catalog();
    let guard = TemplateSet::parse(r#"<select id="tenant_guard">AND tenant = #{tenant}</select>"#)
        .unwrap();

    let (base, next) = merge(
        &json!({"status": "open", "scope": "all"}),
        set.get("find_orders").unwrap(),
        Placeholder::Dollar,
        1,
    )
    .unwrap();
    let (extra, _) = merge(
        &json!({"tenant": "acme"}),
        guard.get("tenant_guard").unwrap(),
        Placeholder::Dollar,
        next,
    )
    .unwrap();

    // The continuation numbers its placeholders after the base statement.
    assert_eq!(extra.query, "AND tenant = $2");

    let mut values = base.values;
    values.extend(extra.values);
    let sql = format!("{} {}", base.query, extra.query);
    assert_eq!(
        sql,
        "SELECT id, customer, status, total FROM orders WHERE status = $1 AND tenant = $2"
    );
    assert_eq!(
        values,
        vec![Value::Text("open".into()), Value::Text("acme".into())]
    );
}
