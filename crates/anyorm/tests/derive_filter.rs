//! Derived Filter predicates feeding the dynamic query builder.

#![allow(dead_code)]

use anyorm::{
    Condition, DateRange, Dialect, Filter, Match, Model, Predicate, SearchQuery, Value,
    build_query, build_select,
};
use chrono::{TimeZone, Utc};

#[derive(Model)]
#[orm(table = "users")]
struct User {
    #[orm(key)]
    id: String,
    name: String,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Filter, Default)]
#[orm(model = User)]
struct UserSearch {
    #[orm(matches = "prefix", keyword)]
    name: Option<String>,
    #[orm(column = "id")]
    ids: Vec<String>,
    #[orm(column = "created_at")]
    created: Option<DateRange>,
    #[orm(skip)]
    trace: Option<String>,
    search: SearchQuery,
}

#[test]
fn populated_fields_become_conditions_in_declaration_order() {
    let filter = UserSearch {
        name: Some("jo".into()),
        ids: vec!["u1".into(), "u2".into()],
        ..UserSearch::default()
    };
    let conditions = filter.conditions();
    assert_eq!(
        conditions[0],
        Condition::new(
            "name",
            None,
            Predicate::Text {
                value: "jo".into(),
                mode: Match::Prefix,
            },
        )
    );
    assert_eq!(
        conditions[1],
        Condition::new(
            "ids",
            Some("id"),
            Predicate::In(vec![Value::Text("u1".into()), Value::Text("u2".into())]),
        )
    );
}

#[test]
fn empty_fields_and_skipped_fields_contribute_nothing() {
    assert!(UserSearch::default().conditions().is_empty());

    let filter = UserSearch {
        name: Some(String::new()),
        trace: Some("request-77".into()),
        ..UserSearch::default()
    };
    assert!(filter.conditions().is_empty());
}

#[test]
fn prefix_match_renders_ilike_on_postgres() {
    let filter = UserSearch {
        name: Some("jo".into()),
        ..UserSearch::default()
    };
    let stmt = build_select(Dialect::Postgres, "users", &filter).unwrap();
    assert_eq!(
        stmt.query,
        "SELECT id, name, created_at FROM users WHERE name ilike $1"
    );
    assert_eq!(stmt.values, vec![Value::Text("jo%".into())]);
}

#[test]
fn mysql_renders_plain_like_with_question_marks() {
    let filter = UserSearch {
        name: Some("jo".into()),
        ..UserSearch::default()
    };
    let q = build_query(Dialect::Mysql, &filter).unwrap();
    assert_eq!(q.where_clause, "name like ?");
    assert_eq!(q.values, vec![Value::Text("jo%".into())]);
}

#[test]
fn column_overrides_resolve_the_predicate_column() {
    let filter = UserSearch {
        created: Some(DateRange::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 1, 31, 0, 0, 0).unwrap(),
        )),
        ..UserSearch::default()
    };
    let q = build_query(Dialect::Postgres, &filter).unwrap();
    assert_eq!(q.where_clause, "created_at >= $1 AND created_at < $2");
}

#[test]
fn keyword_search_uses_the_tagged_fields_shaping() {
    let filter = UserSearch {
        search: SearchQuery {
            q: Some("ann".into()),
            ..SearchQuery::default()
        },
        ..UserSearch::default()
    };
    let q = build_query(Dialect::Postgres, &filter).unwrap();
    assert_eq!(q.where_clause, "name ilike $1");
    assert_eq!(q.values, vec![Value::Text("ann%".into())]);

    let tagged = UserSearch::keyword_fields();
    assert_eq!(tagged.len(), 1);
    assert_eq!(tagged[0].field, "name");
    assert_eq!(tagged[0].mode, Match::Prefix);
}

#[test]
fn sort_tokens_resolve_through_declared_overrides() {
    assert_eq!(
        UserSearch::overrides(),
        &[("ids", "id"), ("created", "created_at")]
    );

    let filter = UserSearch {
        search: SearchQuery {
            sort: Some("-created,name".into()),
            ..SearchQuery::default()
        },
        ..UserSearch::default()
    };
    let q = build_query(Dialect::Postgres, &filter).unwrap();
    assert_eq!(q.order_by, "created_at DESC, name");
}

#[test]
fn search_meta_is_exposed_to_the_paging_layer() {
    let filter = UserSearch {
        search: SearchQuery {
            page: 3,
            limit: 25,
            ..SearchQuery::default()
        },
        ..UserSearch::default()
    };
    let meta = filter.search().unwrap();
    assert_eq!(meta.page, 3);
    assert_eq!(meta.limit, 25);

    #[derive(Filter, Default)]
    #[orm(model = User)]
    struct Bare {
        name: Option<String>,
    }
    assert!(Bare::default().search().is_none());
}
