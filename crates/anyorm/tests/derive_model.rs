//! Derived Model metadata, field access, and row scanning.
//!
//! A derived impl must behave exactly like a hand-written one: descriptors
//! in declaration order, unset options absent at write time, name-based
//! scanning tolerant of projected and reordered result sets.

#![allow(dead_code)]

use anyorm::{Dialect, Key, Model, Row, Value, schema_of, stmt};

#[derive(Debug, Model)]
#[orm(table = "accounts")]
struct Account {
    #[orm(key)]
    id: String,
    name: String,
    #[orm(bools("Y", "N"))]
    active: bool,
    note: Option<String>,
    #[orm(version)]
    version: i32,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            id: "a1".into(),
            name: "jo".into(),
            active: true,
            note: None,
            version: 1,
        }
    }
}

#[derive(Model)]
#[orm(table = "memberships")]
struct Membership {
    #[orm(key)]
    org: String,
    #[orm(key)]
    id: String,
    label: String,
}

#[derive(Model)]
#[orm(table = "articles")]
struct Article {
    #[orm(key, column = "article_id")]
    id: i64,
    #[orm(json = "headline")]
    title: String,
    #[orm(readonly)]
    created_by: String,
    #[orm(ignore)]
    dirty: bool,
}

#[test]
fn descriptors_follow_declaration_order() {
    let fields = Account::fields();
    let names: Vec<_> = fields.iter().map(|f| f.name).collect();
    assert_eq!(names, vec!["id", "name", "active", "note", "version"]);
    assert!(fields[0].key);
    assert!(!fields[0].updatable);
    assert_eq!(fields[2].bools, Some(("Y", "N")));
    assert!(fields[4].version);
}

#[test]
fn schema_reads_keys_and_version_off_the_descriptors() {
    let schema = schema_of::<Account>().unwrap();
    assert_eq!(schema.keys(), &["id"]);
    assert_eq!(schema.version_column(), Some("version"));
    assert_eq!(schema.update_columns(), &["name", "active", "note"]);
}

#[test]
fn unset_option_reads_as_absent() {
    let account = Account::default();
    assert_eq!(account.value(0), Some(Value::Text("a1".into())));
    assert_eq!(account.value(2), Some(Value::Bool(true)));
    assert_eq!(account.value(3), None);

    let with_note = Account {
        note: Some("kept".into()),
        ..Account::default()
    };
    assert_eq!(with_note.value(3), Some(Value::Text("kept".into())));
}

#[test]
fn single_and_composite_keys() {
    assert_eq!(
        Account::default().key(),
        Key::Single(Value::Text("a1".into()))
    );
    let membership = Membership {
        org: "o1".into(),
        id: "m2".into(),
        label: "owner".into(),
    };
    assert_eq!(
        membership.key(),
        Key::Composite(vec![
            ("org".to_string(), Value::Text("o1".into())),
            ("id".to_string(), Value::Text("m2".into())),
        ])
    );
}

#[test]
fn scanning_is_by_name_and_tolerates_reordering() {
    let row = Row::new(
        vec![
            "version".to_string(),
            "name".to_string(),
            "active".to_string(),
            "id".to_string(),
            "extra".to_string(),
        ],
        vec![
            Value::Int(7),
            Value::Text("jo".into()),
            Value::Text("Y".into()),
            Value::Text("a1".into()),
            Value::Int(99),
        ],
    );
    let account = Account::from_row(&row).unwrap();
    assert_eq!(account.id, "a1");
    assert!(account.active);
    assert_eq!(account.version, 7);
    // The projected-out option column scans as unset.
    assert_eq!(account.note, None);
}

#[test]
fn missing_required_column_names_the_column() {
    let row = Row::new(
        vec!["id".to_string()],
        vec![Value::Text("a1".into())],
    );
    let err = Account::from_row(&row).unwrap_err();
    assert!(err.to_string().contains("name"));
}

#[test]
fn sentinel_bool_decodes_and_rejects_other_text() {
    let row = Row::new(
        vec![
            "id".to_string(),
            "name".to_string(),
            "active".to_string(),
            "version".to_string(),
        ],
        vec![
            Value::Text("a1".into()),
            Value::Text("jo".into()),
            Value::Text("N".into()),
            Value::Int(1),
        ],
    );
    let account = Account::from_row(&row).unwrap();
    assert!(!account.active);

    let row = Row::new(
        vec![
            "id".to_string(),
            "name".to_string(),
            "active".to_string(),
            "version".to_string(),
        ],
        vec![
            Value::Text("a1".into()),
            Value::Text("jo".into()),
            Value::Text("X".into()),
            Value::Int(1),
        ],
    );
    let err = Account::from_row(&row).unwrap_err();
    assert!(err.to_string().contains("active"));
}

#[test]
fn column_and_json_renames_flow_into_the_schema() {
    let schema = schema_of::<Article>().unwrap();
    assert_eq!(schema.keys(), &["article_id"]);
    assert_eq!(schema.column_for_json("headline"), Some("title"));
    // readonly drops the column from UPDATE, ignore drops it entirely.
    assert_eq!(schema.update_columns(), &["title"]);
    assert_eq!(schema.columns(), &["article_id", "title", "created_by"]);
}

#[test]
fn ignored_fields_default_when_scanning() {
    let row = Row::new(
        vec![
            "article_id".to_string(),
            "title".to_string(),
            "created_by".to_string(),
        ],
        vec![
            Value::Int(5),
            Value::Text("hello".into()),
            Value::Text("jo".into()),
        ],
    );
    let article = Article::from_row(&row).unwrap();
    assert_eq!(article.id, 5);
    assert!(!article.dirty);
}

#[test]
fn derived_model_drives_the_statement_builders() {
    let schema = schema_of::<Account>().unwrap();
    let account = Account::default();

    let insert = stmt::build_insert(
        Dialect::Postgres.placeholder(),
        Account::TABLE,
        schema,
        &account,
    )
    .unwrap();
    assert_eq!(
        insert.query,
        "INSERT INTO accounts (id, name, active, version) VALUES ($1, $2, $3, $4)"
    );
    assert_eq!(insert.values[2], Value::Text("Y".into()));

    let versioned = Account {
        version: 3,
        ..Account::default()
    };
    let update = stmt::build_update(
        Dialect::Postgres.placeholder(),
        Account::TABLE,
        schema,
        &versioned,
    )
    .unwrap();
    assert_eq!(
        update.query,
        "UPDATE accounts SET name = $1, active = $2, version = $3 \
         WHERE id = $4 AND version = $5"
    );
    assert_eq!(update.values[2], Value::Int(4));
    assert_eq!(update.values[4], Value::Int(3));
}
