//! Per-type column/key/version metadata.
//!
//! A [`Schema`] is built once from a model's field descriptors and drives
//! every statement builder in this crate: which columns to insert, which form
//! the key predicate, which column carries the optimistic-concurrency
//! version, and how JSON field names translate to columns for PATCH input.
//!
//! Schemas are immutable after construction and cached for the process
//! lifetime by [`schema_of`]; building one is deterministic, so a racy first
//! access at worst computes the same value twice.
//!
//! # Example
//!
//! ```ignore
//! use anyorm::{schema_of, Model};
//!
//! #[derive(Model)]
//! #[orm(table = "users")]
//! struct User {
//!     #[orm(key)]
//!     id: String,
//!     name: String,
//!     #[orm(version)]
//!     version: i32,
//! }
//!
//! let schema = schema_of::<User>()?;
//! assert_eq!(schema.keys(), &["id"]);
//! ```

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::error::{OrmError, OrmResult};
use crate::model::Model;

/// Static descriptor for one persisted field, emitted by `#[derive(Model)]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    /// Rust field name.
    pub name: &'static str,
    /// Column name in the table.
    pub column: &'static str,
    /// JSON field name (serde rename or the field name itself).
    pub json: &'static str,
    /// Part of the primary key.
    pub key: bool,
    /// Eligible for UPDATE SET lists. Keys and version columns are excluded
    /// from updates regardless of this flag.
    pub updatable: bool,
    /// Carries the optimistic-concurrency version.
    pub version: bool,
    /// Sentinel literals for booleans persisted as strings: (true, false).
    pub bools: Option<(&'static str, &'static str)>,
}

/// Derived, immutable metadata for one model type.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    fields: &'static [FieldDef],
    columns: Vec<&'static str>,
    keys: Vec<&'static str>,
    update_columns: Vec<&'static str>,
    column_index: HashMap<&'static str, usize>,
    json_index: HashMap<&'static str, &'static str>,
    bool_literals: HashMap<&'static str, (&'static str, &'static str)>,
    version: Option<usize>,
}

impl Schema {
    /// Build a schema from field descriptors in declaration order.
    ///
    /// Fails on programming errors that would corrupt every statement built
    /// from this schema: no columns, no primary key, duplicate column names,
    /// or more than one version field.
    pub fn build(fields: &'static [FieldDef]) -> OrmResult<Self> {
        if fields.is_empty() {
            return Err(OrmError::schema("no mapped columns"));
        }

        let mut columns = Vec::with_capacity(fields.len());
        let mut keys = Vec::new();
        let mut update_columns = Vec::new();
        let mut column_index = HashMap::with_capacity(fields.len());
        let mut json_index = HashMap::with_capacity(fields.len());
        let mut bool_literals = HashMap::new();
        let mut version = None;

        for (idx, field) in fields.iter().enumerate() {
            if column_index.insert(field.column, idx).is_some() {
                return Err(OrmError::schema(format!(
                    "duplicate column '{}'",
                    field.column
                )));
            }
            columns.push(field.column);
            json_index.insert(field.json, field.column);

            if field.key {
                keys.push(field.column);
            }
            if field.version {
                if version.is_some() {
                    return Err(OrmError::schema("more than one version field"));
                }
                version = Some(idx);
            }
            if field.updatable && !field.key && !field.version {
                update_columns.push(field.column);
            }
            if let Some(literals) = field.bools {
                bool_literals.insert(field.column, literals);
            }
        }

        if keys.is_empty() {
            return Err(OrmError::schema("missing primary key"));
        }

        Ok(Self {
            fields,
            columns,
            keys,
            update_columns,
            column_index,
            json_index,
            bool_literals,
            version,
        })
    }

    /// All persisted columns in declaration order.
    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    /// Primary-key columns.
    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }

    /// Columns eligible for INSERT: every persisted column, keys included.
    pub fn insert_columns(&self) -> &[&'static str] {
        &self.columns
    }

    /// Columns eligible for UPDATE SET lists: non-key, updatable, and not
    /// the version column (version is bound separately).
    pub fn update_columns(&self) -> &[&'static str] {
        &self.update_columns
    }

    /// Field descriptors in declaration order.
    pub fn fields(&self) -> &'static [FieldDef] {
        self.fields
    }

    /// Field index for a column name.
    pub fn field_index(&self, column: &str) -> Option<usize> {
        self.column_index.get(column).copied()
    }

    /// Field descriptor for a column name.
    pub fn field(&self, column: &str) -> Option<&'static FieldDef> {
        self.field_index(column).map(|idx| &self.fields[idx])
    }

    /// Translate a JSON field name to its column.
    pub fn column_for_json(&self, json: &str) -> Option<&'static str> {
        self.json_index.get(json).copied()
    }

    /// Whether the column is part of the primary key.
    pub fn is_key(&self, column: &str) -> bool {
        self.keys.contains(&column)
    }

    /// Sentinel literals for a string-encoded boolean column.
    pub fn bool_literals(&self, column: &str) -> Option<(&'static str, &'static str)> {
        self.bool_literals.get(column).copied()
    }

    /// Field index of the version column, if the model has one.
    pub fn version_index(&self) -> Option<usize> {
        self.version
    }

    /// Column name of the version column, if the model has one.
    pub fn version_column(&self) -> Option<&'static str> {
        self.version.map(|idx| self.fields[idx].column)
    }
}

// ==================== Registry ====================

type Registry = RwLock<HashMap<TypeId, &'static Schema>>;

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Schema for a model type, built on first access and cached for the
/// process lifetime.
///
/// Concurrent first calls for the same type may both build; the build is
/// pure and deterministic, so both arrive at the same value and the last
/// insert wins. Subsequent calls are a read-lock map hit.
pub fn schema_of<T: Model>() -> OrmResult<&'static Schema> {
    let registry = REGISTRY.get_or_init(|| RwLock::new(HashMap::new()));
    let type_id = TypeId::of::<T>();

    if let Ok(map) = registry.read()
        && let Some(schema) = map.get(&type_id)
    {
        return Ok(schema);
    }

    // Build outside the write lock; a racing builder produces an identical
    // schema and one of the two leaked copies becomes the cached entry.
    let schema: &'static Schema = Box::leak(Box::new(Schema::build(T::fields())?));
    if let Ok(mut map) = registry.write() {
        return Ok(map.entry(type_id).or_insert(schema));
    }
    Ok(schema)
}
