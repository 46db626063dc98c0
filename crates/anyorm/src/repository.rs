//! Typed table operations over any [`Executor`].
//!
//! [`Repository<T>`] turns a [`Model`] into the everyday operations: load
//! by key, existence probe, full scan, the write family (insert, versioned
//! insert, upsert, update, patch, delete), and filtered search with paging.
//! Statements come from [`crate::stmt`] and [`crate::query`]; the
//! repository renders them for the executor's dialect, runs them, and scans
//! the results.
//!
//! The repository holds no connection. Every method borrows the executor,
//! so one handle works against a client, a pooled client, a transaction,
//! or a proxy executor alike.
//!
//! # Example
//!
//! ```ignore
//! use anyorm::Repository;
//!
//! let repo = Repository::<User>::new();
//! if let Some(mut user) = repo.load(&client, "u1").await? {
//!     user.name = "renamed".into();
//!     repo.update(&client, &user).await?;
//! }
//! let page = repo.search(&client, &filter).await?;
//! println!("{} of {}", page.list.len(), page.total);
//! ```

use std::fmt;
use std::marker::PhantomData;

use crate::client::Executor;
use crate::dialect::{Dialect, Placeholder};
use crate::error::{OrmError, OrmResult};
use crate::model::{Key, Model};
use crate::page::{SearchResult, build_count_query, paginate, with_inline_total};
use crate::query::{Filter, build_query};
use crate::row::Row;
use crate::schema::{Schema, schema_of};
use crate::statement::Statement;
use crate::stmt::{
    build_delete, build_insert, build_insert_with_version, build_patch, build_save, build_update,
    current_version, encode_value, handle_duplicate,
};
use crate::value::Value;

/// Typed operations for one model, usable with any executor.
pub struct Repository<T> {
    _model: PhantomData<fn() -> T>,
}

impl<T: Model> Repository<T> {
    /// A repository handle for `T`. Holds no state and costs nothing to
    /// copy around.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _model: PhantomData,
        }
    }

    // ==================== Reads ====================

    /// Load one row by primary key.
    pub async fn load<E: Executor>(
        &self,
        executor: &E,
        key: impl Into<Key>,
    ) -> OrmResult<Option<T>> {
        let schema = schema_of::<T>()?;
        let pairs = key.into().pairs(schema.keys())?;
        let projection = schema.columns().join(", ");
        let stmt = key_select(executor.placeholder(), T::TABLE, schema, &projection, pairs);
        match executor.query_opt(&stmt.query, &stmt.values).await? {
            Some(row) => Ok(Some(T::from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Whether a row with this key exists.
    pub async fn exists<E: Executor>(&self, executor: &E, key: impl Into<Key>) -> OrmResult<bool> {
        let schema = schema_of::<T>()?;
        self.probe(executor, schema, &key.into()).await
    }

    /// Load the whole table, in whatever order the database returns it.
    pub async fn all<E: Executor>(&self, executor: &E) -> OrmResult<Vec<T>> {
        let schema = schema_of::<T>()?;
        let sql = assemble_select(T::TABLE, schema.columns(), "", "");
        scan(executor.query(&sql, &[]).await?)
    }

    /// Run a filter and return the matching page with its total.
    ///
    /// Search always selects the full column list; a projection could not
    /// scan into `T`. Without paging meta (zero limit, no first-page size)
    /// the filter runs as a single unpaged query and the total is the list
    /// length. Paged searches count first and skip the page query when the
    /// count comes back zero; Oracle pages in a single round trip instead,
    /// reading the total from an inline window column.
    pub async fn search<E, F>(&self, executor: &E, filter: &F) -> OrmResult<SearchResult<T>>
    where
        E: Executor,
        F: Filter<Model = T>,
    {
        let schema = schema_of::<T>()?;
        let dialect = executor.dialect();
        let query = build_query(dialect, filter)?;
        let sql = assemble_select(T::TABLE, schema.columns(), &query.where_clause, &query.order_by);

        let (page, limit, first_limit) = match filter.search() {
            Some(meta) => (meta.page, meta.limit, meta.first_limit),
            None => (0, 0, None),
        };
        if limit == 0 && first_limit.is_none() {
            let list = scan(executor.query(&sql, &query.values).await?)?;
            let total = list.len() as u64;
            return Ok(SearchResult::new(list, total));
        }

        if dialect == Dialect::Oracle {
            let paged = paginate(&with_inline_total(&sql), dialect, page, limit, first_limit);
            let rows = executor.query(&paged, &query.values).await?;
            let total = match rows.first() {
                Some(row) => row.try_get::<i64>("total")?.max(0) as u64,
                // A page past the end carries no window column to read.
                None => 0,
            };
            return Ok(SearchResult::new(scan(rows)?, total));
        }

        let count_sql = build_count_query(&sql);
        let counted = executor.query_one(&count_sql, &query.values).await?;
        let total = read_count(&counted)?;
        if total == 0 {
            return Ok(SearchResult::empty());
        }
        let paged = paginate(&sql, dialect, page, limit, first_limit);
        let list = scan(executor.query(&paged, &query.values).await?)?;
        Ok(SearchResult::new(list, total))
    }

    // ==================== Writes ====================

    /// Insert one row; unset `Option` fields are omitted.
    pub async fn insert<E: Executor>(&self, executor: &E, model: &T) -> OrmResult<u64> {
        let schema = schema_of::<T>()?;
        let stmt = build_insert(executor.placeholder(), T::TABLE, schema, model)?;
        executor.execute(&stmt.query, &stmt.values).await
    }

    /// Insert one row, treating a duplicate key as zero rows written.
    pub async fn insert_or_ignore<E: Executor>(&self, executor: &E, model: &T) -> OrmResult<u64> {
        let result = self.insert(executor, model).await;
        handle_duplicate(executor.dialect(), result)
    }

    /// Insert one row with its version column forced to 1.
    pub async fn insert_with_version<E: Executor>(
        &self,
        executor: &E,
        model: &T,
    ) -> OrmResult<u64> {
        let schema = schema_of::<T>()?;
        let stmt = build_insert_with_version(executor.placeholder(), T::TABLE, schema, model)?;
        executor.execute(&stmt.query, &stmt.values).await
    }

    /// Insert-or-update on the key columns, in the dialect's upsert form.
    pub async fn save<E: Executor>(&self, executor: &E, model: &T) -> OrmResult<u64> {
        let schema = schema_of::<T>()?;
        let stmt = build_save(executor.dialect(), T::TABLE, schema, model)?;
        executor.execute(&stmt.query, &stmt.values).await
    }

    /// Update one row over its key columns.
    ///
    /// On a versioned model the statement carries the optimistic guard, so
    /// zero affected rows is ambiguous; the key is re-queried to turn the
    /// miss into [`OrmError::NotFound`] or [`OrmError::StaleVersion`].
    /// Models without a version field return the count as-is.
    pub async fn update<E: Executor>(&self, executor: &E, model: &T) -> OrmResult<u64> {
        let schema = schema_of::<T>()?;
        let stmt = build_update(executor.placeholder(), T::TABLE, schema, model)?;
        let affected = executor.execute(&stmt.query, &stmt.values).await?;
        if affected == 0 && schema.version_column().is_some() {
            let version = current_version(schema, model)?;
            return Err(self
                .version_miss(executor, schema, &model.key(), version)
                .await?);
        }
        Ok(affected)
    }

    /// Apply a sparse change list, key columns included, as a partial
    /// UPDATE.
    ///
    /// When the change list carries the version field the statement is
    /// version-guarded and a zero-row outcome is classified like
    /// [`update`](Self::update); without the version a zero-row outcome is
    /// returned as-is.
    pub async fn patch<E: Executor>(
        &self,
        executor: &E,
        changes: &[(String, Value)],
    ) -> OrmResult<u64> {
        let schema = schema_of::<T>()?;
        let stmt = build_patch(executor.placeholder(), T::TABLE, schema, changes)?;
        let affected = executor.execute(&stmt.query, &stmt.values).await?;
        if affected == 0
            && let Some((key, version)) = patch_guard(schema, changes)
        {
            return Err(self.version_miss(executor, schema, &key, version).await?);
        }
        Ok(affected)
    }

    /// Delete one row by primary key.
    pub async fn delete<E: Executor>(&self, executor: &E, key: impl Into<Key>) -> OrmResult<u64> {
        let schema = schema_of::<T>()?;
        let stmt = build_delete(executor.placeholder(), T::TABLE, schema, &key.into())?;
        executor.execute(&stmt.query, &stmt.values).await
    }

    // ==================== Internals ====================

    async fn probe<E: Executor>(
        &self,
        executor: &E,
        schema: &Schema,
        key: &Key,
    ) -> OrmResult<bool> {
        let pairs = key.pairs(schema.keys())?;
        let stmt = key_select(executor.placeholder(), T::TABLE, schema, "1", pairs);
        Ok(executor.query_opt(&stmt.query, &stmt.values).await?.is_some())
    }

    /// Decide what a zero-row version-guarded write means: the row is gone,
    /// or it moved past the expected version.
    async fn version_miss<E: Executor>(
        &self,
        executor: &E,
        schema: &Schema,
        key: &Key,
        version: i64,
    ) -> OrmResult<OrmError> {
        if self.probe(executor, schema, key).await? {
            Ok(OrmError::stale_version(T::TABLE, key.to_string(), version))
        } else {
            Ok(OrmError::not_found(format!("{} {key} not found", T::TABLE)))
        }
    }
}

impl<T: Model> Default for Repository<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Repository<T> {}

impl<T> fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository").finish()
    }
}

// ==================== Helpers ====================

fn scan<T: Model>(rows: Vec<Row>) -> OrmResult<Vec<T>> {
    rows.iter().map(T::from_row).collect()
}

/// `SELECT {projection} FROM {table} WHERE k1 = $1 AND k2 = $2`.
fn key_select(
    placeholder: Placeholder,
    table: &str,
    schema: &Schema,
    projection: &str,
    pairs: Vec<(&'static str, Value)>,
) -> Statement {
    let mut query = String::with_capacity(32 + projection.len() + pairs.len() * 12);
    query.push_str("SELECT ");
    query.push_str(projection);
    query.push_str(" FROM ");
    query.push_str(table);
    query.push_str(" WHERE ");
    let mut values = Vec::with_capacity(pairs.len());
    for (pos, (column, value)) in pairs.into_iter().enumerate() {
        if pos > 0 {
            query.push_str(" AND ");
        }
        query.push_str(column);
        query.push_str(" = ");
        placeholder.write(&mut query, pos + 1);
        values.push(encode_value(schema, column, value));
    }
    Statement::new(query, values)
}

fn assemble_select(table: &str, columns: &[&'static str], where_clause: &str, order_by: &str) -> String {
    let mut sql = String::with_capacity(
        24 + table.len() + columns.len() * 8 + where_clause.len() + order_by.len(),
    );
    sql.push_str("SELECT ");
    for (pos, column) in columns.iter().enumerate() {
        if pos > 0 {
            sql.push_str(", ");
        }
        sql.push_str(column);
    }
    sql.push_str(" FROM ");
    sql.push_str(table);
    if !where_clause.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(where_clause);
    }
    if !order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);
    }
    sql
}

/// The key and expected version a change list carried, when it carried a
/// version at all.
///
/// Runs only after [`build_patch`] accepted the list, so every name
/// resolves and the key is complete.
fn patch_guard(schema: &Schema, changes: &[(String, Value)]) -> Option<(Key, i64)> {
    let version_column = schema.version_column()?;
    let mut version = None;
    let mut parts = Vec::new();
    for (name, value) in changes {
        let Some(column) = schema
            .column_for_json(name)
            .or_else(|| schema.field(name).map(|field| field.column))
        else {
            continue;
        };
        if schema.is_key(column) {
            parts.push((column.to_owned(), value.clone()));
        } else if column == version_column
            && let Value::Int(current) = value
        {
            version = Some(*current);
        }
    }
    version.map(|current| (Key::Composite(parts), current))
}

/// Read the single COUNT cell, whatever scalar shape the transport gave it.
fn read_count(row: &Row) -> OrmResult<u64> {
    match row.value_at(0) {
        Some(Value::Int(n)) => Ok(u64::try_from(*n).unwrap_or(0)),
        Some(Value::Float(f)) => Ok(*f as u64),
        Some(Value::Text(text)) => text
            .parse()
            .map_err(|_| OrmError::decode("count", format!("'{text}' is not a count"))),
        other => Err(OrmError::decode(
            "count",
            format!("unexpected count cell: {other:?}"),
        )),
    }
}
