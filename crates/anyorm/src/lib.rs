//! # anyorm
//!
//! A schema-driven, multi-dialect SQL data mapper for Rust.
//!
//! ## Features
//!
//! - **Schema-driven**: `#[derive(Model)]` gives a struct a static field
//!   table; every statement is rendered from it, never from reflection at
//!   query time
//! - **Multi-dialect**: one builder family renders for Postgres, MySQL,
//!   SQL Server, Oracle, and SQLite through per-dialect placeholder
//!   strategies
//! - **Optimistic versioning**: versioned models get guarded UPDATEs with
//!   an exactly-plus-one bump, and zero-row writes are classified as
//!   not-found or stale
//! - **Dynamic filters**: `#[derive(Filter)]` turns populated struct fields
//!   into WHERE predicates, with keyword search, sorting, and paging meta
//! - **Paging with totals**: LIMIT/OFFSET or OFFSET..FETCH clauses plus
//!   `COUNT(*)` query rewriting, single round trip on Oracle
//! - **SQL templates**: named statements with conditional fragments, merged
//!   against JSON data
//! - **Transaction-friendly**: pass a transaction anywhere an [`Executor`]
//!   is expected
//! - **Remote execution**: the same operations run over a serialized proxy
//!   transport for databases without a local driver
//!
//! ## Example
//!
//! ```ignore
//! use anyorm::{Model, Repository};
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
//! let repo = Repository::<User>::new();
//! repo.insert_with_version(&client, &user).await?;
//! if let Some(mut found) = repo.load(&client, "u1").await? {
//!     found.name = "renamed".into();
//!     repo.update(&client, &found).await?;
//! }
//! ```

pub mod batch;
pub mod client;
pub mod dialect;
pub mod error;
pub mod model;
pub mod page;
pub mod proxy;
pub mod query;
pub mod repository;
pub mod row;
pub mod schema;
pub mod statement;
pub mod stmt;
pub mod template;
pub mod value;

pub use batch::{BatchInserter, BatchReport, StreamWriter};
pub use client::{Connection, Executor, TimedExecutor, Tx};
pub use dialect::{Dialect, Placeholder};
pub use error::{OrmError, OrmResult};
pub use model::{Key, Model};
pub use page::SearchResult;
pub use proxy::{
    ProxyAction, ProxyExecutor, ProxyRequest, ProxyResponse, ProxyTransaction, ProxyTransport,
};
pub use query::{
    Condition, DateRange, DynamicQuery, Filter, FilterField, KeywordField, Match, NumberRange,
    Predicate, SearchQuery, build_query, build_select,
};
pub use repository::Repository;
pub use row::{FromValue, Row};
pub use schema::{FieldDef, Schema, schema_of};
pub use statement::{Statement, WireStatement};
pub use stmt::{
    build_delete, build_insert, build_insert_batch, build_insert_with_version, build_patch,
    build_save, build_update, handle_duplicate, is_duplicate_key,
};
pub use template::{Template, TemplateKind, TemplateSet};
pub use value::Value;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with, create_pool_with_tls};

#[cfg(feature = "derive")]
pub use anyorm_derive::{Filter, Model};
