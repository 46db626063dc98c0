//! Conditional SQL templates merged against a data map.
//!
//! A [`Template`] is a parsed, immutable tree of conditional nodes. At
//! request time [`merge`] (or [`build`]) evaluates each node's test against
//! a `serde_json` data map, renders the included nodes, and binds `#{name}`
//! placeholders in dialect form, producing the same [`Statement`] contract
//! as the schema-driven builders. Templates come from markup via
//! [`TemplateSet::parse`] or are assembled in code from [`TemplateNode`]s.
//!
//! # Example
//!
//! ```ignore
//! let templates = TemplateSet::parse(source)?;
//! let data = serde_json::json!({ "name": "jo%" });
//! let stmt = template::build(
//!     &data,
//!     templates.get("find_users").unwrap(),
//!     dialect.placeholder(),
//! )?;
//! let rows = executor.query(&stmt.query, &stmt.values).await?;
//! ```
//!
//! [`Statement`]: crate::statement::Statement

mod merge;
mod node;
mod parse;

pub use merge::{build, merge};
pub use node::{Segment, Template, TemplateKind, TemplateNode, Test};
pub use parse::TemplateSet;
