//! Dynamic WHERE/ORDER BY building from filter structs.
//!
//! A filter is a caller-defined struct whose populated fields become SQL
//! predicates: strings match with LIKE/ILIKE shaping, slices become IN
//! lists, ranges become bound pairs, everything else compares for equality.
//! Unset fields contribute nothing. The whole clause is a flat `AND`
//! conjunction; OR groups are deliberately out of scope.
//!
//! # Example
//!
//! ```ignore
//! use anyorm::{Dialect, query::build_query};
//!
//! let q = build_query(Dialect::Postgres, &filter)?;
//! assert_eq!(q.where_clause, "name ilike $1");
//! ```

mod build;
mod filter;
mod sort;

pub use build::{DynamicQuery, build_query, build_select};
pub use filter::{
    Condition, DateRange, Filter, FilterField, KeywordField, Match, NumberRange, Predicate,
    SearchQuery,
};
