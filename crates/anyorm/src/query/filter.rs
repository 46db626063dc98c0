//! Filter field shapes and the [`Filter`] trait.
//!
//! A filter is a caller-defined struct whose populated fields become WHERE
//! predicates. Each field kind maps to one predicate shape through
//! [`FilterField`]; unset options, empty strings, empty slices, and empty
//! ranges contribute nothing. The optional [`SearchQuery`] meta field adds
//! free-text keyword search, a projection, a sort expression, exclusion
//! sets, and paging inputs.
//!
//! # Example
//!
//! ```ignore
//! use anyorm::{Filter, SearchQuery, query::DateRange};
//!
//! #[derive(Filter, Default)]
//! #[orm(model = User)]
//! struct UserFilter {
//!     #[orm(matches = "prefix", keyword)]
//!     name: Option<String>,
//!     ids: Vec<String>,
//!     created: Option<DateRange>,
//!     search: SearchQuery,
//! }
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::Model;
use crate::value::Value;

// ==================== Match modes ====================

/// LIKE/ILIKE pattern shaping for text predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Match {
    /// Plain equality, no pattern.
    Exact,
    /// `value%`
    Prefix,
    /// `%value`
    Suffix,
    /// `%value%`
    #[default]
    Contains,
}

impl Match {
    /// Shape a raw value into the pattern this mode matches.
    ///
    /// `Exact` passes the value through; its predicates render as `=`.
    #[must_use]
    pub fn pattern(self, value: &str) -> String {
        match self {
            Self::Exact => value.to_owned(),
            Self::Prefix => format!("{value}%"),
            Self::Suffix => format!("%{value}"),
            Self::Contains => format!("%{value}%"),
        }
    }
}

// ==================== Predicates ====================

/// The predicate shapes a filter field can contribute.
///
/// Shapes carry values, not columns; the builder resolves each owning
/// field's column and renders placeholders once the dialect is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = value`
    Eq(Value),
    /// `column like pattern` (`ilike` on PostgreSQL), shaped by `mode`.
    Text { value: String, mode: Match },
    /// `column IN (…)`, one placeholder per element.
    In(Vec<Value>),
    /// `column NOT IN (…)`.
    NotIn(Vec<Value>),
    /// Half-open timestamp range: `column >= start AND column < end`.
    Span {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    /// Numeric bounds, at most one predicate per side; `min`/`max` compare
    /// inclusively, `lower`/`upper` exclusively.
    Bounds {
        min: Option<Value>,
        lower: Option<Value>,
        max: Option<Value>,
        upper: Option<Value>,
    },
}

/// One predicate tied to the filter field that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Declared filter field name; resolved to a column at build time.
    pub field: &'static str,
    /// Column override from the field's attribute, if any.
    pub column: Option<&'static str>,
    pub predicate: Predicate,
}

impl Condition {
    pub fn new(field: &'static str, column: Option<&'static str>, predicate: Predicate) -> Self {
        Self {
            field,
            column,
            predicate,
        }
    }
}

/// A filter field tagged into free-text keyword search.
#[derive(Debug, Clone, Copy)]
pub struct KeywordField {
    pub field: &'static str,
    pub column: Option<&'static str>,
    /// The field's own match shaping, applied to the keyword.
    pub mode: Match,
}

// ==================== Range inputs ====================

/// An inclusive day range over a timestamp column.
///
/// Contributes `column >= start` and `column < end + 1 day`: the final day
/// stays fully included without comparing `<=` against a truncated end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }
}

/// Numeric bounds for a column; any subset of the four may be set.
///
/// `min`/`max` compare inclusively (`>=`/`<=`), `lower`/`upper` exclusively
/// (`>`/`<`). When both variants of one side are set, the inclusive bound
/// wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberRange<T> {
    pub min: Option<T>,
    pub lower: Option<T>,
    pub max: Option<T>,
    pub upper: Option<T>,
}

impl<T> Default for NumberRange<T> {
    fn default() -> Self {
        Self {
            min: None,
            lower: None,
            max: None,
            upper: None,
        }
    }
}

impl<T> NumberRange<T> {
    /// `min <= column <= max`
    pub fn between(min: T, max: T) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            ..Self::default()
        }
    }

    /// `column >= min`
    pub fn at_least(min: T) -> Self {
        Self {
            min: Some(min),
            ..Self::default()
        }
    }

    /// `column > lower`
    pub fn above(lower: T) -> Self {
        Self {
            lower: Some(lower),
            ..Self::default()
        }
    }

    /// `column <= max`
    pub fn at_most(max: T) -> Self {
        Self {
            max: Some(max),
            ..Self::default()
        }
    }

    /// `column < upper`
    pub fn below(upper: T) -> Self {
        Self {
            upper: Some(upper),
            ..Self::default()
        }
    }

    /// True when no bound is set; empty ranges contribute no predicate.
    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.lower.is_none() && self.max.is_none() && self.upper.is_none()
    }
}

// ==================== Field kinds ====================

/// Maps a filter field's value to its predicate, or `None` to skip.
pub trait FilterField {
    fn predicate(&self, mode: Match) -> Option<Predicate>;
}

impl FilterField for str {
    fn predicate(&self, mode: Match) -> Option<Predicate> {
        if self.is_empty() {
            return None;
        }
        Some(match mode {
            Match::Exact => Predicate::Eq(Value::Text(self.to_owned())),
            shaped => Predicate::Text {
                value: self.to_owned(),
                mode: shaped,
            },
        })
    }
}

impl FilterField for String {
    fn predicate(&self, mode: Match) -> Option<Predicate> {
        self.as_str().predicate(mode)
    }
}

impl<T: FilterField + ?Sized> FilterField for &T {
    fn predicate(&self, mode: Match) -> Option<Predicate> {
        (**self).predicate(mode)
    }
}

impl<T: FilterField> FilterField for Option<T> {
    fn predicate(&self, mode: Match) -> Option<Predicate> {
        self.as_ref().and_then(|value| value.predicate(mode))
    }
}

impl<T> FilterField for [T]
where
    T: Clone + Into<Value>,
{
    fn predicate(&self, _mode: Match) -> Option<Predicate> {
        if self.is_empty() {
            return None;
        }
        Some(Predicate::In(
            self.iter().cloned().map(Into::into).collect(),
        ))
    }
}

impl<T> FilterField for Vec<T>
where
    T: Clone + Into<Value>,
{
    fn predicate(&self, mode: Match) -> Option<Predicate> {
        self.as_slice().predicate(mode)
    }
}

macro_rules! equality_filter_fields {
    ($($kind:ty),* $(,)?) => {
        $(
            impl FilterField for $kind {
                fn predicate(&self, _mode: Match) -> Option<Predicate> {
                    Some(Predicate::Eq((*self).into()))
                }
            }
        )*
    };
}

equality_filter_fields!(bool, i16, i32, i64, u32, f32, f64, DateTime<Utc>, Uuid);

#[cfg(feature = "rust_decimal")]
equality_filter_fields!(rust_decimal::Decimal);

impl FilterField for DateRange {
    fn predicate(&self, _mode: Match) -> Option<Predicate> {
        Some(Predicate::Span {
            start: self.start,
            end: self.end + Duration::days(1),
        })
    }
}

impl<T> FilterField for NumberRange<T>
where
    T: Clone + Into<Value>,
{
    fn predicate(&self, _mode: Match) -> Option<Predicate> {
        if self.is_empty() {
            return None;
        }
        Some(Predicate::Bounds {
            min: self.min.clone().map(Into::into),
            lower: self.lower.clone().map(Into::into),
            max: self.max.clone().map(Into::into),
            upper: self.upper.clone().map(Into::into),
        })
    }
}

// ==================== Search meta ====================

/// Search meta carried on a filter alongside its predicate fields.
///
/// Decodes straight from the JSON bodies a transport layer hands over;
/// every part is optional and absent parts change nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    /// Free-text keyword, matched against every keyword-tagged field.
    pub q: Option<String>,
    /// Projection: field names to select instead of the full column list.
    pub fields: Vec<String>,
    /// Sort expression: comma-separated tokens, `-` prefix for descending.
    pub sort: Option<String>,
    /// Per-column exclusion sets, rendered as `NOT IN`.
    pub excluding: BTreeMap<String, Vec<serde_json::Value>>,
    /// 1-based page number; 0 reads as 1.
    pub page: u64,
    /// Page size; 0 disables paging.
    pub limit: u64,
    /// Distinct size for the first page, when it differs.
    pub first_limit: Option<u64>,
}

impl SearchQuery {
    /// The keyword, when present and non-empty.
    pub fn keyword(&self) -> Option<&str> {
        self.q.as_deref().filter(|q| !q.is_empty())
    }

    /// The sort expression, when present and non-empty.
    pub fn sort_expr(&self) -> Option<&str> {
        self.sort.as_deref().filter(|s| !s.is_empty())
    }
}

// ==================== Filter trait ====================

/// A struct whose populated fields translate into WHERE predicates.
///
/// Usually derived with `#[derive(Filter)]`; the derive walks fields in
/// declaration order and the generated conditions keep that order.
pub trait Filter {
    /// The model whose schema resolves this filter's columns.
    type Model: Model;

    /// Conditions contributed by the populated fields.
    fn conditions(&self) -> Vec<Condition>;

    /// Fields participating in free-text keyword search.
    fn keyword_fields() -> &'static [KeywordField]
    where
        Self: Sized,
    {
        &[]
    }

    /// Declared per-field column overrides, consulted when sort tokens and
    /// exclusion keys are resolved.
    fn overrides() -> &'static [(&'static str, &'static str)]
    where
        Self: Sized,
    {
        &[]
    }

    /// The search meta, when the filter carries one.
    fn search(&self) -> Option<&SearchQuery> {
        None
    }
}
