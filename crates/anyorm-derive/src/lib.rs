//! Derive macros for anyorm
//!
//! Provides `#[derive(Model)]` and `#[derive(Filter)]` macros.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod filter;
mod model;

/// Derive `Model` metadata for a struct mapped to one table.
///
/// # Example
///
/// ```ignore
/// use anyorm::Model;
///
/// #[derive(Model)]
/// #[orm(table = "users")]
/// struct User {
///     #[orm(key)]
///     id: String,
///     name: String,
///     #[orm(bools("Y", "N"))]
///     active: bool,
///     note: Option<String>,
///     #[orm(version)]
///     version: i32,
/// }
/// ```
///
/// # Generated
///
/// - `TABLE: &'static str` - Table name
/// - `fn fields()` - Static field descriptor table, declaration order
/// - `fn value(index)` - Field value by position; unset `Option` fields read
///   as absent
/// - `fn key()` - Primary-key value(s) of an instance
/// - `fn from_row(row)` - Scan a result row by column name
///
/// # Attributes
///
/// - `#[orm(table = "name")]` - Specify table name (required)
/// - `#[orm(key)]` - Mark field as (part of) the primary key
/// - `#[orm(version)]` - Mark the optimistic-concurrency version field
///   (plain integer type required)
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `#[orm(json = "name")]` - JSON field name for PATCH input translation
/// - `#[orm(bools("true", "false"))]` - Persist a bool under sentinel
///   literals
/// - `#[orm(readonly)]` - Exclude the column from UPDATE SET lists
/// - `#[orm(ignore)]` - Field is not persisted at all; scanning initializes
///   it with `Default::default()`
#[proc_macro_derive(Model, attributes(orm))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

/// Derive `Filter` for a struct whose populated fields become WHERE
/// predicates.
///
/// # Example
///
/// ```ignore
/// use anyorm::{Filter, SearchQuery};
///
/// #[derive(Filter, Default)]
/// #[orm(model = User)]
/// struct UserFilter {
///     #[orm(matches = "prefix", keyword)]
///     name: Option<String>,
///     ids: Vec<String>,
///     search: SearchQuery,
/// }
/// ```
///
/// # Generated
///
/// - `type Model` - The model whose schema resolves columns
/// - `fn conditions()` - One predicate per populated field, declaration
///   order
/// - `fn keyword_fields()` - Fields tagged `keyword`, with their match modes
/// - `fn overrides()` - Declared `column` overrides
/// - `fn search()` - Accessor for the `SearchQuery` meta field, when present
///
/// # Attributes
///
/// - `#[orm(model = ModelType)]` - The filtered model (required)
/// - `#[orm(matches = "exact" | "prefix" | "suffix" | "contains")]` - Text
///   match shaping (default contains)
/// - `#[orm(keyword)]` - Include the field in free-text keyword search
/// - `#[orm(column = "name")]` - Column override for this field
/// - `#[orm(search)]` - Mark the search meta field explicitly (a field of
///   type `SearchQuery` is picked up without it)
/// - `#[orm(skip)]` - Field contributes no predicate
#[proc_macro_derive(Filter, attributes(orm))]
pub fn derive_filter(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    filter::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
