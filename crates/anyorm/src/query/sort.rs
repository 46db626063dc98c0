//! Sort expressions and runtime column-name resolution.
//!
//! A sort expression is a comma-separated token list; each token names a
//! field or column, optionally prefixed with `-` for descending or `+` for
//! ascending. Tokens resolve through the filter's declared overrides, then
//! the schema's JSON-name and column maps, then a snake_case fallback.
//! Tokens that resolve nowhere and do not look like a bare identifier are
//! dropped: sort arrives as user input and must never smuggle raw SQL into
//! ORDER BY.

use heck::ToSnakeCase;

use crate::schema::Schema;

/// Render an ORDER BY fragment (without the keyword) from a sort expression.
pub(crate) fn order_by(
    schema: &Schema,
    overrides: &[(&'static str, &'static str)],
    expr: &str,
) -> String {
    let mut out = String::new();
    for token in expr.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (name, descending) = match token.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (token.strip_prefix('+').unwrap_or(token), false),
        };
        let Some(column) = resolve_name(schema, overrides, name.trim()) else {
            continue;
        };
        if !out.is_empty() {
            out.push_str(", ");
        }
        out.push_str(&column);
        if descending {
            out.push_str(" DESC");
        }
    }
    out
}

/// Resolve a runtime name to a column: overrides, then the schema's JSON
/// and column maps, then snake_case for bare identifiers.
pub(crate) fn resolve_name(
    schema: &Schema,
    overrides: &[(&'static str, &'static str)],
    name: &str,
) -> Option<String> {
    if let Some((_, column)) = overrides.iter().find(|(field, _)| *field == name) {
        return Some((*column).to_owned());
    }
    if let Some(column) = schema.column_for_json(name) {
        return Some(column.to_owned());
    }
    if let Some(def) = schema.field(name) {
        return Some(def.column.to_owned());
    }
    if is_safe_ident(name) {
        return Some(name.to_snake_case());
    }
    None
}

// Bare-identifier shape: a letter or underscore, then letters, digits,
// underscores, or `$`.
fn is_safe_ident(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c == '$' || c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::fixtures::user_schema;

    #[test]
    fn tokens_resolve_in_declaration_order() {
        assert_eq!(order_by(user_schema(), &[], "-version,name"), "version DESC, name");
    }

    #[test]
    fn plus_prefix_reads_ascending() {
        assert_eq!(order_by(user_schema(), &[], "+name"), "name");
    }

    #[test]
    fn overrides_win_over_schema_names() {
        let overrides = [("recent", "created_at")];
        assert_eq!(order_by(user_schema(), &overrides, "-recent"), "created_at DESC");
    }

    #[test]
    fn unknown_plain_tokens_snake_case() {
        assert_eq!(order_by(user_schema(), &[], "createdAt"), "created_at");
    }

    #[test]
    fn hostile_tokens_are_dropped() {
        assert_eq!(order_by(user_schema(), &[], "name; drop table users--"), "");
        assert_eq!(order_by(user_schema(), &[], "bad token,-version"), "version DESC");
        assert_eq!(order_by(user_schema(), &[], "1; select"), "");
    }

    #[test]
    fn blank_tokens_are_skipped() {
        assert_eq!(order_by(user_schema(), &[], "name,,"), "name");
        assert_eq!(order_by(user_schema(), &[], ""), "");
    }

    #[test]
    fn safe_ident_shape() {
        assert!(is_safe_ident("created_at"));
        assert!(is_safe_ident("_hidden"));
        assert!(is_safe_ident("col$1"));
        assert!(!is_safe_ident("1col"));
        assert!(!is_safe_ident("a b"));
        assert!(!is_safe_ident("a;b"));
        assert!(!is_safe_ident(""));
    }
}
