//! Paging clauses, count-query rewriting, and page arithmetic.
//!
//! [`paginate`] appends the dialect's paging clause to a finished SELECT.
//! [`build_count_query`] rewrites a SELECT into its row-count twin by
//! locating the top-level `SELECT … FROM` span textually: the projection is
//! swapped for `COUNT(*)` and anything from `ORDER BY` on is dropped.
//! `DISTINCT` projections are wrapped in a subquery instead, since swapping
//! them would count the wrong thing. Oracle avoids the second round trip
//! entirely: [`with_inline_total`] injects a `COUNT(*) OVER()` window column
//! into the paged query itself.
//!
//! # Example
//!
//! ```ignore
//! use anyorm::{Dialect, page};
//!
//! let paged = page::paginate("SELECT id FROM users", Dialect::Postgres, 3, 10, None);
//! assert_eq!(paged, "SELECT id FROM users LIMIT 10 OFFSET 20");
//! ```

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;

/// A page of results with the filter's total row count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult<T> {
    pub list: Vec<T>,
    pub total: u64,
}

impl<T> SearchResult<T> {
    pub fn new(list: Vec<T>, total: u64) -> Self {
        Self { list, total }
    }

    /// An empty page with a zero total.
    pub fn empty() -> Self {
        Self {
            list: Vec::new(),
            total: 0,
        }
    }
}

/// Append the dialect's paging clause for the given page window.
///
/// `page` is 1-based (0 reads as 1). A zero `limit` without a first-page
/// size leaves the query unpaged. With `first_limit` set, page 1 spans
/// `first_limit` rows and page `n >= 2` starts at `limit*(n-2) + first_limit`.
#[must_use]
pub fn paginate(
    query: &str,
    dialect: Dialect,
    page: u64,
    limit: u64,
    first_limit: Option<u64>,
) -> String {
    if limit == 0 && first_limit.is_none() {
        return query.to_owned();
    }
    let (offset, take) = page_window(page, limit, first_limit);
    match dialect {
        Dialect::Oracle => {
            format!("{query} OFFSET {offset} ROWS FETCH NEXT {take} ROWS ONLY")
        }
        _ => format!("{query} LIMIT {take} OFFSET {offset}"),
    }
}

/// The `(offset, limit)` window for a 1-based page.
#[must_use]
pub fn page_window(page: u64, limit: u64, first_limit: Option<u64>) -> (u64, u64) {
    let page = page.max(1);
    match first_limit {
        Some(first) if page == 1 => (0, first),
        Some(first) => (limit * (page - 2) + first, limit),
        None => (limit * (page - 1), limit),
    }
}

/// Number of pages `total` rows span under the same window rules.
#[must_use]
pub fn page_count(total: u64, limit: u64, first_limit: Option<u64>) -> u64 {
    if total == 0 {
        return 0;
    }
    match first_limit {
        Some(first) => {
            if total <= first || limit == 0 {
                1
            } else {
                1 + (total - first).div_ceil(limit)
            }
        }
        None => {
            if limit == 0 {
                1
            } else {
                total.div_ceil(limit)
            }
        }
    }
}

/// Whether `page` is the final page for `total` rows.
#[must_use]
pub fn is_last_page(total: u64, page: u64, limit: u64, first_limit: Option<u64>) -> bool {
    page.max(1) >= page_count(total, limit, first_limit)
}

/// Rewrite a SELECT into its `COUNT(*)` twin.
///
/// The rewrite drops any top-level `ORDER BY` first. `DISTINCT` queries are
/// wrapped as `SELECT COUNT(*) FROM (…) AS main`; so is anything whose
/// `FROM` cannot be located.
#[must_use]
pub fn build_count_query(query: &str) -> String {
    let base = strip_order_by(query.trim());
    if is_distinct(base) {
        return format!("SELECT COUNT(*) FROM ({base}) AS main");
    }
    match find_keyword(base, "from", 0) {
        Some(pos) => format!("SELECT COUNT(*) {}", &base[pos..]),
        None => format!("SELECT COUNT(*) FROM ({base}) AS main"),
    }
}

/// Inject `COUNT(*) OVER() AS total` right after `SELECT` (or
/// `SELECT DISTINCT`), so Oracle pages carry their total inline.
///
/// Queries that do not start with `SELECT` come back unchanged.
#[must_use]
pub fn with_inline_total(query: &str) -> String {
    let trimmed = query.trim();
    let Some(rest) = strip_word(trimmed, "select") else {
        return trimmed.to_owned();
    };
    match strip_word(rest, "distinct") {
        Some(projection) => {
            format!("SELECT DISTINCT COUNT(*) OVER() AS total, {projection}")
        }
        None => format!("SELECT COUNT(*) OVER() AS total, {rest}"),
    }
}

/// Truncate the query before its top-level `ORDER BY`, if it has one.
fn strip_order_by(query: &str) -> &str {
    let mut from = 0;
    while let Some(pos) = find_keyword(query, "order", from) {
        let tail = &query[pos + "order".len()..];
        let after = tail.trim_start();
        if after.len() < tail.len()
            && after.len() >= 2
            && after.as_bytes()[..2].eq_ignore_ascii_case(b"by")
            && !after.as_bytes().get(2).copied().is_some_and(is_ident_byte)
        {
            return query[..pos].trim_end();
        }
        from = pos + 1;
    }
    query
}

fn is_distinct(query: &str) -> bool {
    strip_word(query, "select").is_some_and(|rest| strip_word(rest, "distinct").is_some())
}

/// Strip a leading case-insensitive word and the whitespace after it.
fn strip_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let text = text.trim_start();
    if text.len() >= word.len() && text[..word.len()].eq_ignore_ascii_case(word) {
        let rest = &text[word.len()..];
        if rest.is_empty() || rest.starts_with(|c: char| c.is_whitespace()) {
            return Some(rest.trim_start());
        }
    }
    None
}

/// First top-level, word-bounded, case-insensitive occurrence of `word`,
/// skipping string literals, quoted identifiers, and parenthesized
/// subqueries.
fn find_keyword(query: &str, word: &str, start: usize) -> Option<usize> {
    let bytes = query.as_bytes();
    let needle = word.as_bytes();
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            // '...' literal; '' is the escaped quote.
            b'\'' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        if bytes.get(i + 1) == Some(&b'\'') {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
            }
            // "..." quoted identifier.
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    i += 1;
                }
            }
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            _ => {
                if depth == 0
                    && i + needle.len() <= bytes.len()
                    && bytes[i..i + needle.len()].eq_ignore_ascii_case(needle)
                    && (i == 0 || !is_ident_byte(bytes[i - 1]))
                    && bytes
                        .get(i + needle.len())
                        .copied()
                        .is_none_or(|b| !is_ident_byte(b))
                {
                    return Some(i);
                }
            }
        }
        i += 1;
    }
    None
}

fn is_ident_byte(b: u8) -> bool {
    b == b'_' || b == b'$' || b.is_ascii_alphanumeric()
}
