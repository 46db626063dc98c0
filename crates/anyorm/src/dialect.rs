//! SQL dialects and their positional-placeholder strategies.
//!
//! Every statement builder in this crate renders against a [`Dialect`], and
//! every dialect resolves to one [`Placeholder`] strategy that maps a 1-based
//! parameter index to the token the driver expects. The strategy is resolved
//! once per database handle and reused for every statement built against it.
//!
//! # Example
//!
//! ```ignore
//! use anyorm::{Dialect, Placeholder};
//!
//! assert_eq!(Dialect::Postgres.placeholder().token(3), "$3");
//! assert_eq!(Dialect::Mysql.placeholder().token(3), "?");
//! assert_eq!(Placeholder::ColonVal.token(3), ":val3");
//! ```

use std::fmt;

/// The SQL product families this crate renders statements for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    Postgres,
    Mysql,
    Mssql,
    Oracle,
    Sqlite,
}

impl Dialect {
    /// Resolve a dialect from a driver/connection name.
    ///
    /// Returns `None` for names this crate does not recognize; callers that
    /// only need placeholders should use [`Placeholder::for_driver`], which
    /// keeps the generic `?` fallback.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pgx" => Some(Self::Postgres),
            "mysql" | "mariadb" => Some(Self::Mysql),
            "mssql" | "sqlserver" => Some(Self::Mssql),
            "oracle" | "godror" | "ora" => Some(Self::Oracle),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// The placeholder strategy this dialect's drivers expect.
    ///
    /// Oracle defaults to the `:N` convention; integrations whose driver
    /// binds `:valN` names pick [`Placeholder::ColonVal`] explicitly.
    pub fn placeholder(self) -> Placeholder {
        match self {
            Self::Postgres => Placeholder::Dollar,
            Self::Mysql | Self::Sqlite => Placeholder::Question,
            Self::Mssql => Placeholder::AtP,
            Self::Oracle => Placeholder::Colon,
        }
    }

    /// Whether string matching should render as `ILIKE` instead of `LIKE`.
    pub fn case_insensitive_like(self) -> bool {
        matches!(self, Self::Postgres)
    }

    /// Dialect name as it appears in driver configuration.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Mssql => "mssql",
            Self::Oracle => "oracle",
            Self::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A positional-placeholder strategy: 1-based parameter index to token.
///
/// Two Oracle conventions exist in the wild (`:N` and `:valN`); both are kept
/// as named strategies rather than unified, so an integration can match the
/// binding style its Oracle client library actually accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `?` for every parameter (MySQL, SQLite, generic drivers).
    Question,
    /// `$1`, `$2`, ... (PostgreSQL).
    Dollar,
    /// `:1`, `:2`, ... (Oracle positional).
    Colon,
    /// `:val1`, `:val2`, ... (Oracle named-value convention).
    ColonVal,
    /// `@p1`, `@p2`, ... (SQL Server).
    AtP,
}

impl Placeholder {
    /// Resolve a strategy from a driver name, falling back to `?` for
    /// drivers this crate does not recognize.
    pub fn for_driver(name: &str) -> Self {
        Dialect::from_name(name).map_or(Self::Question, Dialect::placeholder)
    }

    /// Whether this strategy numbers its placeholders.
    ///
    /// Numbering strategies may legally repeat a token to reuse a bound
    /// value; `?` strategies must bind a fresh value per token.
    pub fn numbered(self) -> bool {
        !matches!(self, Self::Question)
    }

    /// Render the token for the given 1-based index.
    pub fn token(self, index: usize) -> String {
        let mut out = String::with_capacity(6);
        self.write(&mut out, index);
        out
    }

    /// Append the token for the given 1-based index to `out`.
    pub fn write(self, out: &mut String, index: usize) {
        match self {
            Self::Question => out.push('?'),
            Self::Dollar => {
                out.push('$');
                push_usize(out, index);
            }
            Self::Colon => {
                out.push(':');
                push_usize(out, index);
            }
            Self::ColonVal => {
                out.push_str(":val");
                push_usize(out, index);
            }
            Self::AtP => {
                out.push_str("@p");
                push_usize(out, index);
            }
        }
    }
}

// Write a usize as decimal digits into `out` without going through fmt.
#[inline]
pub(crate) fn push_usize(out: &mut String, mut n: usize) {
    if n < 10 {
        out.push((b'0' + n as u8) as char);
        return;
    }
    // Stack buffer for up to 20 digits (u64::MAX).
    let mut buf = [0u8; 20];
    let mut pos = buf.len();
    while n > 0 {
        pos -= 1;
        buf[pos] = b'0' + (n % 10) as u8;
        n /= 10;
    }
    // SAFETY: buf[pos..] only contains ASCII digits.
    out.push_str(unsafe { std::str::from_utf8_unchecked(&buf[pos..]) });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_tokens_per_dialect() {
        assert_eq!(Dialect::Postgres.placeholder().token(1), "$1");
        assert_eq!(Dialect::Mysql.placeholder().token(1), "?");
        assert_eq!(Dialect::Sqlite.placeholder().token(7), "?");
        assert_eq!(Dialect::Mssql.placeholder().token(2), "@p2");
        assert_eq!(Dialect::Oracle.placeholder().token(4), ":4");
        assert_eq!(Placeholder::ColonVal.token(4), ":val4");
    }

    #[test]
    fn unknown_driver_falls_back_to_question() {
        assert_eq!(Placeholder::for_driver("duckdb"), Placeholder::Question);
        assert_eq!(Placeholder::for_driver("postgres"), Placeholder::Dollar);
        assert_eq!(Placeholder::for_driver("SQLServer"), Placeholder::AtP);
    }

    #[test]
    fn numbered_strategies() {
        assert!(Placeholder::Dollar.numbered());
        assert!(Placeholder::Colon.numbered());
        assert!(Placeholder::ColonVal.numbered());
        assert!(Placeholder::AtP.numbered());
        assert!(!Placeholder::Question.numbered());
    }

    #[test]
    fn multi_digit_indices() {
        assert_eq!(Placeholder::Dollar.token(12), "$12");
        assert_eq!(Placeholder::Dollar.token(105), "$105");
        assert_eq!(Placeholder::AtP.token(40), "@p40");
    }

    #[test]
    fn dialect_from_name() {
        assert_eq!(Dialect::from_name("PostgreSQL"), Some(Dialect::Postgres));
        assert_eq!(Dialect::from_name("mariadb"), Some(Dialect::Mysql));
        assert_eq!(Dialect::from_name("oracle"), Some(Dialect::Oracle));
        assert_eq!(Dialect::from_name("cockroach"), None);
    }
}
