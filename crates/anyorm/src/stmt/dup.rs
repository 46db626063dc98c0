//! Duplicate-key classification.
//!
//! Idempotent-insert callers want a duplicate key to read as "zero rows
//! written, no error". Classification prefers structured driver codes
//! (SQLSTATE 23505 from the local Postgres driver); for dialects reached
//! through the proxy, where only the message text survives the transport,
//! a per-dialect substring table is the fallback.

use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};

/// Known unique-violation message fragments, one per dialect.
fn duplicate_pattern(dialect: Dialect) -> &'static str {
    match dialect {
        Dialect::Postgres => "duplicate key value violates unique constraint",
        Dialect::Mysql => "Duplicate entry",
        Dialect::Sqlite => "UNIQUE constraint failed",
        Dialect::Mssql => "Cannot insert duplicate key",
        Dialect::Oracle => "ORA-00001",
    }
}

/// Whether an error is a duplicate-key violation for the dialect.
pub fn is_duplicate_key(dialect: Dialect, err: &OrmError) -> bool {
    match err {
        OrmError::UniqueViolation(_) => true,
        OrmError::Query(driver) => driver
            .as_db_error()
            .is_some_and(|db| db.code().code() == "23505"),
        other => other.to_string().contains(duplicate_pattern(dialect)),
    }
}

/// Convert a duplicate-key failure into `Ok(0)`.
///
/// Any other outcome, success or failure, passes through unchanged. This is
/// the one deliberate exception to propagating execution errors untouched.
pub fn handle_duplicate(dialect: Dialect, result: OrmResult<u64>) -> OrmResult<u64> {
    match result {
        Err(err) if is_duplicate_key(dialect, &err) => Ok(0),
        other => other,
    }
}
