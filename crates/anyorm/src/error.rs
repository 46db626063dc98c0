//! Error types for anyorm

use thiserror::Error;

/// Result type alias for anyorm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for schema extraction, statement building and execution
#[derive(Debug, Error)]
pub enum OrmError {
    /// Database connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Query execution error from the local Postgres driver
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Schema construction error (missing key, bad version field, ...)
    #[error("Schema error: {0}")]
    Schema(String),

    /// Statement-building error (no columns, ambiguous key, ...)
    #[error("Statement error: {0}")]
    Statement(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency conflict: the row exists but its version moved
    #[error("Stale version on {table} key '{key}': expected version {version}")]
    StaleVersion {
        table: String,
        key: String,
        version: i64,
    },

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Wire statement encode/decode error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Remote proxy transport error
    #[error("Proxy error: {0}")]
    Proxy(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a schema construction error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    /// Create a statement-building error
    pub fn statement(message: impl Into<String>) -> Self {
        Self::Statement(message.into())
    }

    /// Create a stale-version error for an optimistic-concurrency conflict
    pub fn stale_version(
        table: impl Into<String>,
        key: impl Into<String>,
        version: i64,
    ) -> Self {
        Self::StaleVersion {
            table: table.into(),
            key: key.into(),
            version,
        }
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation(_))
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this is a stale-version conflict
    pub fn is_stale_version(&self) -> bool {
        matches!(self, Self::StaleVersion { .. })
    }

    /// Parse a tokio_postgres error into a more specific OrmError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{}: {}", constraint, message)),
                "23503" => {
                    return Self::ForeignKeyViolation(format!("{}: {}", constraint, message));
                }
                "23514" => return Self::CheckViolation(format!("{}: {}", constraint, message)),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for OrmError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}
