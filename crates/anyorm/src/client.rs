//! Executor traits for unified database access.
//!
//! Everything upstream renders to `(sql, values)` and hands the pair to an
//! [`Executor`]. The trait is implemented directly on `tokio_postgres`
//! clients and transactions (and their `deadpool` counterparts behind the
//! `pool` feature), so repositories and writers accept either a connection
//! or an open transaction. A remote database reachable through the proxy
//! transport satisfies the same trait; see [`crate::proxy`].
//!
//! # Example
//!
//! ```ignore
//! async fn rename(conn: &mut tokio_postgres::Client, id: &str) -> OrmResult<()> {
//!     let tx = conn.begin().await?;
//!     tx.execute("UPDATE users SET name = $1 WHERE id = $2", &["jo".into(), id.into()])
//!         .await?;
//!     tx.commit().await
//! }
//! ```

use std::time::Duration;

use tokio_postgres::types::{ToSql, Type};

use crate::dialect::{Dialect, Placeholder};
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::value::Value;

/// One database handle: a connection, a transaction, or a remote proxy.
///
/// Statements must be rendered for [`Executor::dialect`]; placeholders in
/// the SQL text are bound positionally from `params`.
pub trait Executor: Send + Sync {
    /// Dialect statements handed to this executor must be rendered in.
    fn dialect(&self) -> Dialect;

    /// Placeholder style matching [`Executor::dialect`].
    fn placeholder(&self) -> Placeholder {
        self.dialect().placeholder()
    }

    /// Execute a query and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send;

    /// Execute a query and return the first row.
    ///
    /// Returns [`OrmError::NotFound`] when the result set is empty; extra
    /// rows are not an error.
    fn query_one(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Row>> + Send {
        async move {
            let rows = self.query(sql, params).await?;
            rows.into_iter()
                .next()
                .ok_or_else(|| OrmError::not_found("expected one row, got none"))
        }
    }

    /// Execute a query and return the first row, if any.
    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Option<Row>>> + Send {
        async move { Ok(self.query(sql, params).await?.into_iter().next()) }
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;
}

/// An executor that can open transactions.
pub trait Connection: Executor {
    /// Transaction handle borrowed from this connection.
    type Tx<'a>: Tx
    where
        Self: 'a;

    /// Open a transaction. Work issued on the returned handle is invisible
    /// to other executors until commit.
    fn begin(&mut self)
    -> impl std::future::Future<Output = OrmResult<Self::Tx<'_>>> + Send;
}

/// An open transaction. Dropping without committing rolls back.
pub trait Tx: Executor {
    fn commit(self) -> impl std::future::Future<Output = OrmResult<()>> + Send;

    fn rollback(self) -> impl std::future::Future<Output = OrmResult<()>> + Send;
}

#[cfg(feature = "tracing")]
fn trace_sql(sql: &str, param_count: usize) {
    tracing::debug!(target: "anyorm.sql", param_count, sql = %sql, "executing");
}

#[cfg(not(feature = "tracing"))]
fn trace_sql(_sql: &str, _param_count: usize) {}

fn bind(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

// ==================== Row conversion ====================

/// Convert a driver row into the driver-agnostic [`Row`], decoding each
/// column by its declared Postgres type.
pub(crate) fn decode_row(row: &tokio_postgres::Row) -> OrmResult<Row> {
    let columns: Vec<String> = row
        .columns()
        .iter()
        .map(|c| c.name().to_owned())
        .collect();
    let mut values = Vec::with_capacity(columns.len());
    for (index, column) in row.columns().iter().enumerate() {
        values.push(decode_column(row, index, column)?);
    }
    Ok(Row::new(columns, values))
}

fn decode_column(
    row: &tokio_postgres::Row,
    index: usize,
    column: &tokio_postgres::Column,
) -> OrmResult<Value> {
    let ty = column.type_();
    let fail = |e: tokio_postgres::Error| OrmError::decode(column.name(), e.to_string());

    if *ty == Type::BOOL {
        let v: Option<bool> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, Value::Bool));
    }
    if *ty == Type::INT2 {
        let v: Option<i16> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, |v| Value::Int(i64::from(v))));
    }
    if *ty == Type::INT4 {
        let v: Option<i32> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, |v| Value::Int(i64::from(v))));
    }
    if *ty == Type::INT8 {
        let v: Option<i64> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, Value::Int));
    }
    if *ty == Type::FLOAT4 {
        let v: Option<f32> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, |v| Value::Float(f64::from(v))));
    }
    if *ty == Type::FLOAT8 {
        let v: Option<f64> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, Value::Float));
    }
    if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME {
        let v: Option<String> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, Value::Text));
    }
    if *ty == Type::BYTEA {
        let v: Option<Vec<u8>> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, Value::Bytes));
    }
    if *ty == Type::TIMESTAMP {
        let v: Option<chrono::NaiveDateTime> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, |v| Value::Timestamp(v.and_utc())));
    }
    if *ty == Type::TIMESTAMPTZ {
        let v: Option<chrono::DateTime<chrono::Utc>> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, Value::Timestamp));
    }
    if *ty == Type::UUID {
        let v: Option<uuid::Uuid> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, Value::Uuid));
    }
    if *ty == Type::JSON || *ty == Type::JSONB {
        let v: Option<serde_json::Value> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, Value::Json));
    }
    #[cfg(feature = "rust_decimal")]
    if *ty == Type::NUMERIC {
        let v: Option<rust_decimal::Decimal> = row.try_get(index).map_err(fail)?;
        return Ok(v.map_or(Value::Null, Value::Decimal));
    }
    Err(OrmError::decode(
        column.name(),
        format!("unsupported column type {ty}"),
    ))
}

// ==================== tokio-postgres ====================

impl Executor for tokio_postgres::Client {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        trace_sql(sql, params.len());
        let rows = tokio_postgres::Client::query(self, sql, &bind(params))
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        trace_sql(sql, params.len());
        tokio_postgres::Client::execute(self, sql, &bind(params))
            .await
            .map_err(OrmError::from_db_error)
    }
}

impl Connection for tokio_postgres::Client {
    type Tx<'a>
        = tokio_postgres::Transaction<'a>
    where
        Self: 'a;

    async fn begin(&mut self) -> OrmResult<Self::Tx<'_>> {
        tokio_postgres::Client::transaction(self)
            .await
            .map_err(OrmError::from_db_error)
    }
}

impl Executor for tokio_postgres::Transaction<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        trace_sql(sql, params.len());
        let rows = tokio_postgres::Transaction::query(self, sql, &bind(params))
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter().map(decode_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        trace_sql(sql, params.len());
        tokio_postgres::Transaction::execute(self, sql, &bind(params))
            .await
            .map_err(OrmError::from_db_error)
    }
}

impl Tx for tokio_postgres::Transaction<'_> {
    async fn commit(self) -> OrmResult<()> {
        tokio_postgres::Transaction::commit(self)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn rollback(self) -> OrmResult<()> {
        tokio_postgres::Transaction::rollback(self)
            .await
            .map_err(OrmError::from_db_error)
    }
}

// ==================== Reference delegation ====================

impl<E: Executor> Executor for &E {
    fn dialect(&self) -> Dialect {
        (*self).dialect()
    }

    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Vec<Row>>> + Send {
        (*self).query(sql, params)
    }

    fn query_one(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Row>> + Send {
        (*self).query_one(sql, params)
    }

    fn query_opt(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Option<Row>>> + Send {
        (*self).query_opt(sql, params)
    }

    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send {
        (*self).execute(sql, params)
    }
}

// ==================== Wall-clock budget ====================

/// Applies a per-call wall-clock budget to a wrapped executor.
///
/// A call that outlives the budget resolves to [`OrmError::Timeout`]; the
/// in-flight database work is abandoned by dropping its future.
pub struct TimedExecutor<E> {
    inner: E,
    budget: Duration,
}

impl<E> TimedExecutor<E> {
    pub fn new(inner: E, budget: Duration) -> Self {
        Self { inner, budget }
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: Executor> Executor for TimedExecutor<E> {
    fn dialect(&self) -> Dialect {
        self.inner.dialect()
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        match tokio::time::timeout(self.budget, self.inner.query(sql, params)).await {
            Ok(result) => result,
            Err(_) => Err(OrmError::Timeout(self.budget)),
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        match tokio::time::timeout(self.budget, self.inner.execute(sql, params)).await {
            Ok(result) => result,
            Err(_) => Err(OrmError::Timeout(self.budget)),
        }
    }
}

// ==================== deadpool-postgres ====================

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Client {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        Executor::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        Executor::execute(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::Client {
    type Tx<'a>
        = deadpool_postgres::Transaction<'a>
    where
        Self: 'a;

    async fn begin(&mut self) -> OrmResult<Self::Tx<'_>> {
        self.transaction().await.map_err(OrmError::from_db_error)
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::ClientWrapper {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        Executor::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        Executor::execute(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::ClientWrapper {
    type Tx<'a>
        = deadpool_postgres::Transaction<'a>
    where
        Self: 'a;

    async fn begin(&mut self) -> OrmResult<Self::Tx<'_>> {
        self.transaction().await.map_err(OrmError::from_db_error)
    }
}

#[cfg(feature = "pool")]
impl Executor for deadpool_postgres::Transaction<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        Executor::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        Executor::execute(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl Tx for deadpool_postgres::Transaction<'_> {
    async fn commit(self) -> OrmResult<()> {
        deadpool_postgres::Transaction::commit(self)
            .await
            .map_err(OrmError::from_db_error)
    }

    async fn rollback(self) -> OrmResult<()> {
        deadpool_postgres::Transaction::rollback(self)
            .await
            .map_err(OrmError::from_db_error)
    }
}

// ==================== Test double ====================

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Records every statement and hands out scripted results in order.
    ///
    /// `begin`/`commit`/`rollback` are recorded as `BEGIN`/`COMMIT`/
    /// `ROLLBACK` pseudo-statements so tests can assert the full call
    /// sequence of a transactional flow.
    pub(crate) struct RecordingExecutor {
        dialect: Dialect,
        calls: Mutex<Vec<(String, Vec<Value>)>>,
        rows: Mutex<VecDeque<Vec<Row>>>,
        affected: Mutex<VecDeque<OrmResult<u64>>>,
    }

    impl RecordingExecutor {
        pub(crate) fn new(dialect: Dialect) -> Self {
            Self {
                dialect,
                calls: Mutex::new(Vec::new()),
                rows: Mutex::new(VecDeque::new()),
                affected: Mutex::new(VecDeque::new()),
            }
        }

        /// Script the next query result.
        pub(crate) fn push_rows(&self, rows: Vec<Row>) {
            self.rows.lock().unwrap().push_back(rows);
        }

        /// Script the next execute result.
        pub(crate) fn push_affected(&self, n: u64) {
            self.affected.lock().unwrap().push_back(Ok(n));
        }

        /// Script the next execute call to fail.
        pub(crate) fn push_execute_error(&self, err: OrmError) {
            self.affected.lock().unwrap().push_back(Err(err));
        }

        pub(crate) fn recorded(&self) -> Vec<(String, Vec<Value>)> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, sql: &str, params: &[Value]) {
            self.calls
                .lock()
                .unwrap()
                .push((sql.to_owned(), params.to_vec()));
        }
    }

    impl Executor for RecordingExecutor {
        fn dialect(&self) -> Dialect {
            self.dialect
        }

        async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
            self.record(sql, params);
            Ok(self.rows.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
            self.record(sql, params);
            self.affected.lock().unwrap().pop_front().unwrap_or(Ok(1))
        }
    }

    impl Connection for RecordingExecutor {
        type Tx<'a>
            = RecordingTx<'a>
        where
            Self: 'a;

        async fn begin(&mut self) -> OrmResult<Self::Tx<'_>> {
            self.record("BEGIN", &[]);
            Ok(RecordingTx { inner: self })
        }
    }

    pub(crate) struct RecordingTx<'a> {
        inner: &'a RecordingExecutor,
    }

    impl Executor for RecordingTx<'_> {
        fn dialect(&self) -> Dialect {
            self.inner.dialect
        }

        async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
            Executor::query(self.inner, sql, params).await
        }

        async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
            Executor::execute(self.inner, sql, params).await
        }
    }

    impl Tx for RecordingTx<'_> {
        async fn commit(self) -> OrmResult<()> {
            self.inner.record("COMMIT", &[]);
            Ok(())
        }

        async fn rollback(self) -> OrmResult<()> {
            self.inner.record("ROLLBACK", &[]);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingExecutor;
    use super::*;

    #[tokio::test]
    async fn query_one_maps_empty_to_not_found() {
        let executor = RecordingExecutor::new(Dialect::Postgres);
        executor.push_rows(Vec::new());
        let err = executor.query_one("SELECT 1", &[]).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn query_opt_maps_empty_to_none() {
        let executor = RecordingExecutor::new(Dialect::Postgres);
        executor.push_rows(Vec::new());
        let row = executor.query_opt("SELECT 1", &[]).await.unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn query_one_takes_the_first_row() {
        let executor = RecordingExecutor::new(Dialect::Postgres);
        executor.push_rows(vec![
            Row::new(vec!["n".to_string()], vec![Value::Int(1)]),
            Row::new(vec!["n".to_string()], vec![Value::Int(2)]),
        ]);
        let row = executor.query_one("SELECT n", &[]).await.unwrap();
        assert_eq!(row.value("n"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn references_delegate() {
        let executor = RecordingExecutor::new(Dialect::Mysql);
        let by_ref = &executor;
        assert_eq!(by_ref.dialect(), Dialect::Mysql);
        assert_eq!(by_ref.placeholder(), Placeholder::Question);
        by_ref.execute("DELETE FROM t", &[]).await.unwrap();
        assert_eq!(executor.recorded().len(), 1);
    }

    #[tokio::test]
    async fn timed_executor_cuts_off_slow_calls() {
        struct Stalled;

        impl Executor for Stalled {
            fn dialect(&self) -> Dialect {
                Dialect::Postgres
            }

            async fn query(&self, _sql: &str, _params: &[Value]) -> OrmResult<Vec<Row>> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(Vec::new())
            }

            async fn execute(&self, _sql: &str, _params: &[Value]) -> OrmResult<u64> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(0)
            }
        }

        let executor = TimedExecutor::new(Stalled, Duration::from_millis(10));
        let err = executor.query("SELECT pg_sleep(60)", &[]).await.unwrap_err();
        assert!(matches!(err, OrmError::Timeout(_)));
    }

    #[tokio::test]
    async fn timed_executor_passes_fast_calls_through() {
        let inner = RecordingExecutor::new(Dialect::Postgres);
        inner.push_affected(3);
        let executor = TimedExecutor::new(inner, Duration::from_secs(5));
        let n = executor.execute("UPDATE t SET a = 1", &[]).await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(executor.into_inner().recorded().len(), 1);
    }
}
