//! Remote execution over a forwarding transport.
//!
//! A [`ProxyExecutor`] satisfies the same [`Executor`] contract as a local
//! client but ships every statement through a [`ProxyTransport`] (HTTP,
//! gRPC, whatever the deployment uses; the transport itself is out of
//! scope here). Statements cross the wire in the JSON-safe
//! [`WireStatement`] form, result rows come back as JSON scalars, and
//! transactions ride along as opaque tokens issued by the remote side, so
//! repositories and writers work unchanged against a database they cannot
//! reach directly.
//!
//! # Example
//!
//! ```ignore
//! let remote = ProxyExecutor::new(transport, Dialect::Mssql);
//! let rows = remote.query("SELECT * FROM users WHERE id = @p1", &[id.into()]).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::{Connection, Executor, Tx};
use crate::dialect::Dialect;
use crate::error::{OrmError, OrmResult};
use crate::row::Row;
use crate::statement::{Statement, WireStatement, decode_scalar};
use crate::value::Value;

/// The forwarding boundary.
///
/// Implementations map transport and remote database failures to
/// [`OrmError::Proxy`]; the core does not reinterpret them.
pub trait ProxyTransport: Send + Sync {
    fn send(
        &self,
        request: ProxyRequest,
    ) -> impl std::future::Future<Output = OrmResult<ProxyResponse>> + Send;
}

/// What the remote side is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyAction {
    Query,
    Execute,
    Begin,
    Commit,
    Rollback,
}

/// One forwarded call.
///
/// `tx` carries the opaque transaction token for calls that run inside a
/// remote transaction; `statement` is absent for lifecycle actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyRequest {
    pub action: ProxyAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statement: Option<WireStatement>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<String>,
}

impl ProxyRequest {
    fn statement(action: ProxyAction, statement: WireStatement, tx: Option<&str>) -> Self {
        Self {
            action,
            statement: Some(statement),
            tx: tx.map(str::to_owned),
        }
    }

    fn lifecycle(action: ProxyAction, tx: Option<&str>) -> Self {
        Self {
            action,
            statement: None,
            tx: tx.map(str::to_owned),
        }
    }
}

/// The remote side's answer.
///
/// `columns`/`rows` are filled for queries, `affected` for executes, and
/// `tx` for a successful begin. Timestamp-valued cells arrive as wire-layout
/// text; decoding back to native timestamps happens at field scan time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyResponse {
    pub affected: u64,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub tx: Option<String>,
}

fn decode_rows(response: ProxyResponse) -> OrmResult<Vec<Row>> {
    let columns: Arc<[String]> = response.columns.into();
    let mut rows = Vec::with_capacity(response.rows.len());
    for cells in response.rows {
        if cells.len() != columns.len() {
            return Err(OrmError::Serialization(format!(
                "row has {} cells for {} columns",
                cells.len(),
                columns.len()
            )));
        }
        let values = cells.iter().map(decode_scalar).collect();
        rows.push(Row::new(Arc::clone(&columns), values));
    }
    Ok(rows)
}

/// An [`Executor`] whose database lives on the other side of a transport.
///
/// The dialect is the remote database's; statements must be rendered for
/// it before they are handed here.
pub struct ProxyExecutor<T> {
    transport: T,
    dialect: Dialect,
}

impl<T: ProxyTransport> ProxyExecutor<T> {
    pub fn new(transport: T, dialect: Dialect) -> Self {
        Self { transport, dialect }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: ProxyTransport> Executor for ProxyExecutor<T> {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        let wire = Statement::new(sql, params.to_vec()).to_wire()?;
        let request = ProxyRequest::statement(ProxyAction::Query, wire, None);
        decode_rows(self.transport.send(request).await?)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        let wire = Statement::new(sql, params.to_vec()).to_wire()?;
        let request = ProxyRequest::statement(ProxyAction::Execute, wire, None);
        Ok(self.transport.send(request).await?.affected)
    }
}

impl<T: ProxyTransport> Connection for ProxyExecutor<T> {
    type Tx<'a>
        = ProxyTransaction<'a, T>
    where
        Self: 'a;

    async fn begin(&mut self) -> OrmResult<Self::Tx<'_>> {
        let request = ProxyRequest::lifecycle(ProxyAction::Begin, None);
        let response = self.transport.send(request).await?;
        let token = response
            .tx
            .ok_or_else(|| OrmError::Proxy("remote begin returned no transaction token".into()))?;
        Ok(ProxyTransaction {
            transport: &self.transport,
            dialect: self.dialect,
            token,
        })
    }
}

/// A remote transaction, addressed by its token.
///
/// If neither commit nor rollback is ever sent, the remote side owns the
/// abandoned transaction's fate (typically an idle timeout).
#[derive(Debug)]
pub struct ProxyTransaction<'a, T> {
    transport: &'a T,
    dialect: Dialect,
    token: String,
}

impl<T: ProxyTransport> ProxyTransaction<'_, T> {
    /// The remote side's token for this transaction.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl<T: ProxyTransport> Executor for ProxyTransaction<'_, T> {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<Row>> {
        let wire = Statement::new(sql, params.to_vec()).to_wire()?;
        let request = ProxyRequest::statement(ProxyAction::Query, wire, Some(&self.token));
        decode_rows(self.transport.send(request).await?)
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        let wire = Statement::new(sql, params.to_vec()).to_wire()?;
        let request = ProxyRequest::statement(ProxyAction::Execute, wire, Some(&self.token));
        Ok(self.transport.send(request).await?.affected)
    }
}

impl<T: ProxyTransport> Tx for ProxyTransaction<'_, T> {
    async fn commit(self) -> OrmResult<()> {
        let request = ProxyRequest::lifecycle(ProxyAction::Commit, Some(&self.token));
        self.transport.send(request).await?;
        Ok(())
    }

    async fn rollback(self) -> OrmResult<()> {
        let request = ProxyRequest::lifecycle(ProxyAction::Rollback, Some(&self.token));
        self.transport.send(request).await?;
        Ok(())
    }
}
