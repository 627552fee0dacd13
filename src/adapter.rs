//! Backend adapter contract.
//!
//! An adapter owns one backend connection and implements the closed set of
//! operations the pipeline dispatches: begin/commit/rollback for transaction
//! state and query/statement for execution. Concrete adapters wrap a specific
//! driver and are expected to translate driver failures into [`ExecError`]
//! kinds, attaching the source text and connection name at that boundary; the
//! pipeline never re-wraps them.

use crate::error::ExecResult;
use crate::models::options::{ExecOptions, IsolationLevel, TransactionRequest};
use crate::models::params::Params;
use crate::models::result::QueryResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Handle for one open transaction on one adapter.
///
/// Returned by [`Adapter::begin`]; adapters may amend the requested isolation
/// (e.g. clamp to what the backend supports) before handing the handle back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionHandle {
    /// Unique identifier, `tx_` + 32 hex chars.
    pub id: String,
    /// Connection the transaction runs on.
    pub connection: String,
    /// Isolation level actually established, if any was set.
    pub isolation: Option<IsolationLevel>,
}

impl TransactionHandle {
    /// Create a handle for a begun transaction.
    pub fn new(connection: impl Into<String>, request: Option<&TransactionRequest>) -> Self {
        Self {
            id: generate_transaction_id(),
            connection: connection.into(),
            isolation: request.and_then(|r| r.isolation),
        }
    }
}

/// Generate a unique transaction ID.
fn generate_transaction_id() -> String {
    format!("tx_{}", uuid::Uuid::new_v4().simple())
}

/// One named backend connection.
///
/// `begin`/`commit`/`rollback` are serialized by the adapter against its own
/// underlying connection; the pipeline adds no locking of its own.
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Registry name of this adapter's connection. Non-empty, unique.
    fn name(&self) -> &str;

    /// Open a transaction, honoring the request's isolation when possible.
    async fn begin(&self, request: Option<&TransactionRequest>) -> ExecResult<TransactionHandle>;

    /// Commit a transaction previously begun on this adapter.
    async fn commit(&self, handle: &TransactionHandle) -> ExecResult<()>;

    /// Roll back a transaction previously begun on this adapter.
    async fn rollback(&self, handle: &TransactionHandle) -> ExecResult<()>;

    /// Execute a query and return its rows.
    async fn query(
        &self,
        source: &str,
        params: Option<&Params>,
        options: Option<&ExecOptions>,
    ) -> ExecResult<QueryResult>;

    /// Execute a statement and return the affected row count.
    async fn statement(
        &self,
        source: &str,
        params: Option<&Params>,
        options: Option<&ExecOptions>,
    ) -> ExecResult<u64>;
}
