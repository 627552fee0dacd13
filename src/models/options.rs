//! Per-call execution options and transaction requests.

use crate::scope::ScopePolicy;
use serde::{Deserialize, Serialize};

/// SQL transaction isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// The SQL spelling of this level, as adapters emit it.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::ReadUncommitted => "READ UNCOMMITTED",
            Self::ReadCommitted => "READ COMMITTED",
            Self::RepeatableRead => "REPEATABLE READ",
            Self::Serializable => "SERIALIZABLE",
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Execution options for a single query or statement call.
///
/// Consumed by the terminal dispatch stage. The connection falls back to the
/// registry default when unset; the scope policy defaults to
/// [`ScopePolicy::Strict`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecOptions {
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub scope_policy: Option<ScopePolicy>,
}

impl ExecOptions {
    /// Create options targeting the registry default connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target a named connection.
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    /// Override the scope policy for this call.
    pub fn with_scope_policy(mut self, policy: ScopePolicy) -> Self {
        self.scope_policy = Some(policy);
        self
    }

    /// The effective scope policy for this call.
    pub fn effective_scope_policy(&self) -> ScopePolicy {
        self.scope_policy.unwrap_or(ScopePolicy::Strict)
    }
}

/// Request to open a transaction on one connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Target connection; the registry default when unset.
    #[serde(default)]
    pub connection: Option<String>,
    /// Isolation level to establish; the backend default when unset.
    #[serde(default)]
    pub isolation: Option<IsolationLevel>,
}

impl TransactionRequest {
    /// Create a request against the registry default connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Target a named connection.
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }

    /// Request an isolation level.
    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }
}
