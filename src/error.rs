//! Error types for the execution pipeline.
//!
//! This module defines all error types using `thiserror`. Each variant maps to
//! one failure kind in [`ErrorKind`], which drives the retry and replica
//! middlewares' catch decisions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse failure classification used by policy middlewares.
///
/// `Logic` marks programmer misuse (double consumption, scope violations,
/// caching a statement, ...) and is never caught by retry or replica routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Backend unreachable
    Connection,
    /// Opaque backend-level failure with no specific wrapper
    Driver,
    /// Malformed source text, never retried
    Syntax,
    Deadlock,
    LockWaitTimeout,
    TransactionBegin,
    TransactionCommit,
    TransactionRollback,
    /// Failed to read or set the isolation level
    Isolation,
    /// Programmer misuse
    Logic,
    /// Operation not available on the configured backend
    Unsupported,
    /// Uncategorized
    Runtime,
    /// Primary failure plus one or more rollback failures
    RollbackAggregate,
}

/// Transaction phase that failed to change state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPhase {
    Begin,
    Commit,
    Rollback,
}

impl std::fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::Commit => write!(f, "commit"),
            Self::Rollback => write!(f, "rollback"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Connection failed on '{connection}': {message}")]
    Connection { connection: String, message: String },

    #[error("Driver error: {message}")]
    Driver {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Syntax error: {message}")]
    Syntax { message: String },

    #[error("Deadlock detected: {message}")]
    Deadlock { message: String },

    #[error("Lock wait timeout: {message}")]
    LockWaitTimeout { message: String },

    #[error("Failed to {phase} transaction: {message}")]
    Transaction {
        phase: TransactionPhase,
        message: String,
    },

    #[error("Isolation level error: {message}")]
    Isolation { message: String },

    #[error("Logic error: {message}")]
    Logic { message: String },

    #[error("Unsupported operation: {operation}")]
    Unsupported { operation: String },

    #[error("Runtime error: {message}")]
    Runtime { message: String },

    #[error(
        "Rollback failed after '{source_error}' ({} rollback failure(s)); affected connections can no longer be trusted",
        .rollback_errors.len()
    )]
    RollbackAggregate {
        source_error: Box<ExecError>,
        rollback_errors: Vec<ExecError>,
    },
}

impl ExecError {
    /// Create a connection error for a named connection.
    pub fn connection(connection: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            connection: connection.into(),
            message: message.into(),
        }
    }

    /// Create a driver error with optional SQL state.
    pub fn driver(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Driver {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a syntax error.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    /// Create a deadlock error.
    pub fn deadlock(message: impl Into<String>) -> Self {
        Self::Deadlock {
            message: message.into(),
        }
    }

    /// Create a lock wait timeout error.
    pub fn lock_wait_timeout(message: impl Into<String>) -> Self {
        Self::LockWaitTimeout {
            message: message.into(),
        }
    }

    /// Create a transaction state-change error.
    pub fn transaction(phase: TransactionPhase, message: impl Into<String>) -> Self {
        Self::Transaction {
            phase,
            message: message.into(),
        }
    }

    /// Create an isolation level error.
    pub fn isolation(message: impl Into<String>) -> Self {
        Self::Isolation {
            message: message.into(),
        }
    }

    /// Create a logic error.
    pub fn logic(message: impl Into<String>) -> Self {
        Self::Logic {
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
        }
    }

    /// Create a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }

    /// Wrap a primary failure together with the rollback failures that
    /// followed it. Callers must treat the result as fatal for the affected
    /// connections.
    pub fn rollback_aggregate(source_error: ExecError, rollback_errors: Vec<ExecError>) -> Self {
        Self::RollbackAggregate {
            source_error: Box::new(source_error),
            rollback_errors,
        }
    }

    /// The failure kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Driver { .. } => ErrorKind::Driver,
            Self::Syntax { .. } => ErrorKind::Syntax,
            Self::Deadlock { .. } => ErrorKind::Deadlock,
            Self::LockWaitTimeout { .. } => ErrorKind::LockWaitTimeout,
            Self::Transaction { phase, .. } => match phase {
                TransactionPhase::Begin => ErrorKind::TransactionBegin,
                TransactionPhase::Commit => ErrorKind::TransactionCommit,
                TransactionPhase::Rollback => ErrorKind::TransactionRollback,
            },
            Self::Isolation { .. } => ErrorKind::Isolation,
            Self::Logic { .. } => ErrorKind::Logic,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
            Self::Runtime { .. } => ErrorKind::Runtime,
            Self::RollbackAggregate { .. } => ErrorKind::RollbackAggregate,
        }
    }

    /// Check if this error is retryable under the default catch set.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Deadlock | ErrorKind::LockWaitTimeout
        )
    }

    /// Check if this error marks programmer misuse.
    pub fn is_logic(&self) -> bool {
        self.kind() == ErrorKind::Logic
    }
}

/// Result type alias for pipeline operations.
pub type ExecResult<T> = Result<T, ExecError>;
