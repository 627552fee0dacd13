//! Per-call execution context.
//!
//! An [`ExecutionContext`] carries the call's source text, its typed
//! configuration objects and a reference to the current transactional scope.
//! Each configuration object is consumed by exactly one middleware: a
//! `require` marks the object consumed and a second `require` for the same
//! object is a logic error. The terminal stage refuses to dispatch while any
//! object is still unconsumed.
//!
//! Consumption is tracked against a monotonically assigned token per object,
//! not against value equality, since two configurations may be value-equal
//! but distinct instances.

use crate::error::{ExecError, ExecResult};
use crate::scope::TransactionScope;
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
struct ConfigEntry {
    token: u64,
    type_name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// Opaque snapshot of the consumption state.
///
/// Re-dispatching middlewares (retry, replica) take a snapshot before their
/// first attempt and restore it before each further attempt, so downstream
/// stages consume afresh while markers set by earlier stages survive.
#[derive(Debug, Clone)]
pub struct ConsumptionSnapshot(HashSet<u64>);

/// The per-call bag threaded through the middleware chain.
pub struct ExecutionContext {
    source: String,
    configs: Vec<ConfigEntry>,
    consumed: HashSet<u64>,
    connection_override: Option<String>,
    scope: Option<Arc<TransactionScope>>,
    next_token: u64,
}

impl ExecutionContext {
    /// Create a context for the given source text.
    pub fn new(source: impl Into<String>) -> ExecResult<Self> {
        let source = source.into();
        if source.trim().is_empty() {
            return Err(ExecError::logic("source text must not be empty"));
        }
        Ok(Self {
            source,
            configs: Vec::new(),
            consumed: HashSet::new(),
            connection_override: None,
            scope: None,
            next_token: 0,
        })
    }

    /// Bind the context to a transactional scope.
    pub fn with_scope(mut self, scope: Arc<TransactionScope>) -> Self {
        self.scope = Some(scope);
        self
    }

    /// The query/statement text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Rewrite the source text (templating middlewares).
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    /// The current transactional scope, if any.
    pub fn scope(&self) -> Option<&Arc<TransactionScope>> {
        self.scope.as_ref()
    }

    /// Connection redirect set by a routing middleware, if any.
    pub fn connection_override(&self) -> Option<&str> {
        self.connection_override.as_deref()
    }

    /// Redirect the call to another connection.
    pub fn set_connection_override(&mut self, connection: Option<String>) {
        self.connection_override = connection;
    }

    /// Return a new context with `config` appended, sharing everything else.
    pub fn append<T: Any + Send + Sync>(&self, config: T) -> Self {
        let mut next = self.clone_parts();
        next.push_entry(Arc::new(config), std::any::type_name::<T>());
        next
    }

    /// Return a new context with the first configuration of type `T`
    /// replaced. The replacement keeps the original's consumption status.
    pub fn replace<T: Any + Send + Sync>(&self, config: T) -> ExecResult<Self> {
        let mut next = self.clone_parts();
        let entry = next
            .configs
            .iter_mut()
            .find(|e| e.value.is::<T>())
            .ok_or_else(|| {
                ExecError::logic(format!(
                    "no configuration of type {} to replace",
                    std::any::type_name::<T>()
                ))
            })?;
        // Token is retained, so a consumed original stays consumed.
        entry.value = Arc::new(config);
        Ok(next)
    }

    /// Look up a configuration without marking it consumed.
    pub fn peek<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.configs
            .iter()
            .find(|e| e.value.is::<T>())
            .and_then(|e| e.value.clone().downcast::<T>().ok())
    }

    /// Look up a configuration and mark it consumed.
    ///
    /// Returns `Ok(None)` when no object of the type is present. Requiring
    /// the same object twice is a logic error: a second middleware is trying
    /// to claim a configuration that was already claimed.
    pub fn require<T: Any + Send + Sync>(&mut self) -> ExecResult<Option<Arc<T>>> {
        let Some(entry) = self.configs.iter().find(|e| e.value.is::<T>()) else {
            return Ok(None);
        };
        if !self.consumed.insert(entry.token) {
            return Err(ExecError::logic(format!(
                "configuration {} was already required by an earlier stage",
                entry.type_name
            )));
        }
        Ok(entry.value.clone().downcast::<T>().ok())
    }

    /// True iff every configuration object has been required.
    pub fn depleted(&self) -> bool {
        self.configs.iter().all(|e| self.consumed.contains(&e.token))
    }

    /// Type names of the configurations not yet required, in append order.
    pub fn unused(&self) -> Vec<&'static str> {
        self.configs
            .iter()
            .filter(|e| !self.consumed.contains(&e.token))
            .map(|e| e.type_name)
            .collect()
    }

    /// Type names of the configurations already required, in append order.
    pub fn used(&self) -> Vec<&'static str> {
        self.configs
            .iter()
            .filter(|e| self.consumed.contains(&e.token))
            .map(|e| e.type_name)
            .collect()
    }

    /// Snapshot the consumption state for later restore.
    pub fn consumed_snapshot(&self) -> ConsumptionSnapshot {
        ConsumptionSnapshot(self.consumed.clone())
    }

    /// Restore a previously taken consumption snapshot.
    pub fn restore_consumed(&mut self, snapshot: &ConsumptionSnapshot) {
        self.consumed = snapshot.0.clone();
    }

    fn clone_parts(&self) -> Self {
        Self {
            source: self.source.clone(),
            configs: self.configs.clone(),
            consumed: self.consumed.clone(),
            connection_override: self.connection_override.clone(),
            scope: self.scope.clone(),
            next_token: self.next_token,
        }
    }

    fn push_entry(&mut self, value: Arc<dyn Any + Send + Sync>, type_name: &'static str) {
        let token = self.next_token;
        self.next_token += 1;
        self.configs.push(ConfigEntry {
            token,
            type_name,
            value,
        });
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("source", &self.source)
            .field("configs", &self.configs.iter().map(|e| e.type_name).collect::<Vec<_>>())
            .field("unused", &self.unused())
            .field("connection_override", &self.connection_override)
            .field("in_transaction", &self.scope.is_some())
            .finish()
    }
}
