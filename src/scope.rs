//! Transactional scope tracking.
//!
//! A [`TransactionScope`] is an immutable snapshot of which connections have
//! an open transaction at one nesting level, linked to the scope one level up.
//! Nodes are created when a transaction begins, extended (never mutated) as
//! nesting deepens, and dropped when the outermost transaction completes.

use crate::error::{ExecError, ExecResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How strictly a call's target connection must match the active nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePolicy {
    /// No check at all
    None,
    /// Connection must have begun a transaction at the innermost level
    Strict,
    /// Innermost level or any ancestor level
    Parent,
}

/// One nesting level of open transactions.
#[derive(Debug)]
pub struct TransactionScope {
    connections: Vec<String>,
    parent: Option<Arc<TransactionScope>>,
}

impl TransactionScope {
    /// Create a scope level from the connections that began a transaction.
    ///
    /// Connection names must be unique within the level; starting two
    /// transactions on the same connection in one call is rejected.
    pub fn new(
        connections: Vec<String>,
        parent: Option<Arc<TransactionScope>>,
    ) -> ExecResult<Arc<Self>> {
        for (i, name) in connections.iter().enumerate() {
            if connections[..i].contains(name) {
                return Err(ExecError::logic(format!(
                    "connection '{name}' appears twice in one transactional scope level"
                )));
            }
        }
        Ok(Arc::new(Self {
            connections,
            parent,
        }))
    }

    /// Connections open at this level.
    pub fn connections(&self) -> &[String] {
        &self.connections
    }

    /// The scope one level up, if any.
    pub fn parent(&self) -> Option<&Arc<TransactionScope>> {
        self.parent.as_ref()
    }

    /// Nesting depth, 1 for the outermost scope.
    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |p| p.depth())
    }

    /// Answer "is this connection usable here under this policy".
    pub fn accepts(&self, connection: &str, policy: ScopePolicy) -> bool {
        match policy {
            ScopePolicy::None => true,
            ScopePolicy::Strict => self.contains(connection),
            ScopePolicy::Parent => {
                self.contains(connection)
                    || self
                        .parent
                        .as_ref()
                        .is_some_and(|p| p.accepts(connection, ScopePolicy::Parent))
            }
        }
    }

    fn contains(&self, connection: &str) -> bool {
        self.connections.iter().any(|c| c == connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nested() -> Arc<TransactionScope> {
        // [ {A}, {B}, {C} ], innermost last
        let a = TransactionScope::new(vec!["A".to_string()], None).unwrap();
        let b = TransactionScope::new(vec!["B".to_string()], Some(a)).unwrap();
        TransactionScope::new(vec!["C".to_string()], Some(b)).unwrap()
    }

    #[test]
    fn test_strict_only_innermost() {
        let scope = nested();
        assert!(!scope.accepts("A", ScopePolicy::Strict));
        assert!(!scope.accepts("B", ScopePolicy::Strict));
        assert!(scope.accepts("C", ScopePolicy::Strict));
    }

    #[test]
    fn test_parent_walks_ancestors() {
        let scope = nested();
        assert!(scope.accepts("A", ScopePolicy::Parent));
        assert!(scope.accepts("B", ScopePolicy::Parent));
        assert!(scope.accepts("C", ScopePolicy::Parent));
        assert!(!scope.accepts("D", ScopePolicy::Parent));
    }

    #[test]
    fn test_none_always_accepts() {
        let scope = nested();
        assert!(scope.accepts("A", ScopePolicy::None));
        assert!(scope.accepts("unknown", ScopePolicy::None));
    }

    #[test]
    fn test_duplicate_connection_rejected() {
        let result = TransactionScope::new(vec!["x".to_string(), "x".to_string()], None);
        assert!(result.unwrap_err().is_logic());
    }

    #[test]
    fn test_depth() {
        assert_eq!(nested().depth(), 3);
        let single = TransactionScope::new(vec!["A".to_string()], None).unwrap();
        assert_eq!(single.depth(), 1);
    }

    #[test]
    fn test_multi_connection_level() {
        let scope =
            TransactionScope::new(vec!["x".to_string(), "y".to_string()], None).unwrap();
        assert!(scope.accepts("x", ScopePolicy::Strict));
        assert!(scope.accepts("y", ScopePolicy::Strict));
        assert!(!scope.accepts("z", ScopePolicy::Strict));
    }
}
