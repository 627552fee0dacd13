//! Adapter registry.
//!
//! Maps connection names to backend adapters. Built once via the builder,
//! read-only thereafter; safe for concurrent lookups by independent calls.

use crate::adapter::Adapter;
use crate::error::{ExecError, ExecResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only name → adapter map with a default connection.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn Adapter>>,
    default_connection: String,
}

impl AdapterRegistry {
    /// Start building a registry.
    pub fn builder() -> AdapterRegistryBuilder {
        AdapterRegistryBuilder {
            adapters: Vec::new(),
            default_connection: None,
        }
    }

    /// Resolve an adapter by name, or the default adapter when no name is
    /// given.
    pub fn resolve(&self, connection: Option<&str>) -> ExecResult<Arc<dyn Adapter>> {
        let name = connection.unwrap_or(&self.default_connection);
        self.adapters.get(name).cloned().ok_or_else(|| {
            ExecError::logic(format!("no adapter registered for connection '{name}'"))
        })
    }

    /// Name of the default connection.
    pub fn default_connection(&self) -> &str {
        &self.default_connection
    }

    /// Check whether a connection name is registered.
    pub fn contains(&self, connection: &str) -> bool {
        self.adapters.contains_key(connection)
    }

    /// Registered connection names, unordered.
    pub fn connections(&self) -> Vec<&str> {
        self.adapters.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("connections", &self.connections())
            .field("default_connection", &self.default_connection)
            .finish()
    }
}

/// Builder for [`AdapterRegistry`]; duplicate and empty names are rejected at
/// build time.
pub struct AdapterRegistryBuilder {
    adapters: Vec<Arc<dyn Adapter>>,
    default_connection: Option<String>,
}

impl AdapterRegistryBuilder {
    /// Register an adapter under its own name.
    pub fn register(mut self, adapter: Arc<dyn Adapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Pick the default connection; the first registered adapter otherwise.
    pub fn default_connection(mut self, name: impl Into<String>) -> Self {
        self.default_connection = Some(name.into());
        self
    }

    /// Validate and build the registry.
    pub fn build(self) -> ExecResult<AdapterRegistry> {
        let mut adapters: HashMap<String, Arc<dyn Adapter>> = HashMap::new();
        let mut first_name: Option<String> = None;

        for adapter in self.adapters {
            let name = adapter.name().to_string();
            if name.is_empty() {
                return Err(ExecError::logic("adapter name must not be empty"));
            }
            if adapters.contains_key(&name) {
                return Err(ExecError::logic(format!(
                    "duplicate adapter name '{name}'"
                )));
            }
            first_name.get_or_insert_with(|| name.clone());
            adapters.insert(name, adapter);
        }

        let default_connection = match self.default_connection.or(first_name) {
            Some(name) => name,
            None => return Err(ExecError::logic("registry needs at least one adapter")),
        };
        if !adapters.contains_key(&default_connection) {
            return Err(ExecError::logic(format!(
                "default connection '{default_connection}' is not registered"
            )));
        }

        Ok(AdapterRegistry {
            adapters,
            default_connection,
        })
    }
}
