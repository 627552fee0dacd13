//! db-pipeline
//!
//! A middleware execution pipeline for SQL backends. Callers submit a query
//! or statement together with typed per-call configuration objects; an
//! ordered chain of cross-cutting middlewares (cache-aside, replica routing,
//! retry-with-backoff, slow-execution logging) processes the call before the
//! terminal stage dispatches to a backend adapter resolved from a registry.
//! Transactions can span several independent adapters and commit or roll
//! back as a unit.
//!
//! ```ignore
//! let registry = Arc::new(
//!     AdapterRegistry::builder()
//!         .register(primary_adapter)
//!         .register(replica_adapter)
//!         .build()?,
//! );
//! let executor = Executor::builder(registry)
//!     .middleware(CacheMiddleware::new(store))
//!     .middleware(ReplicaMiddleware::new("primary", ["replica-1"]))
//!     .middleware(RetryMiddleware::new())
//!     .build();
//!
//! let rows = executor
//!     .query(Call::new("SELECT * FROM users").with(RetryConfig::default()))
//!     .await?;
//! ```

pub mod adapter;
pub mod cache;
pub mod context;
pub mod error;
pub mod executor;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod scope;

pub use adapter::{Adapter, TransactionHandle};
pub use cache::{CacheDecision, CacheSlot, CacheStore, MemoryCacheStore};
pub use context::ExecutionContext;
pub use error::{ErrorKind, ExecError, ExecResult, TransactionPhase};
pub use executor::{Call, Executor};
pub use middleware::{CacheMiddleware, ReplicaMiddleware, RetryMiddleware, SlowLogMiddleware};
pub use models::{
    CacheIdentity, CacheKeyProvider, ExecOptions, FallbackStrategy, IsolationLevel, ParamValue,
    Params, QueryResult, ReplicaConfig, RetryConfig, TransactionRequest,
};
pub use pipeline::{Middleware, Next, Pipeline, TerminalStage};
pub use registry::{AdapterRegistry, AdapterRegistryBuilder};
pub use scope::{ScopePolicy, TransactionScope};
