//! Plain data models consumed by the pipeline.
//!
//! Everything in this module is behavior-free configuration or payload data:
//! per-call execution options, transaction requests, parameter bags, query
//! results and the policy middleware configurations.

pub mod options;
pub mod params;
pub mod policy;
pub mod result;

pub use options::{ExecOptions, IsolationLevel, TransactionRequest};
pub use params::{ParamValue, Params};
pub use policy::{CacheIdentity, CacheKeyProvider, FallbackStrategy, ReplicaConfig, RetryConfig};
pub use result::QueryResult;
