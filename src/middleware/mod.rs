//! Cross-cutting policy middlewares.
//!
//! Each middleware looks up at most one configuration object of its own type
//! in the execution context; a call without that configuration passes through
//! unchanged.

mod cache;
mod replica;
mod retry;
mod slow_log;

pub use cache::CacheMiddleware;
pub use replica::ReplicaMiddleware;
pub use retry::RetryMiddleware;
pub use slow_log::SlowLogMiddleware;
