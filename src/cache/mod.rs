//! Cache store abstraction and the bundled in-memory implementation.

mod memory;

pub use memory::MemoryCacheStore;

use crate::error::ExecResult;
use async_trait::async_trait;
use std::time::Duration;

/// Explicit persistence decision returned by a cache resolver.
///
/// A deliberate control decision, not an error: `Discard` evicts the
/// just-created slot (e.g. a resolver that refuses to cache empty results).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// Persist the slot.
    Persist,
    /// Delete the slot instead of persisting it.
    Discard,
}

/// Mutable view of the slot a resolver may adjust before persistence.
#[derive(Debug, Clone)]
pub struct CacheSlot {
    pub key: String,
    pub ttl: Option<Duration>,
    pub tags: Vec<String>,
}

impl CacheSlot {
    /// Create a slot for the given key.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl: None,
            tags: Vec::new(),
        }
    }

    /// Expire the slot after the given duration.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Attach a tag for tag-based invalidation.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// Pluggable cache backend.
///
/// Implement this to swap the bundled in-memory store for Redis, Memcached,
/// etc. Stores without tag support report `supports_tags() == false` and
/// never receive `invalidate_tag` calls from the middleware.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch the stored payload; `None` is a miss (including lazy expiry).
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Persist a payload under the slot's key, ttl and tags.
    async fn save(&self, slot: &CacheSlot, payload: Vec<u8>) -> ExecResult<()>;

    /// Delete a single key.
    async fn delete(&self, key: &str) -> ExecResult<()>;

    /// Whether this store can invalidate by tag.
    fn supports_tags(&self) -> bool {
        false
    }

    /// Delete every key carrying the tag. Only called when
    /// [`supports_tags`](CacheStore::supports_tags) is true.
    async fn invalidate_tag(&self, tag: &str) -> ExecResult<()>;
}
