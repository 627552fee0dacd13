//! In-memory cache store backed by `DashMap`.

use super::{CacheSlot, CacheStore};
use crate::error::ExecResult;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::time::{Duration, Instant};

struct Entry {
    payload: Vec<u8>,
    inserted: Instant,
    ttl: Option<Duration>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| self.inserted.elapsed() >= ttl)
    }
}

/// Thread-safe in-memory store with per-entry TTL and a tag index.
///
/// Expired entries are lazily evicted on access and present as misses.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, Entry>,
    tags: DashMap<String, HashSet<String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn untag(&self, key: &str) {
        self.tags.retain(|_, keys| {
            keys.remove(key);
            !keys.is_empty()
        });
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.value().is_expired() {
                return Some(entry.value().payload.clone());
            }
            // Expired, drop the read guard before removing
            drop(entry);
            self.entries.remove(key);
            self.untag(key);
        }
        None
    }

    async fn save(&self, slot: &CacheSlot, payload: Vec<u8>) -> ExecResult<()> {
        self.entries.insert(
            slot.key.clone(),
            Entry {
                payload,
                inserted: Instant::now(),
                ttl: slot.ttl,
            },
        );
        for tag in &slot.tags {
            self.tags
                .entry(tag.clone())
                .or_default()
                .insert(slot.key.clone());
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> ExecResult<()> {
        self.entries.remove(key);
        self.untag(key);
        Ok(())
    }

    fn supports_tags(&self) -> bool {
        true
    }

    async fn invalidate_tag(&self, tag: &str) -> ExecResult<()> {
        if let Some((_, keys)) = self.tags.remove(tag) {
            for key in keys {
                self.entries.remove(&key);
            }
        }
        Ok(())
    }
}
