//! Configurations for the policy middlewares.
//!
//! Each of these is picked out of the [`ExecutionContext`](crate::context::ExecutionContext)
//! by exactly one middleware per call.

use crate::cache::{CacheDecision, CacheSlot};
use crate::error::ErrorKind;
use crate::models::result::QueryResult;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default number of attempts when retrying.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Retry-with-backoff configuration.
///
/// The delay before attempt `n + 1` is `delay(n)`, a linear-plus-multiplier
/// ramp over the base delay. `allow_in_transaction` must be set explicitly to
/// retry inside an open transactional scope; a blind retry there would replay
/// only part of the transaction's side effects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub base_delay: Duration,
    pub max_attempts: u32,
    pub multiplier: u32,
    #[serde(default)]
    pub allow_in_transaction: bool,
    /// Failure kinds to catch; deadlock and lock-wait-timeout when unset.
    #[serde(default)]
    pub catch: Option<Vec<ErrorKind>>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(10),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            multiplier: 1,
            allow_in_transaction: false,
            catch: None,
        }
    }
}

impl RetryConfig {
    /// Create a config with the given base delay and attempt budget.
    ///
    /// `max_attempts` and the multiplier are clamped to at least 1.
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts: max_attempts.max(1),
            multiplier: 1,
            ..Self::default()
        }
    }

    /// Set the backoff multiplier (clamped to at least 1).
    pub fn with_multiplier(mut self, multiplier: u32) -> Self {
        self.multiplier = multiplier.max(1);
        self
    }

    /// Permit retrying inside an open transactional scope.
    pub fn allow_in_transaction(mut self) -> Self {
        self.allow_in_transaction = true;
        self
    }

    /// Replace the default catchable kinds.
    pub fn with_catch(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.catch = Some(kinds.into_iter().collect());
        self
    }

    /// Delay scheduled after the `n`-th failed attempt (1-indexed):
    /// `base * n + base * multiplier * (n - 1)`.
    pub fn delay(&self, n: u32) -> Duration {
        self.base_delay * n + self.base_delay * self.multiplier * n.saturating_sub(1)
    }

    /// Whether a failure of this kind should be caught and retried.
    ///
    /// `Logic` failures are never caught, even when listed.
    pub fn catches(&self, kind: ErrorKind) -> bool {
        if kind == ErrorKind::Logic {
            return false;
        }
        match &self.catch {
            Some(kinds) => kinds.contains(&kind),
            None => matches!(kind, ErrorKind::Deadlock | ErrorKind::LockWaitTimeout),
        }
    }
}

/// Fallback strategy for replica candidate selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    /// One replica, no fallback
    #[default]
    None,
    /// All replicas in random order, then the primary
    Any,
    /// One replica, then the primary
    Primary,
    /// All replicas in random order, no primary
    Replicas,
}

/// Per-call replica routing configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// Preferred replica; picked at random from the set when unset.
    #[serde(default)]
    pub connection: Option<String>,
    #[serde(default)]
    pub fallback: FallbackStrategy,
}

impl ReplicaConfig {
    /// Create a config with the given fallback strategy.
    pub fn new(fallback: FallbackStrategy) -> Self {
        Self {
            connection: None,
            fallback,
        }
    }

    /// Pin a specific replica connection.
    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = Some(connection.into());
        self
    }
}

/// Resolver deciding whether a produced result should be persisted.
pub type CacheResolver = dyn Fn(&mut CacheSlot, &QueryResult) -> CacheDecision + Send + Sync;

/// Cache identity for one call: the slot key plus the persistence decision.
#[derive(Clone)]
pub struct CacheIdentity {
    pub key: String,
    pub ttl: Option<Duration>,
    pub tags: Vec<String>,
    resolver: Option<Arc<CacheResolver>>,
}

impl CacheIdentity {
    /// Identify the cache slot for this call.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ttl: None,
            tags: Vec::new(),
            resolver: None,
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

    /// Decide persistence after seeing the produced result. Without a
    /// resolver every result is persisted.
    pub fn with_resolver(
        mut self,
        resolver: impl Fn(&mut CacheSlot, &QueryResult) -> CacheDecision + Send + Sync + 'static,
    ) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Run the resolver against the slot, defaulting to persist.
    pub fn resolve(&self, slot: &mut CacheSlot, result: &QueryResult) -> CacheDecision {
        match &self.resolver {
            Some(resolver) => resolver(slot, result),
            None => CacheDecision::Persist,
        }
    }
}

impl std::fmt::Debug for CacheIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheIdentity")
            .field("key", &self.key)
            .field("ttl", &self.ttl)
            .field("tags", &self.tags)
            .field("resolver", &self.resolver.as_ref().map(|_| "fn"))
            .finish()
    }
}

/// Identity-producing configuration: derives a [`CacheIdentity`] from the
/// call's source text when no direct identity was supplied.
#[derive(Clone)]
pub struct CacheKeyProvider {
    build: Arc<dyn Fn(&str) -> CacheIdentity + Send + Sync>,
}

impl CacheKeyProvider {
    /// Build identities from source text.
    pub fn new(build: impl Fn(&str) -> CacheIdentity + Send + Sync + 'static) -> Self {
        Self {
            build: Arc::new(build),
        }
    }

    /// Produce the identity for the given source text.
    pub fn identity_for(&self, source: &str) -> CacheIdentity {
        (self.build)(source)
    }
}

impl std::fmt::Debug for CacheKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheKeyProvider").finish_non_exhaustive()
    }
}
