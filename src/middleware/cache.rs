//! Cache-aside middleware.

use crate::cache::{CacheDecision, CacheSlot, CacheStore};
use crate::context::ExecutionContext;
use crate::error::{ExecError, ExecResult};
use crate::models::policy::{CacheIdentity, CacheKeyProvider};
use crate::models::result::QueryResult;
use crate::pipeline::{Middleware, Next};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Checks the cache before running a query and populates it after, driven by
/// the identity's resolver.
///
/// Applies to queries only; a statement carrying a cache identity (or a key
/// provider) is a logic error. The identity comes either directly from a
/// [`CacheIdentity`] in the context or from a [`CacheKeyProvider`] applied to
/// the source text; with neither present the call passes through.
pub struct CacheMiddleware {
    store: Arc<dyn CacheStore>,
}

impl CacheMiddleware {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Delete the given keys outright and invalidate the given tags.
    ///
    /// Tag invalidation needs store support; an unsupported-operation error
    /// is returned (after the keys were deleted) when the store has none.
    pub async fn invalidate(&self, keys: &[String], tags: &[String]) -> ExecResult<()> {
        for key in keys {
            self.store.delete(key).await?;
        }
        if !tags.is_empty() {
            if !self.store.supports_tags() {
                return Err(ExecError::unsupported(
                    "tag-based invalidation on the configured cache store",
                ));
            }
            for tag in tags {
                self.store.invalidate_tag(tag).await?;
            }
        }
        Ok(())
    }

    /// Resolve the call's cache identity, consuming whichever configuration
    /// supplied it.
    fn identity_for(ctx: &mut ExecutionContext) -> ExecResult<Option<CacheIdentity>> {
        if let Some(identity) = ctx.require::<CacheIdentity>()? {
            return Ok(Some((*identity).clone()));
        }
        if let Some(provider) = ctx.require::<CacheKeyProvider>()? {
            return Ok(Some(provider.identity_for(ctx.source())));
        }
        Ok(None)
    }
}

#[async_trait]
impl Middleware for CacheMiddleware {
    async fn query(
        &self,
        ctx: &mut ExecutionContext,
        next: Next<'_>,
    ) -> ExecResult<QueryResult> {
        let Some(identity) = Self::identity_for(ctx)? else {
            return next.query(ctx).await;
        };

        if let Some(payload) = self.store.get(&identity.key).await {
            debug!(key = %identity.key, "Cache hit");
            return serde_json::from_slice(&payload).map_err(|err| {
                ExecError::runtime(format!(
                    "failed to decode cached result for key '{}': {err}",
                    identity.key
                ))
            });
        }
        debug!(key = %identity.key, "Cache miss");

        let result = next.query(ctx).await?;
        if !result.cacheable {
            return Err(ExecError::logic(format!(
                "result for cache key '{}' does not support caching; produce a serializable result",
                identity.key
            )));
        }

        let mut slot = CacheSlot {
            key: identity.key.clone(),
            ttl: identity.ttl,
            tags: identity.tags.clone(),
        };
        match identity.resolve(&mut slot, &result) {
            CacheDecision::Persist => {
                let payload = serde_json::to_vec(&result).map_err(|err| {
                    ExecError::runtime(format!(
                        "failed to encode result for cache key '{}': {err}",
                        slot.key
                    ))
                })?;
                self.store.save(&slot, payload).await?;
                debug!(key = %slot.key, "Cache slot persisted");
            }
            CacheDecision::Discard => {
                self.store.delete(&slot.key).await?;
                debug!(key = %slot.key, "Cache slot discarded by resolver");
            }
        }
        Ok(result)
    }

    async fn statement(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> ExecResult<u64> {
        if ctx.peek::<CacheIdentity>().is_some() || ctx.peek::<CacheKeyProvider>().is_some() {
            return Err(ExecError::logic(
                "statements cannot be cached; cache identities apply to queries only",
            ));
        }
        next.statement(ctx).await
    }
}
