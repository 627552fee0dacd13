//! Retry-with-backoff middleware.

use crate::context::ExecutionContext;
use crate::error::{ExecError, ExecResult};
use crate::models::policy::RetryConfig;
use crate::models::result::QueryResult;
use crate::pipeline::{Middleware, Next};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Retries the rest of the chain on catchable failures, with a linear-ramp
/// delay between attempts.
///
/// Retrying inside an open transactional scope is rejected unless the
/// configuration opts in: earlier statements of the transaction already had
/// side effects a blind retry would duplicate. When the attempt budget is
/// exhausted the *first* caught failure is returned, so callers see the
/// originally triggering condition.
///
/// The query and statement paths are intentionally parallel.
#[derive(Debug, Default)]
pub struct RetryMiddleware;

impl RetryMiddleware {
    pub fn new() -> Self {
        Self
    }

    fn config_for(ctx: &mut ExecutionContext) -> ExecResult<Option<Arc<RetryConfig>>> {
        let Some(config) = ctx.require::<RetryConfig>()? else {
            return Ok(None);
        };
        if ctx.scope().is_some() && !config.allow_in_transaction {
            return Err(ExecError::logic(
                "retrying inside an open transaction duplicates committed side effects; \
                 set allow_in_transaction to override",
            ));
        }
        Ok(Some(config))
    }

    fn exhausted(first_caught: Option<ExecError>) -> ExecError {
        // max_attempts is clamped to >= 1, so at least one attempt ran
        first_caught
            .unwrap_or_else(|| ExecError::runtime("retry loop finished without an attempt"))
    }
}

#[async_trait]
impl Middleware for RetryMiddleware {
    async fn query(
        &self,
        ctx: &mut ExecutionContext,
        next: Next<'_>,
    ) -> ExecResult<QueryResult> {
        let Some(config) = Self::config_for(ctx)? else {
            return next.query(ctx).await;
        };

        let snapshot = ctx.consumed_snapshot();
        let mut first_caught: Option<ExecError> = None;
        for attempt in 1..=config.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(config.delay(attempt - 1)).await;
                ctx.restore_consumed(&snapshot);
            }
            match next.query(ctx).await {
                Ok(result) => return Ok(result),
                Err(err) if config.catches(err.kind()) => {
                    warn!(
                        attempt,
                        max_attempts = config.max_attempts,
                        error = %err,
                        "Query attempt failed, will retry"
                    );
                    first_caught.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(Self::exhausted(first_caught))
    }

    async fn statement(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> ExecResult<u64> {
        let Some(config) = Self::config_for(ctx)? else {
            return next.statement(ctx).await;
        };

        let snapshot = ctx.consumed_snapshot();
        let mut first_caught: Option<ExecError> = None;
        for attempt in 1..=config.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(config.delay(attempt - 1)).await;
                ctx.restore_consumed(&snapshot);
            }
            match next.statement(ctx).await {
                Ok(count) => return Ok(count),
                Err(err) if config.catches(err.kind()) => {
                    warn!(
                        attempt,
                        max_attempts = config.max_attempts,
                        error = %err,
                        "Statement attempt failed, will retry"
                    );
                    first_caught.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(Self::exhausted(first_caught))
    }
}
