//! Slow-execution logging middleware.

use crate::context::ExecutionContext;
use crate::error::ExecResult;
use crate::models::result::QueryResult;
use crate::pipeline::{Middleware, Next};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::warn;

/// Emits a structured warning when a call takes at least the configured
/// threshold. Consumes no configuration objects and never alters the call.
pub struct SlowLogMiddleware {
    threshold: Duration,
}

impl SlowLogMiddleware {
    pub fn new(threshold: Duration) -> Self {
        Self { threshold }
    }

    fn observe(&self, ctx: &ExecutionContext, operation: &str, start: Instant) {
        let elapsed = start.elapsed();
        if elapsed >= self.threshold {
            warn!(
                operation,
                source = ctx.source(),
                connection = ctx.connection_override().unwrap_or("default"),
                elapsed_ms = elapsed.as_millis() as u64,
                threshold_ms = self.threshold.as_millis() as u64,
                "Slow execution"
            );
        }
    }
}

#[async_trait]
impl Middleware for SlowLogMiddleware {
    async fn query(
        &self,
        ctx: &mut ExecutionContext,
        next: Next<'_>,
    ) -> ExecResult<QueryResult> {
        let start = Instant::now();
        let result = next.query(ctx).await;
        self.observe(ctx, "query", start);
        result
    }

    async fn statement(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> ExecResult<u64> {
        let start = Instant::now();
        let result = next.statement(ctx).await;
        self.observe(ctx, "statement", start);
        result
    }
}
