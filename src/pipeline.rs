//! Middleware chain and terminal dispatch stage.
//!
//! A [`Pipeline`] is an ordered list of [`Middleware`] stages terminated by
//! the dispatch stage. Stages run in list order; return values and errors
//! propagate back in reverse. Each stage receives an explicit [`Next`]
//! continuation rather than capturing its successor in a closure, and `Next`
//! is `Copy` so retrying stages can re-invoke the remainder of the chain.

use crate::adapter::Adapter;
use crate::context::ExecutionContext;
use crate::error::{ExecError, ExecResult};
use crate::models::options::ExecOptions;
use crate::models::params::Params;
use crate::models::result::QueryResult;
use crate::registry::AdapterRegistry;
use crate::scope::ScopePolicy;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// One intercepting stage of the chain.
///
/// The default implementations pass straight through, so a middleware only
/// overrides the operations it cares about.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Intercept a query.
    async fn query(
        &self,
        ctx: &mut ExecutionContext,
        next: Next<'_>,
    ) -> ExecResult<QueryResult> {
        next.query(ctx).await
    }

    /// Intercept a statement.
    async fn statement(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> ExecResult<u64> {
        next.statement(ctx).await
    }
}

/// Continuation invoking the remainder of the chain.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
}

impl Next<'_> {
    /// Invoke the remaining stages for a query.
    pub async fn query(self, ctx: &mut ExecutionContext) -> ExecResult<QueryResult> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.query(ctx, Next { stages: rest }).await,
            None => Err(past_terminal()),
        }
    }

    /// Invoke the remaining stages for a statement.
    pub async fn statement(self, ctx: &mut ExecutionContext) -> ExecResult<u64> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.statement(ctx, Next { stages: rest }).await,
            None => Err(past_terminal()),
        }
    }
}

fn past_terminal() -> ExecError {
    ExecError::logic("a stage attempted to call past the terminal dispatch stage")
}

/// Composed middleware chain plus terminal stage for every operation.
pub struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    /// Build the chain: the given middlewares in order, then the terminal
    /// dispatch stage against the registry.
    pub fn new(middlewares: Vec<Arc<dyn Middleware>>, registry: Arc<AdapterRegistry>) -> Self {
        let mut stages = middlewares;
        stages.push(Arc::new(TerminalStage::new(registry)) as Arc<dyn Middleware>);
        Self { stages }
    }

    /// Build from raw stages without appending a terminal. The caller is
    /// responsible for terminating the chain; an unterminated chain fails
    /// with a logic error at the end of traversal.
    pub fn from_stages(stages: Vec<Arc<dyn Middleware>>) -> Self {
        Self { stages }
    }

    /// Run a query through the chain.
    pub async fn query(&self, ctx: &mut ExecutionContext) -> ExecResult<QueryResult> {
        Next {
            stages: &self.stages,
        }
        .query(ctx)
        .await
    }

    /// Run a statement through the chain.
    pub async fn statement(&self, ctx: &mut ExecutionContext) -> ExecResult<u64> {
        Next {
            stages: &self.stages,
        }
        .statement(ctx)
        .await
    }
}

/// Final stage: validates the context, enforces the transactional scope and
/// dispatches to the resolved adapter. Never invokes its continuation.
pub struct TerminalStage {
    registry: Arc<AdapterRegistry>,
}

impl TerminalStage {
    pub fn new(registry: Arc<AdapterRegistry>) -> Self {
        Self { registry }
    }

    /// Consume the dispatch configurations, check depletion and scope, and
    /// resolve the target adapter.
    fn prepare(
        &self,
        ctx: &mut ExecutionContext,
    ) -> ExecResult<(Arc<dyn Adapter>, Option<Arc<Params>>, Option<Arc<ExecOptions>>)> {
        let options = ctx.require::<ExecOptions>()?;
        let params = ctx.require::<Params>()?;

        if !ctx.depleted() {
            return Err(ExecError::logic(format!(
                "unconsumed configuration at dispatch: {}",
                ctx.unused().join(", ")
            )));
        }

        let policy = options
            .as_deref()
            .map(ExecOptions::effective_scope_policy)
            .unwrap_or(ScopePolicy::Strict);
        let connection = ctx
            .connection_override()
            .map(str::to_string)
            .or_else(|| options.as_deref().and_then(|o| o.connection.clone()))
            .unwrap_or_else(|| self.registry.default_connection().to_string());

        if let Some(scope) = ctx.scope() {
            if !scope.accepts(&connection, policy) {
                return Err(ExecError::logic(format!(
                    "connection '{connection}' is not usable in the active transactional scope under policy {policy:?}"
                )));
            }
        }

        let adapter = self.registry.resolve(Some(&connection))?;
        Ok((adapter, params, options))
    }
}

#[async_trait]
impl Middleware for TerminalStage {
    async fn query(
        &self,
        ctx: &mut ExecutionContext,
        _next: Next<'_>,
    ) -> ExecResult<QueryResult> {
        let (adapter, params, options) = self.prepare(ctx)?;
        debug!(
            connection = adapter.name(),
            source = ctx.source(),
            "Dispatching query"
        );
        adapter
            .query(ctx.source(), params.as_deref(), options.as_deref())
            .await
    }

    async fn statement(&self, ctx: &mut ExecutionContext, _next: Next<'_>) -> ExecResult<u64> {
        let (adapter, params, options) = self.prepare(ctx)?;
        debug!(
            connection = adapter.name(),
            source = ctx.source(),
            "Dispatching statement"
        );
        adapter
            .statement(ctx.source(), params.as_deref(), options.as_deref())
            .await
    }
}
