//! Caller-facing executor and the multi-adapter transaction orchestrator.

use crate::adapter::{Adapter, TransactionHandle};
use crate::context::ExecutionContext;
use crate::error::{ExecError, ExecResult};
use crate::models::options::TransactionRequest;
use crate::models::result::QueryResult;
use crate::pipeline::{Middleware, Pipeline};
use crate::registry::AdapterRegistry;
use crate::scope::TransactionScope;
use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

/// One query/statement call: the source text plus its configuration objects.
///
/// ```ignore
/// executor.query(Call::new("SELECT * FROM users").with(RetryConfig::default())).await?;
/// ```
pub struct Call {
    ctx: ExecResult<ExecutionContext>,
}

impl Call {
    /// Start a call for the given source text.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            ctx: ExecutionContext::new(source),
        }
    }

    /// Attach a configuration object.
    pub fn with<T: Any + Send + Sync>(mut self, config: T) -> Self {
        self.ctx = self.ctx.map(|ctx| ctx.append(config));
        self
    }

    fn into_context(self, scope: Option<Arc<TransactionScope>>) -> ExecResult<ExecutionContext> {
        let ctx = self.ctx?;
        Ok(match scope {
            Some(scope) => ctx.with_scope(scope),
            None => ctx,
        })
    }
}

/// Executes queries, statements and transactions through the middleware
/// pipeline.
///
/// Cloning is cheap; a clone shares the registry and pipeline. An executor
/// handed to a transactional closure is bound to that transaction's scope.
#[derive(Clone)]
pub struct Executor {
    registry: Arc<AdapterRegistry>,
    pipeline: Arc<Pipeline>,
    scope: Option<Arc<TransactionScope>>,
}

impl Executor {
    /// Start building an executor over a registry.
    pub fn builder(registry: Arc<AdapterRegistry>) -> ExecutorBuilder {
        ExecutorBuilder {
            registry,
            middlewares: Vec::new(),
        }
    }

    /// The adapter registry behind this executor.
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Whether this executor is bound to an open transaction.
    pub fn in_transaction(&self) -> bool {
        self.scope.is_some()
    }

    /// Run a query through the pipeline.
    pub async fn query(&self, call: Call) -> ExecResult<QueryResult> {
        let mut ctx = call.into_context(self.scope.clone())?;
        self.pipeline.query(&mut ctx).await
    }

    /// Run a statement through the pipeline; returns the affected row count.
    pub async fn statement(&self, call: Call) -> ExecResult<u64> {
        let mut ctx = call.into_context(self.scope.clone())?;
        self.pipeline.statement(&mut ctx).await
    }

    /// Run `body` once inside a transaction spanning the requested
    /// connections (the default connection when no request is given).
    ///
    /// All transactions commit on success and roll back on failure as a
    /// unit. When a rollback itself fails the caller receives a
    /// rollback-aggregate error and must treat the affected connections as
    /// no longer trustworthy. Nested calls layer a child scope onto the
    /// executor handed to `body`.
    pub async fn transactional<T, F, Fut>(
        &self,
        requests: Vec<TransactionRequest>,
        body: F,
    ) -> ExecResult<T>
    where
        F: FnOnce(Executor) -> Fut,
        Fut: Future<Output = ExecResult<T>>,
    {
        let requests = if requests.is_empty() {
            vec![TransactionRequest::new()]
        } else {
            requests
        };

        // Resolve every adapter up front; one adapter must not be asked to
        // start two transactions in a single call.
        let mut seen: HashSet<String> = HashSet::new();
        let mut plan: Vec<(Arc<dyn Adapter>, TransactionRequest)> = Vec::new();
        for request in requests {
            let adapter = self.registry.resolve(request.connection.as_deref())?;
            if !seen.insert(adapter.name().to_string()) {
                return Err(ExecError::logic(format!(
                    "connection '{}' was requested twice in one transactional call",
                    adapter.name()
                )));
            }
            plan.push((adapter, request));
        }

        // Begin in request order; stop at the first failure.
        let mut begun: Vec<(Arc<dyn Adapter>, TransactionHandle)> = Vec::new();
        for (adapter, request) in &plan {
            match adapter.begin(Some(request)).await {
                Ok(handle) => {
                    info!(
                        transaction_id = %handle.id,
                        connection = %adapter.name(),
                        "Transaction started"
                    );
                    begun.push((adapter.clone(), handle));
                }
                Err(begin_err) => {
                    return Err(rollback_begun(begin_err, &begun).await);
                }
            }
        }

        let scope = TransactionScope::new(
            begun.iter().map(|(a, _)| a.name().to_string()).collect(),
            self.scope.clone(),
        )?;
        let scoped = Executor {
            registry: self.registry.clone(),
            pipeline: self.pipeline.clone(),
            scope: Some(scope),
        };

        match body(scoped).await {
            Ok(value) => {
                for (index, (adapter, handle)) in begun.iter().enumerate() {
                    if let Err(commit_err) = adapter.commit(handle).await {
                        // Earlier adapters stay committed; the failing one
                        // and everything after it is rolled back.
                        return Err(rollback_begun(commit_err, &begun[index..]).await);
                    }
                    info!(
                        transaction_id = %handle.id,
                        connection = %adapter.name(),
                        "Transaction committed"
                    );
                }
                Ok(value)
            }
            Err(body_err) => Err(rollback_begun(body_err, &begun).await),
        }
    }
}

/// Roll back every begun transaction, continuing past individual failures.
///
/// `original` is the triggering failure, captured before any rollback is
/// attempted; it comes back as-is when every rollback succeeds, wrapped in a
/// rollback aggregate otherwise.
async fn rollback_begun(
    original: ExecError,
    begun: &[(Arc<dyn Adapter>, TransactionHandle)],
) -> ExecError {
    let mut rollback_errors: Vec<ExecError> = Vec::new();
    for (adapter, handle) in begun {
        match adapter.rollback(handle).await {
            Ok(()) => info!(
                transaction_id = %handle.id,
                connection = %adapter.name(),
                "Transaction rolled back"
            ),
            Err(rollback_err) => {
                warn!(
                    transaction_id = %handle.id,
                    connection = %adapter.name(),
                    error = %rollback_err,
                    "Rollback failed"
                );
                rollback_errors.push(rollback_err);
            }
        }
    }
    if rollback_errors.is_empty() {
        original
    } else {
        ExecError::rollback_aggregate(original, rollback_errors)
    }
}

/// Builder assembling the middleware chain in front of the terminal stage.
pub struct ExecutorBuilder {
    registry: Arc<AdapterRegistry>,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl ExecutorBuilder {
    /// Append a middleware; stages run in the order they are added.
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    /// Append an already shared middleware.
    pub fn shared_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Build the executor.
    pub fn build(self) -> Executor {
        let pipeline = Pipeline::new(self.middlewares, self.registry.clone());
        Executor {
            registry: self.registry,
            pipeline: Arc::new(pipeline),
            scope: None,
        }
    }
}
