//! Replica routing middleware.

use crate::context::ExecutionContext;
use crate::error::{ErrorKind, ExecError, ExecResult};
use crate::models::policy::{FallbackStrategy, ReplicaConfig};
use crate::models::result::QueryResult;
use crate::pipeline::{Middleware, Next};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

/// Redirects queries to read replicas, with a configurable fallback chain.
///
/// Applies to queries only: replicas are assumed read-only, so a statement
/// carrying a [`ReplicaConfig`] is a logic error. Candidates are tried in
/// order by re-dispatching with the connection override substituted; a
/// connection, deadlock or isolation failure moves on to the next candidate,
/// anything else propagates immediately. When every candidate fails, the
/// *first* failure is returned.
pub struct ReplicaMiddleware {
    primary: String,
    replicas: Vec<String>,
    enabled: bool,
}

impl ReplicaMiddleware {
    /// Route across the given replica connections, falling back to `primary`
    /// where the strategy says so.
    pub fn new(
        primary: impl Into<String>,
        replicas: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            primary: primary.into(),
            replicas: replicas.into_iter().map(Into::into).collect(),
            enabled: true,
        }
    }

    /// Administratively disable replica routing; every call passes through.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Ordered candidate connections for one call.
    fn candidates(&self, config: &ReplicaConfig) -> ExecResult<Vec<String>> {
        if let Some(pinned) = &config.connection {
            if !self.replicas.contains(pinned) {
                return Err(ExecError::logic(format!(
                    "'{pinned}' is not a configured replica connection"
                )));
            }
        }

        let mut rng = rand::thread_rng();
        let one = |rng: &mut rand::rngs::ThreadRng| -> String {
            config.connection.clone().unwrap_or_else(|| {
                self.replicas
                    .choose(rng)
                    .cloned()
                    .unwrap_or_else(|| self.primary.clone())
            })
        };
        let all = |rng: &mut rand::rngs::ThreadRng| -> Vec<String> {
            let mut shuffled: Vec<String> = self
                .replicas
                .iter()
                .filter(|r| Some(*r) != config.connection.as_ref())
                .cloned()
                .collect();
            shuffled.shuffle(rng);
            match &config.connection {
                Some(pinned) => {
                    let mut ordered = vec![pinned.clone()];
                    ordered.extend(shuffled);
                    ordered
                }
                None => shuffled,
            }
        };

        Ok(match config.fallback {
            FallbackStrategy::None => vec![one(&mut rng)],
            FallbackStrategy::Primary => vec![one(&mut rng), self.primary.clone()],
            FallbackStrategy::Any => {
                let mut ordered = all(&mut rng);
                ordered.push(self.primary.clone());
                ordered
            }
            FallbackStrategy::Replicas => all(&mut rng),
        })
    }
}

fn is_failover_kind(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::Connection | ErrorKind::Deadlock | ErrorKind::Isolation
    )
}

#[async_trait]
impl Middleware for ReplicaMiddleware {
    async fn query(
        &self,
        ctx: &mut ExecutionContext,
        next: Next<'_>,
    ) -> ExecResult<QueryResult> {
        let Some(config) = ctx.require::<ReplicaConfig>()? else {
            return next.query(ctx).await;
        };
        if !self.enabled || self.replicas.is_empty() {
            return next.query(ctx).await;
        }

        let candidates = self.candidates(&config)?;
        debug!(candidates = ?candidates, "Replica candidate order");

        let snapshot = ctx.consumed_snapshot();
        let mut first_failure: Option<ExecError> = None;
        for (index, candidate) in candidates.iter().enumerate() {
            if index > 0 {
                ctx.restore_consumed(&snapshot);
            }
            ctx.set_connection_override(Some(candidate.clone()));
            match next.query(ctx).await {
                Ok(result) => return Ok(result),
                Err(err) if is_failover_kind(err.kind()) => {
                    warn!(
                        connection = %candidate,
                        error = %err,
                        "Replica candidate failed, trying next"
                    );
                    first_failure.get_or_insert(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(first_failure
            .unwrap_or_else(|| ExecError::runtime("replica routing produced no candidates")))
    }

    async fn statement(&self, ctx: &mut ExecutionContext, next: Next<'_>) -> ExecResult<u64> {
        if ctx.peek::<ReplicaConfig>().is_some() {
            return Err(ExecError::logic(
                "replica routing cannot apply to statements; replicas are read-only",
            ));
        }
        next.statement(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn middleware() -> ReplicaMiddleware {
        ReplicaMiddleware::new("p", ["r1", "r2"])
    }

    #[test]
    fn test_none_strategy_single_candidate() {
        let candidates = middleware()
            .candidates(&ReplicaConfig::new(FallbackStrategy::None))
            .unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0] == "r1" || candidates[0] == "r2");
    }

    #[test]
    fn test_primary_strategy_appends_primary() {
        let candidates = middleware()
            .candidates(&ReplicaConfig::new(FallbackStrategy::Primary))
            .unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates[0] == "r1" || candidates[0] == "r2");
        assert_eq!(candidates[1], "p");
    }

    #[test]
    fn test_any_strategy_covers_all_then_primary() {
        let candidates = middleware()
            .candidates(&ReplicaConfig::new(FallbackStrategy::Any))
            .unwrap();
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[2], "p");
        assert!(candidates[..2].contains(&"r1".to_string()));
        assert!(candidates[..2].contains(&"r2".to_string()));
    }

    #[test]
    fn test_replicas_strategy_excludes_primary() {
        let candidates = middleware()
            .candidates(&ReplicaConfig::new(FallbackStrategy::Replicas))
            .unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(!candidates.contains(&"p".to_string()));
    }

    #[test]
    fn test_pinned_replica_first() {
        let config = ReplicaConfig::new(FallbackStrategy::Any).with_connection("r2");
        let candidates = middleware().candidates(&config).unwrap();
        assert_eq!(candidates, vec!["r2", "r1", "p"]);
    }

    #[test]
    fn test_unknown_pin_rejected() {
        let config = ReplicaConfig::new(FallbackStrategy::None).with_connection("nope");
        assert!(middleware().candidates(&config).unwrap_err().is_logic());
    }

    #[test]
    fn test_failover_kinds() {
        assert!(is_failover_kind(ErrorKind::Connection));
        assert!(is_failover_kind(ErrorKind::Deadlock));
        assert!(is_failover_kind(ErrorKind::Isolation));
        assert!(!is_failover_kind(ErrorKind::Syntax));
        assert!(!is_failover_kind(ErrorKind::Logic));
        assert!(!is_failover_kind(ErrorKind::LockWaitTimeout));
    }
}
