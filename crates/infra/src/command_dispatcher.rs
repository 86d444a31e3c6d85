//! Command dispatch: routes an [`ApprovedCommand`] to the handler for its
//! target.
//!
//! ```text
//! ApprovedCommand
//!   ↓
//! 1. Look up handler by target (none → failure outcome)
//!   ↓
//! 2. Run handler, bounded by the request deadline and cancellation
//!   ↓
//! 3. Map every handler error or panic to a failure outcome
//! ```
//!
//! Dispatch never returns an error: the caller always gets an
//! [`ExecutionOutcome`] plus the command as the handler left it.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;
use tracing::{debug, warn};

use sovereign_ai::RequestContext;
use sovereign_commands::{Command, ExecutionOutcome, Target};

use crate::jobs::JobStoreError;
use crate::store::StoreError;
use crate::validator::ApprovedCommand;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not enqueue job: {0}")]
    Job(#[from] JobStoreError),

    #[error("missing required payload field: {0}")]
    MissingField(&'static str),

    #[error("handler timed out after {0:?}")]
    Timeout(Duration),

    #[error("execution cancelled by caller")]
    Cancelled,
}

/// Performs the side effects for one target.
#[async_trait]
pub trait ExecutionHandler: Send + Sync {
    fn target(&self) -> Target;

    /// Execute `command`. Handlers may enrich the payload (e.g. with a
    /// generated id); the enriched command is reported back to the caller.
    async fn execute(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError>;
}

/// Target → handler table.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<Target, Arc<dyn ExecutionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for its target, returning any handler it replaced.
    pub fn register(&mut self, handler: Arc<dyn ExecutionHandler>) -> Option<Arc<dyn ExecutionHandler>> {
        self.handlers.insert(handler.target(), handler)
    }

    pub fn with(mut self, handler: Arc<dyn ExecutionHandler>) -> Self {
        self.register(handler);
        self
    }

    pub fn get(&self, target: Target) -> Option<&Arc<dyn ExecutionHandler>> {
        self.handlers.get(&target)
    }

    /// Registered targets in declaration order.
    pub fn targets(&self) -> Vec<Target> {
        Target::ALL
            .iter()
            .copied()
            .filter(|t| self.handlers.contains_key(t))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl core::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("targets", &self.targets())
            .finish()
    }
}

/// What dispatch produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub outcome: ExecutionOutcome,
    /// The command after the handler ran (payload may be enriched).
    pub command: Command,
}

#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    registry: HandlerRegistry,
}

impl CommandDispatcher {
    pub fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    pub async fn dispatch(&self, mut command: ApprovedCommand, ctx: &RequestContext) -> DispatchReport {
        let target = command.target();
        let action = command.action();

        let Some(handler) = self.registry.get(target).cloned() else {
            warn!(%target, "no handler registered");
            return DispatchReport {
                outcome: ExecutionOutcome::failure(format!(
                    "execution not implemented for target: {target}"
                )),
                command: command.into_command(),
            };
        };

        debug!(%action, %target, "dispatching command");
        let outcome = {
            let run = AssertUnwindSafe(handler.execute(&mut command)).catch_unwind();
            let bounded = async {
                match ctx.timeout {
                    Some(limit) => tokio::time::timeout(limit, run)
                        .await
                        .map_err(|_| ExecutionError::Timeout(limit)),
                    None => Ok(run.await),
                }
            };

            let result = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => Err(ExecutionError::Cancelled),
                result = bounded => result,
            };

            match result {
                Ok(Ok(Ok(outcome))) => outcome,
                Ok(Ok(Err(err))) => {
                    warn!(%action, %target, error = %err, "handler failed");
                    ExecutionOutcome::failure(format!("execution failed: {err}"))
                }
                Ok(Err(panic)) => {
                    let message = panic_message(panic.as_ref());
                    warn!(%action, %target, panic = %message, "handler panicked");
                    ExecutionOutcome::failure(format!("execution failed: handler panicked: {message}"))
                }
                Err(err) => {
                    warn!(%action, %target, error = %err, "handler did not complete");
                    ExecutionOutcome::failure(format!("execution failed: {err}"))
                }
            }
        };

        DispatchReport {
            outcome,
            command: command.into_command(),
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use sovereign_commands::{Action, CommandMetadata, Payload};
    use sovereign_core::CallerId;

    struct Echo(Target);

    #[async_trait]
    impl ExecutionHandler for Echo {
        fn target(&self) -> Target {
            self.0
        }

        async fn execute(&self, command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
            command.payload_mut().insert("handled", json!(true));
            Ok(ExecutionOutcome::success(format!("{} handled", command.target())))
        }
    }

    struct Failing;

    #[async_trait]
    impl ExecutionHandler for Failing {
        fn target(&self) -> Target {
            Target::Bid
        }

        async fn execute(&self, _command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
            Err(ExecutionError::MissingField("bidId"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl ExecutionHandler for Panicking {
        fn target(&self) -> Target {
            Target::Bid
        }

        async fn execute(&self, _command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
            panic!("ledger exploded")
        }
    }

    struct Slow;

    #[async_trait]
    impl ExecutionHandler for Slow {
        fn target(&self) -> Target {
            Target::Bid
        }

        async fn execute(&self, _command: &mut ApprovedCommand) -> Result<ExecutionOutcome, ExecutionError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(ExecutionOutcome::success("late"))
        }
    }

    fn approved(target: Target) -> ApprovedCommand {
        ApprovedCommand::new(Command::new(
            Action::Read,
            target,
            Payload::new(),
            CommandMetadata::new(CallerId::new("u"), None, Utc::now(), "test"),
        ))
    }

    fn dispatcher(handler: Arc<dyn ExecutionHandler>) -> CommandDispatcher {
        CommandDispatcher::new(HandlerRegistry::new().with(handler))
    }

    #[tokio::test]
    async fn routes_by_target_and_returns_enriched_command() {
        let report = dispatcher(Arc::new(Echo(Target::Bid)))
            .dispatch(approved(Target::Bid), &RequestContext::new())
            .await;
        assert!(report.outcome.success);
        assert_eq!(report.outcome.message, "BID handled");
        assert_eq!(report.command.payload.get("handled"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn unregistered_target_is_a_failure_outcome() {
        let report = dispatcher(Arc::new(Echo(Target::Bid)))
            .dispatch(approved(Target::Trade), &RequestContext::new())
            .await;
        assert!(!report.outcome.success);
        assert_eq!(report.outcome.message, "execution not implemented for target: TRADE");
    }

    #[tokio::test]
    async fn handler_errors_become_failure_outcomes() {
        let report = dispatcher(Arc::new(Failing))
            .dispatch(approved(Target::Bid), &RequestContext::new())
            .await;
        assert!(!report.outcome.success);
        assert!(report.outcome.message.starts_with("execution failed"));
        assert!(report.outcome.message.contains("bidId"));
    }

    #[tokio::test]
    async fn handler_panics_are_contained() {
        let report = dispatcher(Arc::new(Panicking))
            .dispatch(approved(Target::Bid), &RequestContext::new())
            .await;
        assert!(!report.outcome.success);
        assert!(report.outcome.message.contains("ledger exploded"));
    }

    #[tokio::test]
    async fn deadline_bounds_the_handler() {
        let ctx = RequestContext::new().with_timeout(Duration::from_millis(50));
        let report = dispatcher(Arc::new(Slow)).dispatch(approved(Target::Bid), &ctx).await;
        assert!(!report.outcome.success);
        assert!(report.outcome.message.contains("timed out"));
    }

    #[tokio::test]
    async fn cancellation_stops_the_handler() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = RequestContext::new().with_cancellation(cancel);
        let report = dispatcher(Arc::new(Slow)).dispatch(approved(Target::Bid), &ctx).await;
        assert!(!report.outcome.success);
        assert!(report.outcome.message.contains("cancelled"));
    }

    #[test]
    fn registering_twice_replaces_the_handler() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.register(Arc::new(Echo(Target::Bid))).is_none());
        assert!(registry.register(Arc::new(Failing)).is_some());
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.targets(), vec![Target::Bid]);
    }
}
