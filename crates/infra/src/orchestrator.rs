//! End-to-end intent processing.
//!
//! ```text
//! intent ─▶ synthesize ─▶ generate ─▶ validate ─▶ dispatch ─▶ result
//!              │                          │            │
//!              ▼                          ▼            ▼
//!           failed                    rejected   succeeded/failed
//! ```
//!
//! Every transition appends one [`PhaseRecord`](sovereign_commands::PhaseRecord)
//! to the request's trace. Cancellation is checked before each phase, and
//! the network-bound phases (generate, validate, dispatch) are bounded by the
//! request deadline and aborted on cancellation. A panic anywhere in the
//! pipeline becomes an `orchestration_error` record instead of escaping to
//! the caller.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use serde_json::{Value as JsonValue, json};
use tracing::{Instrument, debug, info, info_span, warn};

use sovereign_ai::{CommandGenerator, PromptSynthesizer, RequestContext};
use sovereign_commands::{
    Command, ExecutionOutcome, OrchestrationTrace, Phase, RawCommand, ValidationResult,
};
use sovereign_core::{CallerId, OrganizationId};

use crate::command_dispatcher::{CommandDispatcher, panic_message};
use crate::journal::{ExecutionJournal, JournalEntry};
use crate::validator::{Validator, Verdict};

/// What the caller gets back for one intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResult {
    pub success: bool,
    pub message: String,
    pub trace: OrchestrationTrace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The command as last seen by the pipeline (enriched after dispatch).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionOutcome>,
}

/// Everything but the trace, which the caller owns.
#[derive(Default)]
struct Conclusion {
    success: bool,
    message: String,
    error: Option<String>,
    command: Option<Command>,
    validation: Option<ValidationResult>,
    execution: Option<ExecutionOutcome>,
}

impl Conclusion {
    fn failed(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

const CANCELLED: &str = "request cancelled by caller";

pub struct Orchestrator {
    synthesizer: PromptSynthesizer,
    generator: CommandGenerator,
    validator: Validator,
    dispatcher: CommandDispatcher,
    journal: Option<Arc<dyn ExecutionJournal>>,
}

impl Orchestrator {
    pub fn new(generator: CommandGenerator, validator: Validator, dispatcher: CommandDispatcher) -> Self {
        Self {
            synthesizer: PromptSynthesizer::new(),
            generator,
            validator,
            dispatcher,
            journal: None,
        }
    }

    pub fn with_journal(mut self, journal: Arc<dyn ExecutionJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Run one intent through the whole pipeline.
    ///
    /// Never fails outward: every failure is described by the result and
    /// its trace.
    pub async fn process_user_intent(
        &self,
        intent: &str,
        caller: &CallerId,
        organization_id: Option<OrganizationId>,
        ctx: &RequestContext,
    ) -> OrchestrationResult {
        let span = info_span!(
            "process_intent",
            caller = %caller,
            organization = ?organization_id.map(OrganizationId::get),
        );

        let mut trace = OrchestrationTrace::new(intent);
        let run = AssertUnwindSafe(
            self.run(intent, caller, organization_id, ctx, &mut trace)
                .instrument(span.clone()),
        )
        .catch_unwind()
        .await;

        let conclusion = match run {
            Ok(conclusion) => conclusion,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                span.in_scope(|| warn!(panic = %message, "orchestration panicked"));
                trace.record_failure(Phase::OrchestrationError, JsonValue::Null, message.clone());
                Conclusion::failed("Orchestration failed", message)
            }
        };

        span.in_scope(|| {
            info!(
                success = conclusion.success,
                phases = trace.len(),
                message = %conclusion.message,
                "intent processed"
            )
        });

        OrchestrationResult {
            success: conclusion.success,
            message: conclusion.message,
            trace,
            error: conclusion.error,
            command: conclusion.command,
            validation: conclusion.validation,
            execution: conclusion.execution,
        }
    }

    async fn run(
        &self,
        intent: &str,
        caller: &CallerId,
        organization_id: Option<OrganizationId>,
        ctx: &RequestContext,
        trace: &mut OrchestrationTrace,
    ) -> Conclusion {
        if let Some(cancelled) = cancelled(ctx, trace) {
            return cancelled;
        }

        let prompt = match self.synthesizer.synthesize(intent, caller, organization_id) {
            Ok(prompt) => {
                debug!(chars = prompt.text.len(), "prompt synthesized");
                trace.record_success(
                    Phase::Synthesize,
                    json!({ "promptLength": prompt.text.len(), "context": prompt.context }),
                );
                prompt
            }
            Err(err) => {
                trace.record_failure(Phase::Synthesize, JsonValue::Null, err.to_string());
                return Conclusion::failed("Could not build a prompt for the request", err.to_string());
            }
        };

        if let Some(cancelled) = cancelled(ctx, trace) {
            return cancelled;
        }

        let generation = self.generator.generate(&prompt, ctx).await;
        let fallback = generation.fallback.as_ref().map(ToString::to_string);
        trace.record_success(
            Phase::Generate,
            json!({ "command": generation.command, "fallback": fallback }),
        );
        let raw = generation.command;

        if let Some(cancelled) = cancelled(ctx, trace) {
            return cancelled;
        }

        let validation = self.validator.validate(raw.clone(), caller);
        let bounded = async {
            match ctx.timeout {
                Some(limit) => tokio::time::timeout(limit, validation).await.map_err(|_| limit),
                None => Ok(validation.await),
            }
        };
        let verdict = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => {
                trace.record_failure(Phase::Cancelled, JsonValue::Null, CANCELLED);
                return Conclusion::failed("Request cancelled", CANCELLED);
            }
            verdict = bounded => match verdict {
                Ok(verdict) => verdict,
                Err(limit) => {
                    let error = format!("validation timed out after {limit:?}");
                    warn!(%error, "validation did not complete");
                    trace.record_failure(Phase::Validate, JsonValue::Null, error.clone());
                    return Conclusion::failed("Validation could not complete", error);
                }
            },
        };
        let validation = verdict.result().clone();
        let approved = match verdict {
            Verdict::Approved { command, .. } => {
                trace.record_success(Phase::Validate, json!(validation));
                command
            }
            Verdict::Rejected { command, .. } => {
                trace.record_failure(Phase::Validate, json!(validation), validation.reason.clone());
                let journaled = command.clone().map(RawCommand::from).unwrap_or(raw);
                self.journal(JournalEntry::rejected(intent, caller.clone(), journaled, validation.clone()))
                    .await;
                return Conclusion {
                    success: false,
                    message: format!("Validation failed: {}", validation.reason),
                    error: Some(validation.reason.clone()),
                    command,
                    validation: Some(validation),
                    execution: None,
                };
            }
        };

        if let Some(mut cancelled) = cancelled(ctx, trace) {
            cancelled.command = Some(approved.into_command());
            cancelled.validation = Some(validation);
            return cancelled;
        }

        let report = self.dispatcher.dispatch(approved, ctx).await;
        let outcome = report.outcome;
        let output = json!({ "outcome": outcome, "command": report.command });
        if outcome.success {
            trace.record_success(Phase::Dispatch, output);
        } else {
            trace.record_failure(Phase::Dispatch, output, outcome.message.clone());
        }

        self.journal(JournalEntry::dispatched(
            intent,
            caller.clone(),
            RawCommand::from(report.command.clone()),
            validation.clone(),
            outcome.clone(),
        ))
        .await;

        Conclusion {
            success: outcome.success,
            message: outcome.message.clone(),
            error: (!outcome.success).then(|| outcome.message.clone()),
            command: Some(report.command),
            validation: Some(validation),
            execution: Some(outcome),
        }
    }

    async fn journal(&self, entry: JournalEntry) {
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.record(entry).await {
                warn!(error = %err, "journal write failed; continuing");
            }
        }
    }
}

/// Record the cancellation and conclude, if the caller has cancelled.
fn cancelled(ctx: &RequestContext, trace: &mut OrchestrationTrace) -> Option<Conclusion> {
    if !ctx.is_cancelled() {
        return None;
    }
    trace.record_failure(Phase::Cancelled, JsonValue::Null, CANCELLED);
    Some(Conclusion::failed("Request cancelled", CANCELLED))
}
