//! Command generation: prompt -> completion service -> [`RawCommand`].
//!
//! Generation never fails outward. Transport errors, timeouts, cancellation
//! and unparsable replies all resolve to the fallback command
//! (`PROCESS` / `SYSTEM_STATUS` / `{ intent }`), and the reason is reported
//! alongside it so the caller can trace it.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, warn};

use sovereign_commands::{Action, Command, Payload, RawCommand, Target};

use crate::completion::{CompletionError, CompletionService};
use crate::context::RequestContext;
use crate::prompt::{PromptContext, SynthesizedPrompt};

/// Why the fallback command was substituted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationFailure {
    #[error("completion service failed: {0}")]
    Transport(#[from] CompletionError),

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("generation cancelled by caller")]
    Cancelled,

    #[error("reply could not be parsed as a command: {0}")]
    Unparsable(String),
}

/// Result of one generation attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub command: RawCommand,
    /// Set when `command` is the fallback.
    pub fallback: Option<GenerationFailure>,
}

impl Generation {
    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

/// Deterministic fallback for a prompt context.
///
/// Identical contexts always yield identical commands, however often
/// generation is retried.
pub fn fallback_command(ctx: &PromptContext) -> Command {
    let mut payload = Payload::new();
    payload.insert("intent", JsonValue::String(ctx.intent.clone()));
    Command::new(Action::Process, Target::SystemStatus, payload, ctx.metadata())
}

/// Extract the JSON object from a model reply (tolerates surrounding prose
/// and markdown fences).
pub fn extract_json(reply: &str) -> Result<&str, GenerationFailure> {
    let start = reply
        .find('{')
        .ok_or_else(|| GenerationFailure::Unparsable("no JSON object in reply".into()))?;
    let end = reply
        .rfind('}')
        .ok_or_else(|| GenerationFailure::Unparsable("no closing brace in reply".into()))?;
    if end < start {
        return Err(GenerationFailure::Unparsable("malformed JSON object in reply".into()));
    }
    Ok(&reply[start..=end])
}

/// Parse a reply into a raw command stamped with the prompt's metadata.
///
/// Model-supplied metadata is discarded: identity and intent always come from
/// the request, never from the model.
fn parse_reply(reply: &str, ctx: &PromptContext) -> Result<RawCommand, GenerationFailure> {
    let json_str = extract_json(reply)?;
    let mut value: JsonValue =
        serde_json::from_str(json_str).map_err(|e| GenerationFailure::Unparsable(e.to_string()))?;

    let object = value
        .as_object_mut()
        .ok_or_else(|| GenerationFailure::Unparsable("reply is not a JSON object".into()))?;
    object.remove("metadata");

    let mut command: RawCommand =
        serde_json::from_value(value).map_err(|e| GenerationFailure::Unparsable(e.to_string()))?;
    command.metadata = Some(ctx.metadata());
    Ok(command)
}

/// Sends synthesized prompts to the completion service.
#[derive(Clone)]
pub struct CommandGenerator {
    completion: Arc<dyn CompletionService>,
}

impl core::fmt::Debug for CommandGenerator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandGenerator").finish_non_exhaustive()
    }
}

impl CommandGenerator {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    pub async fn generate(&self, prompt: &SynthesizedPrompt, ctx: &RequestContext) -> Generation {
        match self.try_generate(prompt, ctx).await {
            Ok(command) => {
                debug!(action = ?command.action, target = ?command.target, "command generated");
                Generation {
                    command,
                    fallback: None,
                }
            }
            Err(failure) => {
                warn!(error = %failure, "generation failed; substituting fallback command");
                Generation {
                    command: fallback_command(&prompt.context).into(),
                    fallback: Some(failure),
                }
            }
        }
    }

    async fn try_generate(
        &self,
        prompt: &SynthesizedPrompt,
        ctx: &RequestContext,
    ) -> Result<RawCommand, GenerationFailure> {
        if ctx.is_cancelled() {
            return Err(GenerationFailure::Cancelled);
        }

        let call = self.completion.complete(&prompt.text);
        let bounded = async {
            match ctx.timeout {
                Some(limit) => tokio::time::timeout(limit, call)
                    .await
                    .map_err(|_| GenerationFailure::Timeout(limit))?
                    .map_err(GenerationFailure::from),
                None => call.await.map_err(GenerationFailure::from),
            }
        };

        let reply = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => return Err(GenerationFailure::Cancelled),
            reply = bounded => reply?,
        };

        parse_reply(&reply, &prompt.context)
    }
}
