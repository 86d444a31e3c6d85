//! Prompt synthesis: free-text intent -> schema-constrained instruction.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use sovereign_commands::{Action, CommandMetadata, Target};
use sovereign_core::{CallerId, DomainError, DomainResult, OrganizationId};

/// Who asked, for which organization, when, and what they asked.
///
/// Travels with the prompt so the generated command's metadata can be
/// reproduced without a second round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptContext {
    pub intent: String,
    pub requested_by: CallerId,
    pub organization_id: Option<OrganizationId>,
    pub timestamp: DateTime<Utc>,
}

impl PromptContext {
    pub fn metadata(&self) -> CommandMetadata {
        CommandMetadata::new(
            self.requested_by.clone(),
            self.organization_id,
            self.timestamp,
            self.intent.clone(),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedPrompt {
    pub text: String,
    pub context: PromptContext,
}

/// Builds the instruction sent to the completion service.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptSynthesizer;

impl PromptSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(
        &self,
        intent: &str,
        requested_by: &CallerId,
        organization_id: Option<OrganizationId>,
    ) -> DomainResult<SynthesizedPrompt> {
        self.synthesize_at(intent, requested_by, organization_id, Utc::now())
    }

    /// Same as [`synthesize`](Self::synthesize) with an explicit clock reading.
    pub fn synthesize_at(
        &self,
        intent: &str,
        requested_by: &CallerId,
        organization_id: Option<OrganizationId>,
        timestamp: DateTime<Utc>,
    ) -> DomainResult<SynthesizedPrompt> {
        let intent = intent.trim();
        if intent.is_empty() {
            return Err(DomainError::validation("intent must not be empty"));
        }

        let context = PromptContext {
            intent: intent.to_string(),
            requested_by: requested_by.clone(),
            organization_id,
            timestamp,
        };

        Ok(SynthesizedPrompt {
            text: render(&context),
            context,
        })
    }
}

fn render(ctx: &PromptContext) -> String {
    let timestamp = ctx.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
    let organization = ctx
        .organization_id
        .map(|o| o.get().to_string())
        .unwrap_or_else(|| "null".to_string());

    let mut hints = String::new();
    for target in Target::ALL {
        hints.push_str(&format!("- {}: {}\n", target, payload_hint(*target)));
    }

    format!(
        r#"You translate a business user's request into exactly one command.
Respond with a single JSON object and nothing else, using this shape:

{{
  "action": "<ACTION>",
  "target": "<TARGET>",
  "payload": {{ ... target-specific fields ... }},
  "metadata": {{
    "requestedBy": "{requested_by}",
    "organizationId": {organization},
    "timestamp": "{timestamp}",
    "intent": <the user request, verbatim, as a JSON string>
  }}
}}

Permitted actions: {actions}
Permitted targets: {targets}

Payload fields by target:
{hints}
Always include "organizationId": {organization} in the payload when it is not null.
Dates use YYYY-MM-DD. Do not invent identifiers the user did not give.

CONTEXT:
requestedBy: {requested_by}
organizationId: {organization}
timestamp: {timestamp}

USER REQUEST:
{intent}
"#,
        requested_by = ctx.requested_by,
        organization = organization,
        timestamp = timestamp,
        actions = Action::permitted(),
        targets = Target::permitted(),
        hints = hints,
        intent = ctx.intent,
    )
}

fn payload_hint(target: Target) -> &'static str {
    match target {
        Target::Employee => "name (full name), email, position; employeeId for existing records",
        Target::PayrollRun => "periodStart, periodEnd (PROCESS requires both, end after start)",
        Target::Paystub => "paystubId for UPDATE/DELETE/APPROVE; employeeId, grossPay, netPay for CREATE",
        Target::TimeEntry => "employeeId, date, hours, description",
        Target::ProjectTask => "taskId for UPDATE/DELETE; taskName, status, assignee",
        Target::Bid => "bidId for UPDATE/EXECUTE; title, amount, dueDate for CREATE",
        Target::Trade => "symbol, side (buy or sell), quantity",
        Target::SystemStatus => "no fields required",
    }
}
