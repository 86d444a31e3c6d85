use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Pipeline stage a trace record belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Synthesize,
    Generate,
    Validate,
    Dispatch,
    Cancelled,
    OrchestrationError,
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Phase::Synthesize => "synthesize",
            Phase::Generate => "generate",
            Phase::Validate => "validate",
            Phase::Dispatch => "dispatch",
            Phase::Cancelled => "cancelled",
            Phase::OrchestrationError => "orchestration_error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRecord {
    pub phase: Phase,
    pub success: bool,
    pub output: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Ordered record of every phase of one request.
///
/// Built fresh per request; append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestrationTrace {
    intent: String,
    phases: Vec<PhaseRecord>,
}

impl OrchestrationTrace {
    pub fn new(intent: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            phases: Vec::new(),
        }
    }

    pub fn record_success(&mut self, phase: Phase, output: JsonValue) {
        self.push(phase, true, output, None);
    }

    pub fn record_failure(&mut self, phase: Phase, output: JsonValue, error: impl Into<String>) {
        self.push(phase, false, output, Some(error.into()));
    }

    fn push(&mut self, phase: Phase, success: bool, output: JsonValue, error: Option<String>) {
        self.phases.push(PhaseRecord {
            phase,
            success,
            output,
            error,
            recorded_at: Utc::now(),
        });
    }

    pub fn intent(&self) -> &str {
        &self.intent
    }

    pub fn phases(&self) -> &[PhaseRecord] {
        &self.phases
    }

    pub fn phase_names(&self) -> Vec<Phase> {
        self.phases.iter().map(|p| p.phase).collect()
    }

    pub fn find(&self, phase: Phase) -> Option<&PhaseRecord> {
        self.phases.iter().find(|p| p.phase == phase)
    }

    pub fn last(&self) -> Option<&PhaseRecord> {
        self.phases.last()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}
