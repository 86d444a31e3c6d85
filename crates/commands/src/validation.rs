use serde::{Deserialize, Serialize};

/// One independent validation check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Structural,
    Authorization,
    BusinessRule,
}

impl core::fmt::Display for Gate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Gate::Structural => "structural",
            Gate::Authorization => "authorization",
            Gate::BusinessRule => "business rule",
        })
    }
}

/// Verdict of a single validator pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub approved: bool,
    pub reason: String,
    /// Structural errors, one per violation (empty unless the structural gate failed).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// Gate that rejected the command (`None` when approved).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejected_by: Option<Gate>,
}

impl ValidationResult {
    pub fn approved() -> Self {
        Self {
            approved: true,
            reason: "command passed structural, authorization and business rule gates".to_string(),
            errors: Vec::new(),
            rejected_by: None,
        }
    }

    /// Structural rejection: every error joined into the reason.
    pub fn structural(errors: Vec<String>) -> Self {
        Self {
            approved: false,
            reason: format!("{}: {}", Gate::Structural, errors.join("; ")),
            errors,
            rejected_by: Some(Gate::Structural),
        }
    }

    pub fn rejected(gate: Gate, reason: impl core::fmt::Display) -> Self {
        Self {
            approved: false,
            reason: format!("{gate}: {reason}"),
            errors: Vec::new(),
            rejected_by: Some(gate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_reason_joins_every_error() {
        let result = ValidationResult::structural(vec![
            "missing required field: action".to_string(),
            "missing required field: target".to_string(),
        ]);
        assert!(!result.approved);
        assert_eq!(
            result.reason,
            "structural: missing required field: action; missing required field: target"
        );
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn rejection_reason_names_the_gate() {
        let result = ValidationResult::rejected(Gate::BusinessRule, "pay period end must be after start");
        assert_eq!(result.rejected_by, Some(Gate::BusinessRule));
        assert!(result.reason.starts_with("business rule: "));
    }
}
