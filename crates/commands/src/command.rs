use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sovereign_core::{CallerId, OrganizationId};

use crate::Payload;

/// A string did not name a known [`Action`] or [`Target`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! command_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Every permitted value, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Comma-separated list of permitted values (used in prompts and errors).
            pub fn permitted() -> String {
                Self::ALL
                    .iter()
                    .map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            /// Trimmed, ASCII case-insensitive.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

command_enum! {
    /// Verb a command performs.
    Action, "action" {
        Create => "CREATE",
        Read => "READ",
        Update => "UPDATE",
        Delete => "DELETE",
        Process => "PROCESS",
        Approve => "APPROVE",
        Execute => "EXECUTE",
    }
}

command_enum! {
    /// Resource kind a command acts upon.
    Target, "target" {
        Employee => "EMPLOYEE",
        PayrollRun => "PAYROLL_RUN",
        Paystub => "PAYSTUB",
        TimeEntry => "TIME_ENTRY",
        ProjectTask => "PROJECT_TASK",
        Bid => "BID",
        Trade => "TRADE",
        SystemStatus => "SYSTEM_STATUS",
    }
}

/// Audit metadata carried by every command.
///
/// `intent` is the original free-text request and never changes after
/// generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMetadata {
    pub requested_by: CallerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<OrganizationId>,
    pub timestamp: DateTime<Utc>,
    pub intent: String,
}

impl CommandMetadata {
    pub fn new(
        requested_by: CallerId,
        organization_id: Option<OrganizationId>,
        timestamp: DateTime<Utc>,
        intent: impl Into<String>,
    ) -> Self {
        Self {
            requested_by,
            organization_id,
            timestamp,
            intent: intent.into(),
        }
    }
}

/// A command as generated, before the structural gate has looked at it.
///
/// Every field is optional: model output is partial more often than not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCommand {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub payload: Option<Payload>,
    #[serde(default)]
    pub metadata: Option<CommandMetadata>,
}

impl RawCommand {
    pub fn action_is(&self, action: Action) -> bool {
        self.action.as_deref().and_then(|a| a.parse::<Action>().ok()) == Some(action)
    }

    pub fn target_is(&self, target: Target) -> bool {
        self.target.as_deref().and_then(|t| t.parse::<Target>().ok()) == Some(target)
    }
}

impl From<Command> for RawCommand {
    fn from(command: Command) -> Self {
        Self {
            action: Some(command.action.as_str().to_string()),
            target: Some(command.target.as_str().to_string()),
            payload: Some(command.payload),
            metadata: Some(command.metadata),
        }
    }
}

/// A structurally valid command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    pub target: Target,
    pub payload: Payload,
    pub metadata: CommandMetadata,
}

impl Command {
    pub fn new(action: Action, target: Target, payload: Payload, metadata: CommandMetadata) -> Self {
        Self {
            action,
            target,
            payload,
            metadata,
        }
    }

    /// Organization the command operates in: the payload wins over metadata.
    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.payload
            .organization_id()
            .or(self.metadata.organization_id)
    }
}
