//! Three-gate command validation.
//!
//! ```text
//! RawCommand
//!   ↓
//! 1. Structural   (action/target present and permitted; defaults applied)
//!   ↓
//! 2. Authorization (caller's role in the command's organization)
//!   ↓
//! 3. Business rules (pay-period ordering, processed pay statements)
//!   ↓
//! ApprovedCommand
//! ```
//!
//! The first failing gate decides the verdict; later gates never run.
//! [`ApprovedCommand`] can only be constructed here, so the dispatcher
//! cannot be handed a command that skipped validation.

pub mod authorization;
pub mod business;
pub mod structural;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use sovereign_auth::RoleLookup;
use sovereign_commands::{
    Action, Command, CommandMetadata, Gate, Payload, RawCommand, Target, ValidationResult,
};
use sovereign_core::{CallerId, DomainError, OrganizationId};

use crate::store::DataStore;

/// A command that passed every gate.
///
/// Consumed by value on dispatch. Handlers may enrich the payload through
/// [`payload_mut`](Self::payload_mut); action, target and metadata are
/// read-only.
#[derive(Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ApprovedCommand {
    command: Command,
}

impl ApprovedCommand {
    pub(crate) fn new(command: Command) -> Self {
        Self { command }
    }

    pub fn action(&self) -> Action {
        self.command.action
    }

    pub fn target(&self) -> Target {
        self.command.target
    }

    pub fn metadata(&self) -> &CommandMetadata {
        &self.command.metadata
    }

    pub fn payload(&self) -> &Payload {
        &self.command.payload
    }

    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.command.payload
    }

    pub fn organization_id(&self) -> Option<OrganizationId> {
        self.command.organization_id()
    }

    pub fn as_command(&self) -> &Command {
        &self.command
    }

    pub fn into_command(self) -> Command {
        self.command
    }
}

/// Outcome of one validator pass.
#[derive(Debug)]
pub enum Verdict {
    Approved {
        result: ValidationResult,
        command: ApprovedCommand,
    },
    Rejected {
        result: ValidationResult,
        /// The command as far as the structural gate could build it.
        command: Option<Command>,
    },
}

impl Verdict {
    pub fn result(&self) -> &ValidationResult {
        match self {
            Verdict::Approved { result, .. } | Verdict::Rejected { result, .. } => result,
        }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, Verdict::Approved { .. })
    }
}

pub struct Validator {
    roles: Arc<dyn RoleLookup>,
    store: Arc<dyn DataStore>,
}

impl Validator {
    pub fn new(roles: Arc<dyn RoleLookup>, store: Arc<dyn DataStore>) -> Self {
        Self { roles, store }
    }

    /// Run the gates in order against `raw`, on behalf of `caller`.
    ///
    /// Authorization always uses `caller`, never the command's own
    /// `requestedBy`.
    pub async fn validate(&self, raw: RawCommand, caller: &CallerId) -> Verdict {
        let command = match structural::check(raw, caller) {
            Ok(command) => command,
            Err(errors) => {
                info!(errors = ?errors, "command rejected by structural gate");
                return Verdict::Rejected {
                    result: ValidationResult::structural(errors),
                    command: None,
                };
            }
        };

        if let Err(err) = authorization::check(self.roles.as_ref(), &command, caller).await {
            info!(
                action = %command.action,
                target = %command.target,
                error = %err,
                "command rejected by authorization gate"
            );
            return Verdict::Rejected {
                result: ValidationResult::rejected(Gate::Authorization, err),
                command: Some(command),
            };
        }

        if let Err(violation) = business::check(self.store.as_ref(), &command).await {
            info!(
                action = %command.action,
                target = %command.target,
                error = %violation,
                "command rejected by business rule gate"
            );
            let reason = match violation {
                DomainError::RuleViolation(msg) => msg,
                other => other.to_string(),
            };
            return Verdict::Rejected {
                result: ValidationResult::rejected(Gate::BusinessRule, reason),
                command: Some(command),
            };
        }

        debug!(action = %command.action, target = %command.target, "command approved");
        Verdict::Approved {
            result: ValidationResult::approved(),
            command: ApprovedCommand::new(command),
        }
    }
}
