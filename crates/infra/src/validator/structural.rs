//! Gate 1: the command is well-formed.

use chrono::Utc;
use tracing::debug;

use sovereign_commands::{Action, Command, CommandMetadata, Payload, RawCommand, Target};
use sovereign_core::CallerId;

/// Intent recorded when the command arrived without metadata.
pub const DEFAULT_METADATA_INTENT: &str = "auto-generated metadata";

/// Check `action` and `target`, then fill in missing payload and metadata.
///
/// Returns one error string per violation. Defaulting only happens once both
/// required fields are valid.
pub fn check(raw: RawCommand, caller: &CallerId) -> Result<Command, Vec<String>> {
    let mut errors = Vec::new();

    let action = match raw.action.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push("missing required field: action".to_string());
            None
        }
        Some(text) => match text.parse::<Action>() {
            Ok(action) => Some(action),
            Err(err) => {
                errors.push(format!("{err} (permitted: {})", Action::permitted()));
                None
            }
        },
    };

    let target = match raw.target.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push("missing required field: target".to_string());
            None
        }
        Some(text) => match text.parse::<Target>() {
            Ok(target) => Some(target),
            Err(err) => {
                errors.push(format!("{err} (permitted: {})", Target::permitted()));
                None
            }
        },
    };

    let (Some(action), Some(target)) = (action, target) else {
        return Err(errors);
    };

    let payload = raw.payload.unwrap_or_else(|| {
        debug!(%action, %target, "payload missing; defaulting to empty payload");
        Payload::new()
    });

    let metadata = raw.metadata.unwrap_or_else(|| {
        debug!(%action, %target, caller = %caller, "metadata missing; defaulting from caller");
        CommandMetadata::new(caller.clone(), None, Utc::now(), DEFAULT_METADATA_INTENT)
    });

    Ok(Command::new(action, target, payload, metadata))
}
