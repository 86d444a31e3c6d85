//! Command Model: the structural contract every pipeline stage reads and writes.
//!
//! - [`RawCommand`]: what the language model produced (unchecked)
//! - [`Command`]: a structurally valid command (produced by the structural gate)
//! - [`ValidationResult`], [`ExecutionOutcome`], [`OrchestrationTrace`]: per-request,
//!   never persisted by the pipeline itself

pub mod command;
pub mod outcome;
pub mod payload;
pub mod trace;
pub mod validation;

pub use command::{Action, Command, CommandMetadata, RawCommand, Target, UnknownVariant};
pub use outcome::ExecutionOutcome;
pub use payload::{Payload, keys};
pub use trace::{OrchestrationTrace, Phase, PhaseRecord};
pub use validation::{Gate, ValidationResult};
