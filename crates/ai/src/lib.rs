//! `sovereign-ai`
//!
//! **Responsibility:** turning free text into a [`RawCommand`](sovereign_commands::RawCommand).
//!
//! This crate is intentionally **not** allowed to act on anything:
//! - It must not touch the data store.
//! - It must not authorize or execute commands.
//! - Generation never fails outward; failures become the fallback command.

pub mod completion;
pub mod context;
pub mod generator;
pub mod prompt;

pub use completion::{CompletionError, CompletionService, UnavailableCompletion};
pub use context::RequestContext;
pub use generator::{CommandGenerator, Generation, GenerationFailure, extract_json, fallback_command};
pub use prompt::{PromptContext, PromptSynthesizer, SynthesizedPrompt};
