use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompletionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("completion API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("completion API returned no content")]
    EmptyResponse,

    #[error("completion service unavailable: {0}")]
    Unavailable(String),
}

/// Single-shot text completion (`complete(prompt) -> text`).
///
/// Implementations must not carry conversation state between calls.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError>;
}

#[async_trait]
impl<T> CompletionService for Arc<T>
where
    T: CompletionService + ?Sized,
{
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        (**self).complete(prompt).await
    }
}

/// Completion service used when no model is configured: every call fails,
/// so every intent resolves to the fallback command.
#[derive(Debug, Clone)]
pub struct UnavailableCompletion {
    reason: String,
}

impl UnavailableCompletion {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CompletionService for UnavailableCompletion {
    async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
        Err(CompletionError::Unavailable(self.reason.clone()))
    }
}
