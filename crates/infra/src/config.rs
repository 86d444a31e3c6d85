//! Pipeline configuration, read from the environment.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Clone, PartialEq, Eq)]
pub struct CompletionConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
}

impl core::fmt::Debug for CompletionConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CompletionConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// `None` when `LLM_API_KEY` is unset: every intent resolves to the fallback.
    pub completion: Option<CompletionConfig>,
    /// `None` selects the in-memory adapters.
    pub database_url: Option<String>,
    /// Bounds the completion call and the handler call of each request.
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            completion: None,
            database_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let completion = match var("LLM_API_KEY") {
            Some(api_key) => Some(CompletionConfig {
                api_key,
                api_url: var("LLM_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
                model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                max_tokens: match var("LLM_MAX_TOKENS") {
                    Some(v) => positive("LLM_MAX_TOKENS", &v)? as u32,
                    None => DEFAULT_MAX_TOKENS,
                },
            }),
            None => None,
        };

        let request_timeout = match var("REQUEST_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(positive("REQUEST_TIMEOUT_MS", &v)?),
            None => DEFAULT_REQUEST_TIMEOUT,
        };

        Ok(Self {
            completion,
            database_url: var("DATABASE_URL"),
            request_timeout,
        })
    }
}

fn positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(u64::from(n)),
        _ => Err(ConfigError::InvalidNumber {
            var,
            value: value.to_string(),
        }),
    }
}
