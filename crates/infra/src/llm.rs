//! HTTP completion client for Anthropic and OpenAI-compatible APIs.
//!
//! Each call sends the synthesized prompt as a single user message with no
//! system prompt or history.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use sovereign_ai::{CompletionError, CompletionService};

use crate::config::CompletionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    Anthropic,
    OpenAi,
}

impl ApiFormat {
    /// Anthropic for `anthropic.com` URLs; everything else speaks the OpenAI format.
    pub fn detect(url: &str) -> Self {
        if url.contains("anthropic.com") {
            ApiFormat::Anthropic
        } else {
            ApiFormat::OpenAi
        }
    }
}

pub struct HttpCompletionClient {
    client: Client,
    config: CompletionConfig,
    format: ApiFormat,
}

impl HttpCompletionClient {
    pub fn new(config: CompletionConfig) -> Self {
        let format = ApiFormat::detect(&config.api_url);
        Self {
            client: Client::new(),
            config,
            format,
        }
    }

    pub fn format(&self) -> ApiFormat {
        self.format
    }

    fn request(&self, prompt: &str) -> reqwest::RequestBuilder {
        let messages = vec![Message {
            role: "user",
            content: prompt,
        }];
        let builder = self.client.post(&self.config.api_url);
        match self.format {
            ApiFormat::Anthropic => builder
                .header("x-api-key", &self.config.api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&ChatRequest {
                    model: &self.config.model,
                    max_tokens: self.config.max_tokens,
                    temperature: 0.0,
                    messages,
                }),
            ApiFormat::OpenAi => builder
                .bearer_auth(&self.config.api_key)
                .json(&ChatRequest {
                    model: &self.config.model,
                    max_tokens: self.config.max_tokens,
                    temperature: 0.0,
                    messages,
                }),
        }
    }
}

fn transport(err: reqwest::Error) -> CompletionError {
    CompletionError::Transport(err.to_string())
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        debug!(model = %self.config.model, format = ?self.format, "requesting completion");

        let response = self.request(prompt).send().await.map_err(transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let text = match self.format {
            ApiFormat::Anthropic => response
                .json::<AnthropicResponse>()
                .await
                .map_err(transport)?
                .content
                .into_iter()
                .find_map(|block| block.text),
            ApiFormat::OpenAi => response
                .json::<OpenAiResponse>()
                .await
                .map_err(transport)?
                .choices
                .into_iter()
                .find_map(|choice| choice.message.content),
        };

        text.filter(|t| !t.trim().is_empty())
            .ok_or(CompletionError::EmptyResponse)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn format_is_detected_from_the_url() {
        assert_eq!(ApiFormat::detect("https://api.anthropic.com/v1/messages"), ApiFormat::Anthropic);
        assert_eq!(ApiFormat::detect("https://api.openai.com/v1/chat/completions"), ApiFormat::OpenAi);
    }

    #[test]
    fn request_body_carries_a_single_user_message() {
        let body = serde_json::to_value(ChatRequest {
            model: "m",
            max_tokens: 512,
            temperature: 0.0,
            messages: vec![Message {
                role: "user",
                content: "hello",
            }],
        })
        .unwrap();
        assert_eq!(body["messages"], json!([{ "role": "user", "content": "hello" }]));
        assert!(body.get("system").is_none());
    }

    #[test]
    fn responses_parse_both_formats() {
        let anthropic: AnthropicResponse =
            serde_json::from_value(json!({ "content": [{ "type": "text", "text": "{}" }] })).unwrap();
        assert_eq!(anthropic.content[0].text.as_deref(), Some("{}"));

        let openai: OpenAiResponse = serde_json::from_value(
            json!({ "choices": [{ "message": { "role": "assistant", "content": "{}" } }] }),
        )
        .unwrap();
        assert_eq!(openai.choices[0].message.content.as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_transport_error() {
        let client = HttpCompletionClient::new(CompletionConfig {
            api_key: "k".into(),
            api_url: "http://127.0.0.1:9/v1/chat/completions".into(),
            model: "m".into(),
            max_tokens: 16,
        });
        let err = client.complete("hi").await.unwrap_err();
        assert!(matches!(err, CompletionError::Transport(_)));
    }
}
