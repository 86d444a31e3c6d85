use serde::Deserialize;

/// Body of `POST /v1/intents`.
#[derive(Debug, Clone, Deserialize)]
pub struct IntentRequest {
    pub intent: String,
}
