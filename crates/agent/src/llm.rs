use std::time::Duration;

use async_trait::async_trait;
use hubcap_core::config::OpenAiConfig;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("chat completion transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat completion API error ({status}): {body}")]
    Api { status: StatusCode, body: String },
    #[error("chat completion returned no choices")]
    EmptyResponse,
}

/// Single-turn chat-completion seam. Production uses the OpenAI-compatible
/// HTTP client; tests substitute canned responses.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiClient {
    pub fn from_config(config: &OpenAiConfig) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = chat_request_body(&self.model, system_prompt, user_prompt);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api { status, body });
        }

        let completion: ChatResponse = response.json().await?;
        debug!(model = %self.model, choices = completion.choices.len(), "chat completion received");
        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

/// Deterministic extraction prompt: temperature 0, system + user message.
fn chat_request_body(model: &str, system_prompt: &str, user_prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": user_prompt }
        ],
        "temperature": 0
    })
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: String,
}

#[cfg(test)]
mod tests {
    use super::chat_request_body;

    #[test]
    fn request_body_is_a_single_turn_exchange() {
        let body = chat_request_body("gpt-4o-mini", "you extract intents", "create a contact");

        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "create a contact");
    }
}
