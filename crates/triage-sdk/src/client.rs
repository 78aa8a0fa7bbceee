//! Chat model client.
//!
//! Talks to a Messages-style HTTP API: System turns are folded into the
//! top-level `system` field, Patient turns become `user` messages and
//! Assistant turns become `assistant` messages.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use triage_core::llm::TextGenerator;
use triage_core::types::{Role, Turn};

use crate::config::ModelConfig;
use crate::error::into_generation_error;
use crate::{SDKError, SDKResult};

const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Build the request body for one generation call.
///
/// `system_prompt` comes first in the `system` field, followed by any
/// distinct System turns from `context`. Consecutive turns of the same
/// speaker are merged so roles alternate.
pub fn build_request(
    config: &ModelConfig,
    system_prompt: &str,
    context: &[Turn],
) -> MessagesRequest {
    let mut system_parts: Vec<&str> = Vec::new();
    if !system_prompt.trim().is_empty() {
        system_parts.push(system_prompt);
    }

    let mut messages: Vec<Message> = Vec::new();
    for turn in context {
        let role = match turn.role {
            Role::System => {
                if !system_parts.contains(&turn.content.as_str()) {
                    system_parts.push(&turn.content);
                }
                continue;
            }
            Role::Patient => "user",
            Role::Assistant => "assistant",
        };

        match messages.last_mut() {
            Some(last) if last.role == role => {
                last.content.push_str("\n\n");
                last.content.push_str(&turn.content);
            }
            _ => messages.push(Message {
                role: role.to_string(),
                content: turn.content.clone(),
            }),
        }
    }

    MessagesRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        temperature: config.temperature,
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        messages,
    }
}

/// HTTP client for the chat model.
pub struct ChatModelClient {
    client: Client,
    config: ModelConfig,
}

impl ChatModelClient {
    /// Create a new client from config.
    pub fn new(config: ModelConfig) -> SDKResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Build request with auth headers.
    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let mut req = self
            .client
            .post(&url)
            .header("anthropic-version", API_VERSION);

        if let Some(ref key) = self.config.api_key {
            req = req.header("x-api-key", key);
        }

        req
    }

    /// Send one request and return the concatenated text blocks.
    pub async fn complete(&self, body: &MessagesRequest) -> SDKResult<String> {
        let response = self.request("/v1/messages").json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&raw)
                .map(|e| e.error.message)
                .unwrap_or(raw);
            return Err(SDKError::api(status.as_u16(), message));
        }

        let parsed: MessagesResponse = response.json().await?;
        let text = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");

        if text.trim().is_empty() {
            return Err(SDKError::invalid_operation("model returned no text"));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for ChatModelClient {
    async fn generate(&self, system_prompt: &str, context: &[Turn]) -> triage_core::Result<String> {
        let body = build_request(&self.config, system_prompt, context);
        debug!(
            model = %body.model,
            messages = body.messages.len(),
            "calling chat model"
        );
        self.complete(&body).await.map_err(into_generation_error)
    }
}
