use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmSettings;
use crate::error::PrepError;

/// Environment variable holding the API credential
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Optional override of the API base URL
pub const BASE_URL_ENV: &str = "OPENAI_BASE_URL";

/// Configuration for the chat-completions client
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key (from OPENAI_API_KEY env var)
    pub api_key: String,
    /// Model to use (e.g., "gpt-4.1-mini")
    pub model: String,
    /// Base URL without the `/chat/completions` suffix
    pub base_url: String,
}

impl LlmConfig {
    /// Create config from environment variables, falling back to `settings`
    /// for everything but the key
    pub fn from_env(settings: &LlmSettings) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or(PrepError::MissingEnv(API_KEY_ENV))?;
        let base_url = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| settings.base_url.clone());

        Ok(Self::new(api_key, settings.model.clone(), base_url))
    }

    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// One prompt for the text generation service
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub user: String,
    pub temperature: f64,
}

impl CompletionRequest {
    pub fn user(user: impl Into<String>, temperature: f64) -> Self {
        Self {
            system: None,
            user: user.into(),
            temperature,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Something that turns a prompt into generated text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate one completion; the returned text is trimmed
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

/// Chat-completions API client
pub struct ChatClient {
    client: Client,
    config: LlmConfig,
}

impl ChatClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextGenerator for ChatClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = ChatRequest::from_prompt(&self.config.model, request);
        debug!(
            "Chat request: model={} temperature={} prompt_chars={}",
            body.model,
            body.temperature,
            request.user.len()
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to send request to text generation API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PrepError::Server {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let response: ChatResponse = response
            .json()
            .await
            .context("Failed to parse text generation API response")?;

        response.first_text()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f64,
    messages: Vec<Message>,
}

impl ChatRequest {
    fn from_prompt(model: &str, request: &CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(Message {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.push(Message {
            role: "user".to_string(),
            content: request.user.clone(),
        });

        Self {
            model: model.to_string(),
            temperature: request.temperature,
            messages,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn first_text(&self) -> Result<String> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .map(|text| text.trim().to_string())
            .ok_or_else(|| PrepError::BadResponse("no text content in response".to_string()).into())
    }
}
