//! LLM HTTP client for plain-text chat completions.
//!
//! Supports two API formats:
//!   - **OpenAI-compatible**: `/chat/completions` (GPT-4, DeepSeek, Qwen, etc.)
//!   - **Claude Native**: `/v1/messages` (Anthropic Claude)
//!
//! Auto-detects which API to use based on model name or API base URL. The orchestration
//! layer only sees `ModelClient::complete`, so tests replace the client with a script.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::ModelError;
use crate::types::{AgentConfig, CancelFlag, ChatMessage};

mod claude;
mod openai;

#[cfg(test)]
mod tests;

/// The model as an opaque `complete(messages) → text` capability.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError>;
}

/// Run `complete`, abandoning the request as soon as `cancel` fires.
pub async fn complete_cancellable(
    model: &dyn ModelClient,
    messages: &[ChatMessage],
    cancel: &CancelFlag,
) -> Result<String, ModelError> {
    if cancel.is_cancelled() {
        return Err(ModelError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ModelError::Cancelled),
        reply = model.complete(messages) => reply,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFormat {
    OpenAI,
    Claude,
}

/// Detect API format from model name or API base.
pub fn detect_api_format(model: &str, api_base: &str) -> ApiFormat {
    let model_lower = model.to_lowercase();
    let base_lower = api_base.to_lowercase();

    if model_lower.starts_with("claude")
        || base_lower.contains("anthropic")
        || base_lower.contains("claude")
    {
        ApiFormat::Claude
    } else {
        ApiFormat::OpenAI
    }
}

/// LLM client supporting both OpenAI and Claude API formats.
pub struct LlmClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f64>,
}

impl LlmClient {
    pub fn new(
        api_base: &str,
        api_key: &str,
        model: &str,
        max_tokens: u32,
        temperature: Option<f64>,
    ) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            max_tokens,
            temperature,
        })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self, ModelError> {
        Self::new(
            &config.api_base,
            &config.api_key,
            &config.model,
            config.max_tokens,
            config.temperature,
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn format(&self) -> ApiFormat {
        detect_api_format(&self.model, &self.api_base)
    }

    /// Read a non-2xx response into `ModelError::Api`.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ModelError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "LLM API error");
        Err(ModelError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl ModelClient for LlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        if self.api_key.trim().is_empty() {
            return Err(ModelError::MissingApiKey);
        }
        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            "Sending model request"
        );
        let content = match self.format() {
            ApiFormat::Claude => self.claude_complete(messages).await?,
            ApiFormat::OpenAI => self.openai_complete(messages).await?,
        };
        if content.trim().is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(content)
    }
}

// ─── Response types ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClaudeResponse {
    #[serde(default)]
    content: Vec<ClaudeBlock>,
}

#[derive(Debug, Deserialize)]
struct ClaudeBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: Option<String>,
}
