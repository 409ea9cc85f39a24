//! Anthropic Claude API implementation.

use serde_json::{json, Value};

use crate::error::ModelError;
use crate::types::{ChatMessage, Role};

use super::{ClaudeResponse, LlmClient};

const ANTHROPIC_VERSION: &str = "2023-06-01";

impl LlmClient {
    /// Claude takes the system prompt as a separate field; system messages are merged.
    pub(super) fn convert_messages_for_claude(
        messages: &[ChatMessage],
    ) -> (Option<String>, Vec<Value>) {
        let mut system_prompt: Option<String> = None;
        let mut claude_messages = Vec::new();

        for msg in messages {
            match msg.role {
                Role::System => {
                    system_prompt = Some(match system_prompt {
                        Some(existing) => format!("{}\n\n{}", existing, msg.content),
                        None => msg.content.clone(),
                    });
                }
                Role::User if !msg.images.is_empty() => {
                    let mut blocks: Vec<Value> = msg.images.iter().map(|r| image_block(r)).collect();
                    blocks.push(json!({ "type": "text", "text": msg.content }));
                    claude_messages.push(json!({ "role": "user", "content": blocks }));
                }
                Role::User => {
                    claude_messages.push(json!({ "role": "user", "content": msg.content }));
                }
                Role::Assistant => {
                    if !msg.content.is_empty() {
                        claude_messages.push(json!({
                            "role": "assistant",
                            "content": [{ "type": "text", "text": msg.content }]
                        }));
                    }
                }
            }
        }

        (system_prompt, claude_messages)
    }

    pub(super) async fn claude_complete(
        &self,
        messages: &[ChatMessage],
    ) -> Result<String, ModelError> {
        let url = format!("{}/v1/messages", self.api_base.trim_end_matches("/v1"));

        let (system_prompt, claude_messages) = Self::convert_messages_for_claude(messages);

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": claude_messages,
        });
        if let Some(system) = &system_prompt {
            body["system"] = json!(system);
        }
        if let Some(temp) = self.temperature {
            body["temperature"] = json!(temp);
        }

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;

        let response: ClaudeResponse = resp.json().await?;
        let text: Vec<String> = response
            .content
            .into_iter()
            .filter(|b| b.block_type == "text")
            .filter_map(|b| b.text)
            .collect();
        if text.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(text.join(""))
    }
}

/// `data:<mime>;base64,<data>` becomes an inline base64 source, anything else a URL source.
fn image_block(reference: &str) -> Value {
    if let Some(rest) = reference.strip_prefix("data:") {
        if let Some((mime, data)) = rest.split_once(";base64,") {
            return json!({
                "type": "image",
                "source": { "type": "base64", "media_type": mime, "data": data }
            });
        }
    }
    json!({ "type": "image", "source": { "type": "url", "url": reference } })
}
