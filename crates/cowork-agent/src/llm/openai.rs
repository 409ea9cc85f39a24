//! OpenAI-compatible API implementation.

use serde_json::{json, Value};

use crate::error::ModelError;
use crate::types::{ChatMessage, Role};

use super::{ChatCompletionResponse, LlmClient};

impl LlmClient {
    /// User messages with images become content-part arrays; everything else is a string.
    pub(super) fn convert_messages_for_openai(messages: &[ChatMessage]) -> Vec<Value> {
        messages
            .iter()
            .map(|msg| {
                let role = match msg.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                if msg.role == Role::User && !msg.images.is_empty() {
                    let mut parts = vec![json!({ "type": "text", "text": msg.content })];
                    parts.extend(msg.images.iter().map(|url| {
                        json!({ "type": "image_url", "image_url": { "url": url } })
                    }));
                    json!({ "role": role, "content": parts })
                } else {
                    json!({ "role": role, "content": msg.content })
                }
            })
            .collect()
    }

    pub(super) async fn openai_complete(
        &self,
        messages: &[ChatMessage],
    ) -> Result<String, ModelError> {
        let url = format!("{}/chat/completions", self.api_base);

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": Self::convert_messages_for_openai(messages),
        });
        if let Some(temp) = self.temperature {
            body["temperature"] = json!(temp);
        }

        let resp = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;
        let resp = Self::check_status(resp).await?;

        let response: ChatCompletionResponse = resp.json().await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(ModelError::EmptyResponse)
    }
}
