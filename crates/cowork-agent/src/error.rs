//! Error types at the agent's boundaries.
//!
//! None of these escape an orchestration entry point: tool errors become failed
//! `ToolResult`s, skill errors become failed `SkillExecutionResult`s, and model errors end
//! the current turn with a user-facing message.

use thiserror::Error;

/// Failure inside a tool handler.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("未知的工具: {0}")]
    UnknownTool(String),
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
    #[error("Tool '{tool}' is not allowed while skill '{skill}' is active")]
    NotAllowed { tool: String, skill: String },
    #[error("{0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Failure talking to the model provider.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("request failed: {0}")]
    Transport(String),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("model returned an empty response")]
    EmptyResponse,
    #[error("request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        ModelError::Transport(e.to_string())
    }
}

impl ModelError {
    /// User-facing rendering with the checks most likely to fix the problem.
    pub fn user_message(&self) -> String {
        if matches!(self, ModelError::Cancelled) {
            return "⏹️ 已取消".to_string();
        }
        format!(
            "❌ 调用模型失败: {}\n\n请检查:\n- API Key 是否正确配置\n- 网络连接是否正常\n- API 额度是否充足",
            self.api_detail()
        )
    }

    /// Prefer the provider's `error.message` over the raw body when it is JSON.
    fn api_detail(&self) -> String {
        if let ModelError::Api { status, body } = self {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(body) {
                if let Some(msg) = v
                    .get("error")
                    .and_then(|e| e.get("message").or(Some(e)))
                    .and_then(|m| m.as_str())
                {
                    return format!("{} 错误: {}", status, msg);
                }
            }
        }
        self.to_string()
    }
}

/// Failure resolving or invoking a skill.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkillError {
    #[error("Skill not found: {0}")]
    NotFound(String),
    #[error("Skill \"{0}\" is not user-invocable (background knowledge only)")]
    NotUserInvocable(String),
    #[error("Skill \"{0}\" can only be invoked by user (has side effects)")]
    ModelInvocationDisabled(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_error_message_has_hints() {
        let err = ModelError::Api {
            status: 401,
            body: r#"{"error":{"message":"Incorrect API key provided"}}"#.to_string(),
        };
        let msg = err.user_message();
        assert!(msg.contains("401 错误: Incorrect API key provided"));
        assert!(msg.contains("API Key"));
        assert!(msg.contains("网络连接"));
        assert!(msg.contains("额度"));
    }

    #[test]
    fn test_skill_error_wording() {
        assert!(SkillError::ModelInvocationDisabled("deploy".into())
            .to_string()
            .contains("invoked by user"));
        assert_eq!(
            SkillError::NotFound("x".into()).to_string(),
            "Skill not found: x"
        );
    }

    #[test]
    fn test_unknown_tool_message() {
        assert_eq!(ToolError::UnknownTool("nope".into()).to_string(), "未知的工具: nope");
    }
}
