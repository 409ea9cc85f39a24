//! Shared types for the agent crate.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use cowork_core::config::{LlmConfig, PathsConfig, SessionConfig, SkillsConfig};

use crate::artifacts::Artifact;
use crate::plan::{StepStatus, TaskStep};

// ─── UTF-8 safe string helpers ──────────────────────────────────────────────

/// Truncate a string at a safe UTF-8 char boundary (from the start).
/// Returns a &str of at most `max_bytes` bytes, never splitting a multi-byte character.
pub fn safe_truncate(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// First `max_chars` characters of `s`, and whether anything was cut.
pub fn truncate_chars(s: &str, max_chars: usize) -> (&str, bool) {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => (&s[..idx], true),
        None => (s, false),
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// OpenAI-compatible or Anthropic API base URL
    pub api_base: String,
    pub api_key: String,
    /// Model name (e.g. "gpt-4o", "claude-3-5-sonnet-20241022")
    pub model: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
    /// Workspace root; every file tool is confined to it.
    pub workspace: PathBuf,
    pub paths: PathsConfig,
    pub skills: SkillsConfig,
    pub enable_task_planning: bool,
    /// Identical submissions inside this window are dropped.
    pub debounce: Duration,
    pub shell_timeout: Duration,
    pub verbose: bool,
}

impl AgentConfig {
    /// Load from environment variables with sensible defaults.
    /// Also reads `.env` file from current directory if present.
    pub fn from_env() -> Self {
        cowork_core::config::load_dotenv();
        let llm = LlmConfig::from_env();
        let paths = PathsConfig::from_env();
        let session = SessionConfig::from_env();
        Self {
            api_base: llm.api_base,
            api_key: llm.api_key,
            model: llm.model,
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
            workspace: paths.workspace.clone(),
            skills: SkillsConfig::for_paths(&paths),
            paths,
            enable_task_planning: session.enable_task_planning,
            debounce: Duration::from_millis(session.debounce_ms),
            shell_timeout: Duration::from_secs(session.shell_timeout_secs),
            verbose: false,
        }
    }

    /// Point the config at another workspace; the project skills directory follows it.
    pub fn with_workspace(mut self, workspace: PathBuf) -> Self {
        self.paths = self.paths.with_workspace(&workspace);
        let project = PathBuf::from(&self.paths.project_skills_dir);
        self.skills.project_skills_path = if project.is_absolute() {
            project
        } else {
            workspace.join(project)
        };
        self.workspace = workspace;
        self
    }
}

// ─── Chat types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A transcript entry. `images` carries image references (URLs or data URLs) for user turns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn user_with_images(content: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            images,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            images: Vec::new(),
        }
    }
}

// ─── Tool calls ─────────────────────────────────────────────────────────────

/// A structured call extracted from model text. Parameters keep their source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub parameters: Map<String, Value>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            tool: tool.into(),
            parameters,
        }
    }

    pub fn str_param(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }
}

/// Outcome of a tool execution. Always a value, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

// ─── Cancellation ───────────────────────────────────────────────────────────

/// Per-session cancellation flag. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<CancelInner>,
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: tokio::sync::Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }

    /// Resolves once `cancel` has been called.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

// ─── Events ─────────────────────────────────────────────────────────────────

/// One entry of a progress display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressStep {
    pub label: String,
    pub status: StepStatus,
}

/// Event sink trait for different output targets (CLI, channel consumers, tests).
pub trait EventSink: Send {
    fn on_message_added(&mut self, _message: &ChatMessage) {}
    fn on_progress_updated(&mut self, _steps: &[ProgressStep]) {}
    fn on_task_step_updated(&mut self, _step: &TaskStep) {}
    fn on_artifact_added(&mut self, _artifact: &Artifact) {}
    /// Called when a tool is about to be invoked.
    fn on_tool_call(&mut self, _call: &ToolCall) {}
    /// Called with the raw result and its human-readable rendering.
    fn on_tool_result(&mut self, _call: &ToolCall, _result: &ToolResult, _formatted: &str) {}
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct SilentEventSink;

impl EventSink for SilentEventSink {}

/// Session events as plain data, for consumers that prefer a stream over callbacks.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    MessageAdded(ChatMessage),
    ProgressUpdated { steps: Vec<ProgressStep> },
    TaskStepUpdated(TaskStep),
    ArtifactAdded(Artifact),
    ToolCall(ToolCall),
    ToolResult {
        call: ToolCall,
        result: ToolResult,
        formatted: String,
    },
}

/// Forwards events into a tokio channel. A closed receiver is ignored.
pub struct ChannelEventSink {
    tx: tokio::sync::mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SessionEvent) {
        let _ = self.tx.send(event);
    }
}

impl EventSink for ChannelEventSink {
    fn on_message_added(&mut self, message: &ChatMessage) {
        self.send(SessionEvent::MessageAdded(message.clone()));
    }

    fn on_progress_updated(&mut self, steps: &[ProgressStep]) {
        self.send(SessionEvent::ProgressUpdated {
            steps: steps.to_vec(),
        });
    }

    fn on_task_step_updated(&mut self, step: &TaskStep) {
        self.send(SessionEvent::TaskStepUpdated(step.clone()));
    }

    fn on_artifact_added(&mut self, artifact: &Artifact) {
        self.send(SessionEvent::ArtifactAdded(artifact.clone()));
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        self.send(SessionEvent::ToolCall(call.clone()));
    }

    fn on_tool_result(&mut self, call: &ToolCall, result: &ToolResult, formatted: &str) {
        self.send(SessionEvent::ToolResult {
            call: call.clone(),
            result: result.clone(),
            formatted: formatted.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_helpers_respect_char_boundaries() {
        assert_eq!(safe_truncate("héllo", 2), "h");
        assert_eq!(truncate_chars("文件内容", 2), ("文件", true));
        assert_eq!(truncate_chars("abc", 5), ("abc", false));
    }

    #[tokio::test]
    async fn test_cancel_flag_wakes_waiter() {
        let flag = CancelFlag::new();
        let waiter = flag.clone();
        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;
        flag.cancel();
        handle.await.unwrap();
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn test_channel_sink_serializes_events() {
        let (mut sink, mut rx) = ChannelEventSink::new();
        sink.on_message_added(&ChatMessage::assistant("hi"));
        let event = rx.try_recv().unwrap();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message_added");
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi");
    }
}
