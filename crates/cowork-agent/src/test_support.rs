//! Scripted collaborators shared by unit tests.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use cowork_core::config::{PathsConfig, SkillsConfig};
use cowork_core::skill::{SkillContext, SkillDefinition, SkillSource};

use crate::artifacts::Artifact;
use crate::error::ModelError;
use crate::llm::ModelClient;
use crate::plan::TaskStep;
use crate::runtime::{
    CommandOutput, EntryKind, FileEntry, HttpFetcher, HttpRequest, HttpResponse, ShellRunner,
    Workspace,
};
use crate::types::{AgentConfig, ChatMessage, EventSink, ProgressStep, ToolCall, ToolResult};

// ─── Fixtures ───────────────────────────────────────────────────────────────

/// A valid main-context skill with no restrictions.
pub fn skill(name: &str, source: SkillSource) -> SkillDefinition {
    SkillDefinition {
        id: format!("{}:{}", source, name),
        name: name.to_string(),
        description: String::new(),
        argument_hint: None,
        disable_model_invocation: false,
        user_invocable: true,
        allowed_tools: None,
        context: SkillContext::Main,
        agent: None,
        model: None,
        hooks: None,
        instructions: "Do the thing.".to_string(),
        source,
        file_path: PathBuf::from(format!("/skills/{}/SKILL.md", name)),
        directory_path: PathBuf::from(format!("/skills/{}", name)),
        supporting_files: Vec::new(),
    }
}

/// Config that never reads the environment. Skills are looked up under `workspace` only.
pub fn test_config(workspace: &Path) -> AgentConfig {
    let paths = PathsConfig {
        workspace: workspace.to_path_buf(),
        user_skills_dir: workspace.join(".user-skills").to_string_lossy().to_string(),
        project_skills_dir: ".cowork/skills".to_string(),
    };
    AgentConfig {
        api_base: "http://localhost:1".to_string(),
        api_key: "test-key".to_string(),
        model: "test-model".to_string(),
        max_tokens: 1024,
        temperature: None,
        workspace: workspace.to_path_buf(),
        skills: SkillsConfig {
            user_skills_path: paths.user_skills_dir.clone(),
            project_skills_path: workspace.join(".cowork/skills"),
            ..SkillsConfig::default()
        },
        paths,
        enable_task_planning: true,
        debounce: Duration::from_millis(800),
        shell_timeout: Duration::from_secs(5),
        verbose: false,
    }
}

// ─── Model ──────────────────────────────────────────────────────────────────

/// Replays canned replies in order and records every request.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ModelError>>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(|r| Ok(r.into())).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn push_error(&self, err: ModelError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Vec<ChatMessage> {
        self.requests.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.requests.lock().unwrap().push(messages.to_vec());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(ModelError::EmptyResponse))
    }
}

// ─── Workspace ──────────────────────────────────────────────────────────────

/// In-memory workspace recording each operation as `op:path`.
#[derive(Default)]
pub struct MemoryWorkspace {
    root: PathBuf,
    pub files: Mutex<BTreeMap<String, String>>,
    pub calls: Mutex<Vec<String>>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/workspace"),
            ..Default::default()
        }
    }

    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        self
    }

    pub fn file(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str, path: &str) {
        self.calls.lock().unwrap().push(format!("{}:{}", op, path));
    }

    fn entry(path: &str, content: &str) -> FileEntry {
        FileEntry {
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            kind: EntryKind::File,
            size: Some(content.len() as u64),
            modified: None,
        }
    }
}

impl Workspace for MemoryWorkspace {
    fn root(&self) -> &Path {
        &self.root
    }

    fn list(&self, path: &str) -> Result<Vec<FileEntry>> {
        self.record("list", path);
        let prefix = path.trim_start_matches("./").trim_matches('.');
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p.starts_with(prefix))
            .map(|(p, c)| Self::entry(p, c))
            .collect())
    }

    fn read(&self, path: &str) -> Result<String> {
        self.record("read", path);
        self.file(path)
            .ok_or_else(|| anyhow::anyhow!("Failed to read file {}", path))
    }

    fn write(&self, path: &str, content: &str) -> Result<()> {
        self.record("write", path);
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
        Ok(())
    }

    fn mkdir(&self, path: &str) -> Result<()> {
        self.record("mkdir", path);
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<()> {
        self.record("delete", path);
        self.files
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| anyhow::anyhow!("Failed to delete {}", path))
    }

    fn rename(&self, source: &str, destination: &str) -> Result<()> {
        self.record("rename", source);
        let mut files = self.files.lock().unwrap();
        let content = files
            .remove(source)
            .ok_or_else(|| anyhow::anyhow!("Failed to move {} to {}", source, destination))?;
        files.insert(destination.to_string(), content);
        Ok(())
    }

    fn search(&self, pattern: &str, dir: &str) -> Result<Vec<FileEntry>> {
        self.record("search", dir);
        let needle = pattern.trim_start_matches('*').to_lowercase();
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p.to_lowercase().contains(&needle))
            .map(|(p, c)| Self::entry(p, c))
            .collect())
    }
}

// ─── HTTP ───────────────────────────────────────────────────────────────────

/// Answers every request with the same JSON body and records the requests.
pub struct StaticFetcher {
    pub status: u16,
    pub data: Value,
    pub requests: Mutex<Vec<HttpRequest>>,
}

impl StaticFetcher {
    pub fn json(status: u16, data: Value) -> Self {
        Self {
            status,
            data,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl HttpFetcher for StaticFetcher {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);
        Ok(HttpResponse {
            status: self.status,
            status_text: String::new(),
            headers: BTreeMap::new(),
            data: self.data.clone(),
            content_type: "application/json".into(),
            duration_ms: 12,
            url,
        })
    }
}

// ─── Shell ──────────────────────────────────────────────────────────────────

/// Returns canned output per command; unknown commands exit with status 127.
#[derive(Default)]
pub struct ScriptedShell {
    outputs: BTreeMap<String, CommandOutput>,
    pub commands: Mutex<Vec<String>>,
}

impl ScriptedShell {
    pub fn with(mut self, command: &str, stdout: &str) -> Self {
        self.outputs.insert(
            command.to_string(),
            CommandOutput {
                stdout: stdout.to_string(),
                stderr: String::new(),
                exit_code: 0,
            },
        );
        self
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShellRunner for ScriptedShell {
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.commands.lock().unwrap().push(command.to_string());
        Ok(self.outputs.get(command).cloned().unwrap_or(CommandOutput {
            stdout: String::new(),
            stderr: format!("sh: {}: not found", command),
            exit_code: 127,
        }))
    }
}

// ─── Events ─────────────────────────────────────────────────────────────────

/// Keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub messages: Vec<ChatMessage>,
    pub progress: Vec<Vec<ProgressStep>>,
    pub steps: Vec<TaskStep>,
    pub artifacts: Vec<Artifact>,
    pub tool_calls: Vec<ToolCall>,
    pub tool_results: Vec<(ToolCall, ToolResult, String)>,
}

impl RecordingSink {
    pub fn tools_called(&self) -> Vec<String> {
        self.tool_calls.iter().map(|c| c.tool.clone()).collect()
    }

    pub fn last_message(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or_default()
    }
}

impl EventSink for RecordingSink {
    fn on_message_added(&mut self, message: &ChatMessage) {
        self.messages.push(message.clone());
    }

    fn on_progress_updated(&mut self, steps: &[ProgressStep]) {
        self.progress.push(steps.to_vec());
    }

    fn on_task_step_updated(&mut self, step: &TaskStep) {
        self.steps.push(step.clone());
    }

    fn on_artifact_added(&mut self, artifact: &Artifact) {
        self.artifacts.push(artifact.clone());
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        self.tool_calls.push(call.clone());
    }

    fn on_tool_result(&mut self, call: &ToolCall, result: &ToolResult, formatted: &str) {
        self.tool_results
            .push((call.clone(), result.clone(), formatted.to_string()));
    }
}
