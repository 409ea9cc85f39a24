//! Chat session: one conversation bound to a workspace.
//!
//! `Session` is a cheap cloneable handle. It owns the explicit tool and skill registries,
//! the collaborators, the transcript and the artifact store, and guards them with:
//!   - a re-entrancy flag (a second submission while a turn runs is `Busy`)
//!   - debounce memory (the same text again within the window is `Duplicate`)
//!   - a cancellation flag, reset at the start of every turn

mod turn;


use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Serialize;

use cowork_core::config::SkillsConfig;

use crate::artifacts::{Artifact, ArtifactStore};
use crate::llm::ModelClient;
use crate::plan::{PlanOutcome, TaskPlan};
use crate::runtime::{HttpFetcher, LocalShell, LocalWorkspace, ReqwestFetcher, ShellRunner, Workspace};
use crate::skills::SkillRegistry;
use crate::tools::ToolRegistry;
use crate::types::{AgentConfig, CancelFlag, ChatMessage, EventSink, ToolResult};

/// Outcome of `submit` / `invoke_skill`.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Completed(TurnReport),
    /// A turn is already running for this session.
    Busy,
    /// Same text as the previous submission, inside the debounce window.
    Duplicate,
    /// Nothing to send.
    Empty,
}

/// What one turn produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnReport {
    /// Assistant messages added during the turn, in order.
    pub messages: Vec<ChatMessage>,
    pub tool_results: Vec<ToolResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<TaskPlan>,
    #[serde(skip)]
    pub plan_outcome: Option<PlanOutcome>,
    /// Skill whose instructions were active for the turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill: Option<String>,
    /// Model or skill error that ended the turn early.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub cancelled: bool,
}

impl TurnReport {
    pub fn reply(&self) -> Option<&str> {
        self.messages.last().map(|m| m.content.as_str())
    }

    pub fn failed_tool_calls(&self) -> usize {
        self.tool_results.iter().filter(|r| !r.success).count()
    }
}

/// Collaborators a session runs against. `Session::new` wires up the local ones.
pub struct Collaborators {
    pub model: Arc<dyn ModelClient>,
    pub workspace: Arc<dyn Workspace>,
    pub http: Arc<dyn HttpFetcher>,
    /// Runs `` !`cmd` `` skill context and hooks. `None` disables both.
    pub shell: Option<Arc<dyn ShellRunner>>,
    /// Pre-built skill registry; `None` discovers skills from disk on first use.
    pub skills: Option<SkillRegistry>,
}

#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    model: Arc<dyn ModelClient>,
    running: AtomicBool,
    debounce: Duration,
    last_submission: tokio::sync::Mutex<Option<(String, Instant)>>,
    cancel: CancelFlag,
    state: tokio::sync::Mutex<SessionState>,
}

/// Everything a turn mutates.
pub(crate) struct SessionState {
    pub config: AgentConfig,
    pub history: Vec<ChatMessage>,
    pub artifacts: ArtifactStore,
    pub tools: ToolRegistry,
    pub http: Arc<dyn HttpFetcher>,
    pub shell: Option<Arc<dyn ShellRunner>>,
    skills: Option<SkillRegistry>,
}

impl SessionState {
    /// Skill registry, discovered from disk the first time it is needed.
    pub fn skills(&mut self) -> &SkillRegistry {
        ensure_skills(&mut self.skills, &self.config.skills)
    }
}

pub(crate) fn ensure_skills<'a>(
    slot: &'a mut Option<SkillRegistry>,
    config: &SkillsConfig,
) -> &'a SkillRegistry {
    slot.get_or_insert_with(|| {
        let mut registry = SkillRegistry::new();
        registry.reload(config);
        registry
    })
}

/// Clears the running flag when the turn ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Session {
    /// Session over the local filesystem, shell and network.
    pub fn new(config: AgentConfig, model: Arc<dyn ModelClient>) -> Result<Self> {
        let collaborators = Collaborators {
            model,
            workspace: Arc::new(LocalWorkspace::new(config.workspace.clone())),
            http: Arc::new(ReqwestFetcher::new()?),
            shell: Some(Arc::new(LocalShell::new(
                config.workspace.clone(),
                config.shell_timeout,
            ))),
            skills: None,
        };
        Ok(Self::with_collaborators(config, collaborators))
    }

    pub fn with_collaborators(config: AgentConfig, collaborators: Collaborators) -> Self {
        let tools = ToolRegistry::with_builtins(collaborators.workspace, collaborators.http.clone());
        let state = SessionState {
            history: Vec::new(),
            artifacts: ArtifactStore::new(),
            tools,
            http: collaborators.http,
            shell: collaborators.shell,
            skills: collaborators.skills,
            config: config.clone(),
        };
        Self {
            inner: Arc::new(SessionInner {
                model: collaborators.model,
                running: AtomicBool::new(false),
                debounce: config.debounce,
                last_submission: tokio::sync::Mutex::new(None),
                cancel: CancelFlag::new(),
                state: tokio::sync::Mutex::new(state),
            }),
        }
    }

    /// Run one user turn.
    pub async fn submit(
        &self,
        text: &str,
        images: Vec<String>,
        sink: &mut dyn EventSink,
    ) -> SubmitOutcome {
        let text = text.trim();
        if text.is_empty() && images.is_empty() {
            return SubmitOutcome::Empty;
        }
        let Some(_guard) = self.try_start() else {
            tracing::info!("Turn already running, submission rejected");
            return SubmitOutcome::Busy;
        };
        if self.is_duplicate(text).await {
            tracing::info!("Duplicate submission inside debounce window, dropped");
            return SubmitOutcome::Duplicate;
        }
        self.inner.cancel.reset();

        let mut state = self.inner.state.lock().await;
        let report = turn::run_turn(
            &mut state,
            self.inner.model.as_ref(),
            &self.inner.cancel,
            turn::TurnInput::Text { text, images },
            sink,
        )
        .await;
        SubmitOutcome::Completed(report)
    }

    /// Invoke a skill directly, as if the user had typed `/name args`.
    pub async fn invoke_skill(
        &self,
        name: &str,
        raw_arguments: &str,
        sink: &mut dyn EventSink,
    ) -> SubmitOutcome {
        if name.trim().is_empty() {
            return SubmitOutcome::Empty;
        }
        let Some(_guard) = self.try_start() else {
            return SubmitOutcome::Busy;
        };
        self.inner.cancel.reset();

        let mut state = self.inner.state.lock().await;
        let report = turn::run_turn(
            &mut state,
            self.inner.model.as_ref(),
            &self.inner.cancel,
            turn::TurnInput::Skill {
                name: name.trim(),
                raw_arguments: raw_arguments.trim(),
            },
            sink,
        )
        .await;
        SubmitOutcome::Completed(report)
    }

    /// Abandon the running turn at its next await point.
    pub fn cancel(&self) {
        tracing::info!("Session cancel requested");
        self.inner.cancel.cancel();
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Rebind to another workspace. Tool and skill registries are rebuilt wholesale; skills
    /// are rediscovered lazily on the next turn.
    pub async fn set_workspace(&self, workspace: impl Into<PathBuf>) {
        let workspace = workspace.into();
        let mut state = self.inner.state.lock().await;
        state.config = state.config.clone().with_workspace(workspace.clone());
        state.tools = ToolRegistry::with_builtins(
            Arc::new(LocalWorkspace::new(workspace.clone())),
            state.http.clone(),
        );
        if state.shell.is_some() {
            state.shell = Some(Arc::new(LocalShell::new(
                workspace.clone(),
                state.config.shell_timeout,
            )));
        }
        state.skills = None;
        tracing::info!(workspace = %workspace.display(), "Workspace changed, registries reset");
    }

    pub async fn workspace(&self) -> PathBuf {
        self.inner.state.lock().await.config.workspace.clone()
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.inner.state.lock().await.history.clone()
    }

    pub async fn artifacts(&self) -> Vec<Artifact> {
        self.inner.state.lock().await.artifacts.all().to_vec()
    }

    /// Drop the transcript and artifacts; registries are kept.
    pub async fn clear(&self) {
        let mut state = self.inner.state.lock().await;
        state.history.clear();
        state.artifacts.clear();
    }

    fn try_start(&self) -> Option<RunningGuard<'_>> {
        self.inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard(&self.inner.running))
    }

    /// Record `text` as the latest submission; true when it repeats the previous one too soon.
    async fn is_duplicate(&self, text: &str) -> bool {
        let mut last = self.inner.last_submission.lock().await;
        let now = Instant::now();
        if let Some((prev, at)) = last.as_ref() {
            if prev == text && now.duration_since(*at) < self.inner.debounce {
                return true;
            }
        }
        *last = Some((text.to_string(), now));
        false
    }
}
