//! One conversational turn.
//!
//! user text → (slash command or auto-matched skill) → model → plan engine if the reply
//! carries a plan, otherwise direct tool calls with one corrective round and a summary.

use cowork_core::skill::{is_valid_skill_name, SkillDefinition};

use super::{ensure_skills, SessionState, TurnReport};
use crate::artifacts::{
    extract_artifacts, resolve_artifact_references, Artifact, ArtifactMap, FALLBACK_KEY,
};
use crate::dispatch::{results_transcript, Dispatcher, Executed};
use crate::error::{ModelError, SkillError};
use crate::llm::{complete_cancellable, ModelClient};
use crate::parser::parse_tool_calls;
use crate::plan::{execute_plan, parse_plan, PlanContext, PlanOutcome, StepStatus, TaskStep};
use crate::prompt::{build_system_prompt, correction_request, summary_request};
use crate::skills::{
    create_skill_invocation, execute_skill, parse_skill_command, tool_restriction_message,
    InvokedBy, SkillExecutionResult, SkillRegistry, DEFAULT_MATCH_LIMIT,
};
use crate::types::{CancelFlag, ChatMessage, EventSink, ProgressStep, ToolCall, ToolResult};

pub(crate) enum TurnInput<'a> {
    Text { text: &'a str, images: Vec<String> },
    Skill { name: &'a str, raw_arguments: &'a str },
}

/// Skill instructions injected for the duration of a turn.
struct ActiveSkill {
    definition: SkillDefinition,
    context: String,
}

/// Per-turn plumbing shared by the helpers below.
struct Turn<'a> {
    cancel: &'a CancelFlag,
    sink: &'a mut dyn EventSink,
    report: TurnReport,
}

impl Turn<'_> {
    fn progress(&mut self, steps: &[(&str, StepStatus)]) {
        let steps: Vec<ProgressStep> = steps
            .iter()
            .map(|(label, status)| ProgressStep {
                label: label.to_string(),
                status: *status,
            })
            .collect();
        self.sink.on_progress_updated(&steps);
    }

    /// Record an assistant message in the history, the report and the sink.
    fn say(&mut self, state: &mut SessionState, content: impl Into<String>) {
        let message = ChatMessage::assistant(content);
        self.sink.on_message_added(&message);
        state.history.push(message.clone());
        self.report.messages.push(message);
    }

    fn fail(&mut self, state: &mut SessionState, error: ModelError) {
        if matches!(error, ModelError::Cancelled) {
            self.report.cancelled = true;
            self.progress(&[("Cancelled", StepStatus::Failed)]);
            return;
        }
        tracing::warn!(error = %error, "Model call failed, ending turn");
        self.report.error = Some(error.to_string());
        self.say(state, error.user_message());
        self.progress(&[
            ("Request sent", StepStatus::Completed),
            ("Error occurred", StepStatus::Failed),
        ]);
    }
}

pub(crate) async fn run_turn(
    state: &mut SessionState,
    model: &dyn ModelClient,
    cancel: &CancelFlag,
    input: TurnInput<'_>,
    sink: &mut dyn EventSink,
) -> TurnReport {
    let mut turn = Turn {
        cancel,
        sink,
        report: TurnReport::default(),
    };

    let (user_message, slash) = match input {
        TurnInput::Text { text, images } => {
            let slash = parse_skill_command(text)
                .filter(|c| is_valid_skill_name(&c.skill_name))
                .map(|c| (c.skill_name, c.raw_arguments));
            (ChatMessage::user_with_images(text, images), slash)
        }
        TurnInput::Skill {
            name,
            raw_arguments,
        } => {
            let text = format!("/{} {}", name, raw_arguments).trim_end().to_string();
            (ChatMessage::user(text), Some((name.to_string(), raw_arguments.to_string())))
        }
    };
    turn.sink.on_message_added(&user_message);
    state.history.push(user_message.clone());
    turn.progress(&[("Understanding request", StepStatus::InProgress)]);

    // ── Skills ──────────────────────────────────────────────────────────────
    let active = match slash {
        Some((name, raw)) => match user_skill(state, &name, &raw).await {
            Ok(active) => Some(active),
            Err(message) => {
                turn.report.error = Some(message.clone());
                turn.say(state, message);
                turn.progress(&[("Understanding request", StepStatus::Failed)]);
                return turn.report;
            }
        },
        None => auto_skill(state, &user_message.content).await,
    };
    turn.report.skill = active.as_ref().map(|a| a.definition.name.clone());

    // ── Model ───────────────────────────────────────────────────────────────
    let skills = ensure_skills(&mut state.skills, &state.config.skills);
    let mut conversation = vec![ChatMessage::system(build_system_prompt(
        &state.tools,
        skills,
        &state.config.workspace,
        state.config.enable_task_planning,
    ))];
    if let Some(active) = &active {
        conversation.push(ChatMessage::system(active.context.clone()));
    }
    conversation.extend(state.history.iter().cloned());

    turn.progress(&[
        ("Understanding request", StepStatus::Completed),
        ("Planning approach", StepStatus::InProgress),
    ]);
    let reply = match complete_cancellable(model, &conversation, cancel).await {
        Ok(reply) => reply,
        Err(e) => {
            turn.fail(state, e);
            return turn.report;
        }
    };
    conversation.push(ChatMessage::assistant(reply.as_str()));
    turn.say(state, reply.as_str());

    let blocks = extract_artifacts(&reply);
    for (name, content) in blocks.iter().filter(|(name, _)| name.as_str() != FALLBACK_KEY) {
        let artifact = state.artifacts.add(name.as_str(), Some(content.clone()));
        turn.sink.on_artifact_added(&artifact);
    }

    // ── Plan path ───────────────────────────────────────────────────────────
    if state.config.enable_task_planning {
        if let Some(mut plan) = parse_plan(&reply) {
            let before = conversation.len();
            let mut recorder = RecordingSink {
                inner: &mut *turn.sink,
                messages: Vec::new(),
            };
            let (outcome, tool_results) = {
                let mut ctx = PlanContext {
                    model,
                    tools: &state.tools,
                    artifacts: &mut state.artifacts,
                    artifact_map: blocks,
                    transcript: &mut conversation,
                    sink: &mut recorder,
                    cancel,
                    active_skill: active.as_ref().map(|a| &a.definition),
                    tool_results: Vec::new(),
                };
                let outcome = execute_plan(&mut plan, &mut ctx).await;
                (outcome, ctx.tool_results)
            };
            turn.report.messages.extend(recorder.messages);
            turn.report.tool_results.extend(tool_results);
            state.history.extend(conversation.drain(before..));
            turn.report.cancelled = outcome == PlanOutcome::Cancelled;
            turn.report.plan = Some(plan);
            turn.report.plan_outcome = Some(outcome);
            return turn.report;
        }
    }

    // ── Direct tool calls ───────────────────────────────────────────────────
    let calls = parse_tool_calls(&reply);
    if calls.is_empty() {
        turn.progress(&[
            ("Understanding request", StepStatus::Completed),
            ("Planning approach", StepStatus::Completed),
        ]);
        return turn.report;
    }
    turn.progress(&[
        ("Understanding request", StepStatus::Completed),
        ("Planning approach", StepStatus::Completed),
        ("Executing task", StepStatus::InProgress),
    ]);

    let active_skill = active.as_ref().map(|a| &a.definition);
    let mut executed = run_direct(state, &mut turn, calls, &blocks, active_skill).await;

    if executed.iter().any(|e| !e.result.success) && !cancel.is_cancelled() {
        tracing::info!("Tool calls failed, asking the model for one correction");
        conversation.push(ChatMessage::user(correction_request(&results_transcript(&executed))));
        match complete_cancellable(model, &conversation, cancel).await {
            Ok(fix) => {
                conversation.push(ChatMessage::assistant(fix.as_str()));
                turn.say(state, fix.as_str());
                let mut fix_blocks = extract_artifacts(&fix);
                for (name, content) in &blocks {
                    fix_blocks.entry(name.clone()).or_insert_with(|| content.clone());
                }
                let retry = parse_tool_calls(&fix);
                if retry.is_empty() {
                    // The model explained the failure instead of retrying.
                    return turn.report;
                }
                let more = run_direct(state, &mut turn, retry, &fix_blocks, active_skill).await;
                executed.extend(more);
            }
            Err(e) => {
                turn.fail(state, e);
                return turn.report;
            }
        }
    }

    if cancel.is_cancelled() {
        turn.report.cancelled = true;
        return turn.report;
    }

    conversation.push(ChatMessage::user(summary_request(&results_transcript(&executed))));
    match complete_cancellable(model, &conversation, cancel).await {
        Ok(summary) => {
            turn.say(state, summary);
            turn.progress(&[
                ("Understanding request", StepStatus::Completed),
                ("Planning approach", StepStatus::Completed),
                ("Executing task", StepStatus::Completed),
            ]);
        }
        Err(e) => turn.fail(state, e),
    }
    turn.report
}

async fn run_direct(
    state: &mut SessionState,
    turn: &mut Turn<'_>,
    mut calls: Vec<ToolCall>,
    blocks: &ArtifactMap,
    active_skill: Option<&SkillDefinition>,
) -> Vec<Executed> {
    resolve_artifact_references(&mut calls, blocks, &state.artifacts);
    let dispatcher = Dispatcher {
        tools: &state.tools,
        active_skill,
        cancel: turn.cancel,
    };
    let executed = dispatcher
        .run_calls(&calls, &mut state.artifacts, &mut *turn.sink)
        .await;
    turn.report
        .tool_results
        .extend(executed.iter().map(|e| e.result.clone()));
    executed
}

// ─── Skill resolution ───────────────────────────────────────────────────────

/// Resolve a `/name args` command. `Err` carries the message shown to the user.
async fn user_skill(state: &mut SessionState, name: &str, raw: &str) -> Result<ActiveSkill, String> {
    let invocation = create_skill_invocation(name, raw, InvokedBy::User);
    let shell = state.shell.clone();
    let registry = state.skills();

    if registry.get(name).is_none() {
        let available: Vec<String> = registry
            .user_invocable()
            .iter()
            .map(|s| format!("/{}", s.name))
            .collect();
        let listing = if available.is_empty() {
            "(无)".to_string()
        } else {
            available.join(", ")
        };
        tracing::info!(skill = name, "Unknown skill command");
        return Err(format!(
            "❌ {}\n\n可用的技能: {}",
            SkillError::NotFound(name.to_string()),
            listing
        ));
    }

    let result = execute_skill(registry, &invocation, shell.as_deref()).await;
    activate(registry, name, result).map_err(|e| format!("❌ {}", e))
}

/// Match free text against model-invocable skills and run the best one above threshold.
async fn auto_skill(state: &mut SessionState, text: &str) -> Option<ActiveSkill> {
    let threshold = state.config.skills.auto_invoke_threshold;
    let shell = state.shell.clone();
    let registry = state.skills();

    let best = registry
        .match_skills(text, DEFAULT_MATCH_LIMIT)
        .into_iter()
        .next()
        .filter(|m| m.score >= threshold)?;
    let name = best.skill.name.clone();
    tracing::info!(skill = %name, score = best.score, reason = %best.reason, "Auto-invoking skill");

    let invocation = create_skill_invocation(&name, "", InvokedBy::Model);
    let result = execute_skill(registry, &invocation, shell.as_deref()).await;
    match activate(registry, &name, result) {
        Ok(active) => Some(active),
        Err(e) => {
            tracing::warn!(skill = %name, error = %e, "Auto-invoked skill failed");
            None
        }
    }
}

fn activate(
    registry: &SkillRegistry,
    name: &str,
    result: SkillExecutionResult,
) -> Result<ActiveSkill, String> {
    if !result.success {
        return Err(result.error.unwrap_or_else(|| "未知错误".to_string()));
    }
    let definition = registry
        .get(name)
        .cloned()
        .ok_or_else(|| SkillError::NotFound(name.to_string()).to_string())?;

    let mut context = format!(
        "The user invoked the skill \"{}\". Follow its instructions for this request.\n\n{}",
        definition.name,
        result.output.unwrap_or_default()
    );
    if let Some(restriction) = tool_restriction_message(&definition) {
        context.push_str("\n\n");
        context.push_str(&restriction);
    }
    Ok(ActiveSkill {
        definition,
        context,
    })
}

/// Forwards every event and keeps the messages, so plan output lands in the turn report.
struct RecordingSink<'a> {
    inner: &'a mut dyn EventSink,
    messages: Vec<ChatMessage>,
}

impl EventSink for RecordingSink<'_> {
    fn on_message_added(&mut self, message: &ChatMessage) {
        self.messages.push(message.clone());
        self.inner.on_message_added(message);
    }

    fn on_progress_updated(&mut self, steps: &[ProgressStep]) {
        self.inner.on_progress_updated(steps);
    }

    fn on_task_step_updated(&mut self, step: &TaskStep) {
        self.inner.on_task_step_updated(step);
    }

    fn on_artifact_added(&mut self, artifact: &Artifact) {
        self.inner.on_artifact_added(artifact);
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        self.inner.on_tool_call(call);
    }

    fn on_tool_result(&mut self, call: &ToolCall, result: &ToolResult, formatted: &str) {
        self.inner.on_tool_result(call, result, formatted);
    }
}
