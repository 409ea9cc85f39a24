//! Stepwise plan execution.
//!
//! Each step re-grounds the model with the running transcript and a compact summary of
//! what earlier steps produced. The first failure freezes the plan: later steps stay
//! `pending` and none of their tools run.

use serde_json::Value;

use cowork_core::skill::SkillDefinition;

use super::{StepStatus, TaskPlan};
use crate::artifacts::{extract_artifacts, resolve_artifact_references, ArtifactMap, ArtifactStore};
use crate::dispatch::{results_transcript, Dispatcher};
use crate::error::ModelError;
use crate::llm::{complete_cancellable, ModelClient};
use crate::parser::parse_tool_calls;
use crate::tools::ToolRegistry;
use crate::types::{CancelFlag, ChatMessage, EventSink, ToolResult};

/// Collaborators and session state a plan execution borrows.
pub struct PlanContext<'a> {
    pub model: &'a dyn ModelClient,
    pub tools: &'a ToolRegistry,
    pub artifacts: &'a mut ArtifactStore,
    /// Code blocks from the reply that carried the plan.
    pub artifact_map: ArtifactMap,
    /// Running transcript, system prompt first. Step replies are appended.
    pub transcript: &'a mut Vec<ChatMessage>,
    pub sink: &'a mut dyn EventSink,
    pub cancel: &'a CancelFlag,
    /// Skill whose allow-list confines every tool call.
    pub active_skill: Option<&'a SkillDefinition>,
    /// Results of every tool call the plan ran, in order.
    pub tool_results: Vec<ToolResult>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    Completed,
    Failed { step_id: String, error: String },
    Cancelled,
}

/// How one step ended, before the plan reacts to it.
enum StepEnd {
    Done(Value),
    Failed(String),
    Cancelled,
}

/// Drive `plan` to completion, first failure, or cancellation.
pub async fn execute_plan(plan: &mut TaskPlan, ctx: &mut PlanContext<'_>) -> PlanOutcome {
    let total = plan.len();
    tracing::info!(steps = total, "Executing task plan");

    for index in 0..total {
        if ctx.cancel.is_cancelled() {
            return cancel_plan(plan, index, ctx);
        }

        plan.mark_running(index);
        ctx.sink.on_progress_updated(&plan.progress());
        ctx.sink.on_task_step_updated(&plan.steps[index]);

        let step = &plan.steps[index];
        tracing::info!(
            step_id = %step.id,
            tool = step.tool.as_deref().unwrap_or("-"),
            "Plan step started"
        );
        let prior = plan.prior_results(index);
        let end = match step.tool.clone() {
            Some(tool) => {
                let request = tool_step_request(index, total, &step.description, &tool, &prior);
                run_tool_step(&tool, request, ctx).await
            }
            None => {
                let request = reasoning_step_request(index, total, &step.description, &prior);
                run_reasoning_step(request, ctx).await
            }
        };

        match end {
            StepEnd::Done(result) => {
                let step = &mut plan.steps[index];
                step.status = StepStatus::Completed;
                step.result = Some(result);
                ctx.sink.on_task_step_updated(step);
            }
            StepEnd::Failed(error) => return fail_plan(plan, index, error, ctx),
            StepEnd::Cancelled => return cancel_plan(plan, index, ctx),
        }
    }

    plan.complete_all();
    ctx.sink.on_progress_updated(&plan.progress());
    tracing::info!(steps = total, "Task plan completed");
    PlanOutcome::Completed
}

async fn run_tool_step(tool: &str, request: String, ctx: &mut PlanContext<'_>) -> StepEnd {
    let reply = match ask(request, ctx).await {
        Ok(reply) => reply,
        Err(ModelError::Cancelled) => return StepEnd::Cancelled,
        Err(e) => return StepEnd::Failed(e.to_string()),
    };
    let message = ChatMessage::assistant(reply.as_str());
    ctx.sink.on_message_added(&message);
    ctx.transcript.push(message);

    let mut calls = parse_tool_calls(&reply);
    if calls.is_empty() {
        tracing::warn!(tool, "Model returned no tool call for a tool step");
        return StepEnd::Failed(format!(
            "模型未返回工具调用 (需要调用 {} 工具)",
            tool
        ));
    }

    let mut blocks = extract_artifacts(&reply);
    for (name, content) in &ctx.artifact_map {
        blocks.entry(name.clone()).or_insert_with(|| content.clone());
    }
    resolve_artifact_references(&mut calls, &blocks, ctx.artifacts);

    let dispatcher = Dispatcher {
        tools: ctx.tools,
        active_skill: ctx.active_skill,
        cancel: ctx.cancel,
    };
    let executed = dispatcher.run_calls(&calls, ctx.artifacts, ctx.sink).await;
    ctx.tool_results.extend(executed.iter().map(|e| e.result.clone()));
    if executed.len() < calls.len() {
        return StepEnd::Cancelled;
    }
    ctx.transcript
        .push(ChatMessage::user(format!("Tool results:\n{}", results_transcript(&executed))));

    // The step's status follows its first call.
    let first = &executed[0].result;
    if first.success {
        StepEnd::Done(first.data.clone().unwrap_or(Value::Null))
    } else {
        StepEnd::Failed(first.error.clone().unwrap_or_else(|| "未知错误".to_string()))
    }
}

/// A step with no tool cannot fail at this layer, except through the model transport.
async fn run_reasoning_step(request: String, ctx: &mut PlanContext<'_>) -> StepEnd {
    match ask(request, ctx).await {
        Ok(reply) => {
            let message = ChatMessage::assistant(reply.as_str());
            ctx.sink.on_message_added(&message);
            ctx.transcript.push(message);
            StepEnd::Done(Value::String(reply))
        }
        Err(ModelError::Cancelled) => StepEnd::Cancelled,
        Err(e) => StepEnd::Failed(e.to_string()),
    }
}

async fn ask(request: String, ctx: &mut PlanContext<'_>) -> Result<String, ModelError> {
    let mut messages = ctx.transcript.clone();
    messages.push(ChatMessage::user(request));
    complete_cancellable(ctx.model, &messages, ctx.cancel).await
}

fn fail_plan(plan: &mut TaskPlan, index: usize, error: String, ctx: &mut PlanContext<'_>) -> PlanOutcome {
    let step = &mut plan.steps[index];
    step.status = StepStatus::Failed;
    step.error = Some(error.clone());
    tracing::warn!(step_id = %step.id, error = %error, "Plan step failed, halting plan");

    ctx.sink.on_task_step_updated(step);
    ctx.sink.on_progress_updated(&plan.progress());

    let step = &plan.steps[index];
    let message = ChatMessage::assistant(format!(
        "❌ 步骤 {}「{}」失败: {}\n\n后续步骤已停止执行。",
        index + 1,
        step.description,
        error
    ));
    ctx.sink.on_message_added(&message);
    ctx.transcript.push(message);

    PlanOutcome::Failed {
        step_id: step.id.clone(),
        error,
    }
}

fn cancel_plan(plan: &mut TaskPlan, index: usize, ctx: &mut PlanContext<'_>) -> PlanOutcome {
    for step in plan.steps.iter_mut().skip(index) {
        step.status = StepStatus::Pending;
    }
    tracing::info!(stopped_at = index + 1, "Task plan cancelled");
    if let Some(step) = plan.steps.get(index) {
        ctx.sink.on_task_step_updated(step);
    }
    ctx.sink.on_progress_updated(&plan.progress());
    PlanOutcome::Cancelled
}

// ─── Step prompts ───────────────────────────────────────────────────────────

fn prior_section(prior: &str) -> String {
    if prior.is_empty() {
        "Results of previous steps: (none)".to_string()
    } else {
        format!("Results of previous steps:\n{}", prior)
    }
}

fn tool_step_request(index: usize, total: usize, description: &str, tool: &str, prior: &str) -> String {
    format!(
        "Execute step {}/{} of the plan: {}\n\n\
         You MUST call the `{}` tool now. Reply with a ```tool:{}``` block containing its JSON \
         parameters. Do not describe the call without making it.\n\n{}",
        index + 1,
        total,
        description,
        tool,
        tool,
        prior_section(prior)
    )
}

fn reasoning_step_request(index: usize, total: usize, description: &str, prior: &str) -> String {
    format!(
        "Step {}/{} of the plan: {}\n\n\
         This step needs no tool. Using the results of the previous steps, give your analysis \
         concisely. Do not emit tool calls.\n\n{}",
        index + 1,
        total,
        description,
        prior_section(prior)
    )
}
