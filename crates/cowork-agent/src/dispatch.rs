//! Executor-facing layer shared by plan steps and direct tool calls.
//!
//! Every call passes the active skill's allow-list, is announced to the sink, executed,
//! rendered, and (for a successful `write_file`) recorded as an artifact.

use cowork_core::skill::SkillDefinition;

use crate::artifacts::ArtifactStore;
use crate::skills::check_tool_permission;
use crate::tools::{format_result, ToolKind, ToolRegistry};
use crate::types::{CancelFlag, EventSink, ToolCall, ToolResult};

/// One executed call with its user-facing rendering.
#[derive(Debug, Clone)]
pub(crate) struct Executed {
    pub call: ToolCall,
    pub result: ToolResult,
    pub formatted: String,
}

/// Everything a call needs besides the call itself.
pub(crate) struct Dispatcher<'a> {
    pub tools: &'a ToolRegistry,
    pub active_skill: Option<&'a SkillDefinition>,
    pub cancel: &'a CancelFlag,
}

impl Dispatcher<'_> {
    /// Run calls strictly in order. Stops early (returning what ran) once cancelled.
    pub async fn run_calls(
        &self,
        calls: &[ToolCall],
        artifacts: &mut ArtifactStore,
        sink: &mut dyn EventSink,
    ) -> Vec<Executed> {
        let mut executed = Vec::with_capacity(calls.len());
        for call in calls {
            if self.cancel.is_cancelled() {
                tracing::info!(remaining = calls.len() - executed.len(), "Tool calls cancelled");
                break;
            }
            executed.push(self.run_call(call, artifacts, sink).await);
        }
        executed
    }

    async fn run_call(
        &self,
        call: &ToolCall,
        artifacts: &mut ArtifactStore,
        sink: &mut dyn EventSink,
    ) -> Executed {
        sink.on_tool_call(call);

        let result = match check_tool_permission(self.active_skill, call) {
            Ok(()) => self.tools.execute(call).await,
            Err(e) => {
                tracing::warn!(tool = %call.tool, error = %e, "Tool call blocked by skill");
                ToolResult::failure(e.to_string())
            }
        };

        let mut formatted = format_result(&call.tool, &result);
        if self.tools.get(&call.tool).is_none() {
            formatted.push_str(&format!("\n可用的工具: {}", self.tools.names().join(", ")));
        }
        sink.on_tool_result(call, &result, &formatted);

        if result.success && ToolKind::from_name(&call.tool) == Some(ToolKind::WriteFile) {
            if let Some(path) = call.str_param("path") {
                let content = call.str_param("content").map(str::to_string);
                let artifact = artifacts.add(path, content);
                tracing::debug!(artifact_id = %artifact.id, path, "Registered artifact");
                sink.on_artifact_added(&artifact);
            }
        }

        Executed {
            call: call.clone(),
            result,
            formatted,
        }
    }
}

/// Feed-back text for the model: one line per call with its rendering.
pub(crate) fn results_transcript(executed: &[Executed]) -> String {
    executed
        .iter()
        .map(|e| format!("[{}] {}", e.call.tool, e.formatted))
        .collect::<Vec<_>>()
        .join("\n\n")
}
