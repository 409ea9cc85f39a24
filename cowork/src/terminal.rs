//! Terminal rendering of session events.
//!
//! Assistant messages go to stdout; plan progress, tool activity and artifacts go to stderr
//! so `cowork run ... > out.md` captures only the reply.

use std::io::Write;

use cowork_agent::artifacts::Artifact;
use cowork_agent::plan::{StepStatus, TaskStep};
use cowork_agent::tools::generate_summary;
use cowork_agent::types::{safe_truncate, ProgressStep};
use cowork_agent::{ChatMessage, EventSink, Role, ToolCall, ToolResult};

const SECTION_SEP: &str = "──────────────────────────────";

pub struct TerminalEventSink {
    pub verbose: bool,
    /// Whether the "执行" header has been printed since the last assistant message.
    execution_section_shown: bool,
}

impl TerminalEventSink {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            execution_section_shown: false,
        }
    }

    fn msg(&self, s: &str) {
        eprintln!("{}", s);
    }

    fn show_execution_section(&mut self) {
        if !self.execution_section_shown {
            self.execution_section_shown = true;
            self.msg(&format!("─── 🔧 执行 ─── {}", SECTION_SEP));
        }
    }
}

fn status_icon(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "○",
        StepStatus::InProgress => "◐",
        StepStatus::Completed => "✅",
        StepStatus::Failed => "❌",
    }
}

fn brief(text: &str, max: usize) -> String {
    if text.len() > max {
        format!("{}…", safe_truncate(text, max))
    } else {
        text.to_string()
    }
}

impl EventSink for TerminalEventSink {
    fn on_message_added(&mut self, message: &ChatMessage) {
        // The prompt already echoed the user's input.
        if message.role != Role::Assistant || message.content.trim().is_empty() {
            return;
        }
        self.execution_section_shown = false;
        println!("{}", message.content);
        let _ = std::io::stdout().flush();
    }

    fn on_progress_updated(&mut self, steps: &[ProgressStep]) {
        if !self.verbose {
            return;
        }
        let line: Vec<String> = steps
            .iter()
            .map(|s| format!("{} {}", status_icon(s.status), s.label))
            .collect();
        self.msg(&format!("  {}", line.join("  ·  ")));
    }

    fn on_task_step_updated(&mut self, step: &TaskStep) {
        let tool = step
            .tool
            .as_deref()
            .map(|t| format!(" [{}]", t))
            .unwrap_or_default();
        match step.status {
            StepStatus::InProgress => {
                self.msg(&format!("─── 📋 {} ─── {}", step.id, SECTION_SEP));
                self.msg(&format!("  {} {}{}", status_icon(step.status), step.description, tool));
            }
            StepStatus::Failed => self.msg(&format!(
                "  {} {}: {}",
                status_icon(step.status),
                step.description,
                step.error.as_deref().unwrap_or("")
            )),
            StepStatus::Completed | StepStatus::Pending => {
                self.msg(&format!("  {} {}", status_icon(step.status), step.description))
            }
        }
    }

    fn on_artifact_added(&mut self, artifact: &Artifact) {
        self.msg(&format!("  📎 {}", artifact.filename));
    }

    fn on_tool_call(&mut self, call: &ToolCall) {
        self.show_execution_section();
        if self.verbose {
            let args = serde_json::to_string(&call.parameters).unwrap_or_default();
            self.msg(&format!("🔧 Tool: {}  args={}", call.tool, brief(&args, 200)));
        } else {
            self.msg(&format!("🔧 {}", generate_summary(call)));
        }
    }

    fn on_tool_result(&mut self, call: &ToolCall, result: &ToolResult, formatted: &str) {
        let icon = if result.success { "✅" } else { "❌" };
        if self.verbose {
            self.msg(&format!("  {} {}: {}", icon, call.tool, brief(formatted, 400)));
        } else {
            let first = formatted.lines().next().unwrap_or("(ok)");
            self.msg(&format!("  {} {} {}", icon, call.tool, brief(first, 80)));
        }
    }
}
