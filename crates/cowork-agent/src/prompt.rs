//! System prompt construction.
//!
//! Rebuilt every turn from the live registries, so the model always sees the tools and
//! skills that actually exist.

use std::path::Path;

use crate::plan::planning_prompt;
use crate::skills::SkillRegistry;
use crate::tools::ToolRegistry;

/// Default system prompt for the agent.
const BASE_SYSTEM_PROMPT: &str = r#"You are Cowork, an AI assistant that works inside the user's workspace.

CRITICAL RULE: you MUST actually call tools to perform actions. NEVER claim you have created, changed or fetched anything unless you have invoked the corresponding tool in this turn and received a successful result.

When using tools:
- Emit each tool call as its own fenced block: ```tool:<tool_name> followed by a JSON object of parameters
- Use read_file before modifying an existing file
- For large files, write the content once in a fenced block named after the file (```lang:path/to/file) and call write_file with only the path
- All paths are relative to the workspace root
- Tool calls run in the order you write them; a later call may rely on an earlier one

Reply in the user's language. Be concise and accurate."#;

/// Assemble base instructions, tool documentation, the planning section and skills.
pub fn build_system_prompt(
    tools: &ToolRegistry,
    skills: &SkillRegistry,
    workspace: &Path,
    enable_planning: bool,
) -> String {
    let mut parts = vec![
        BASE_SYSTEM_PROMPT.to_string(),
        format!("Workspace: {}", workspace.display()),
        tools.documentation(),
    ];
    if enable_planning {
        parts.push(planning_prompt().to_string());
    }
    parts.push(skills.generate_skills_documentation());
    parts.join("\n\n")
}

/// Prompt asking the model to report on executed tool calls.
pub fn summary_request(results: &str) -> String {
    format!(
        "Tool results:\n{}\n\nSummarize for the user what was done and what came back. \
         Do not emit further tool calls.",
        results
    )
}

/// Prompt giving the model one chance to fix failed tool calls.
pub fn correction_request(results: &str) -> String {
    format!(
        "Tool results:\n{}\n\nSome tool calls failed. Fix the parameters and emit corrected \
         tool calls for the failed ones only. If the failure cannot be fixed, explain why instead.",
        results
    )
}
