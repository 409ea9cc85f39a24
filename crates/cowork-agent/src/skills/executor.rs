//! Skill execution: permission checks, argument substitution, dynamic context, hooks.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use regex::{Captures, Regex};

use cowork_core::skill::{SkillContext, SkillDefinition};

use super::invocation::{InvokedBy, SkillInvocation};
use super::registry::SkillRegistry;
use crate::error::{SkillError, ToolError};
use crate::runtime::ShellRunner;
use crate::types::ToolCall;

#[derive(Debug, Clone, PartialEq)]
pub struct SkillExecutionResult {
    pub success: bool,
    pub output: Option<String>,
    pub error: Option<String>,
    pub duration: Duration,
    pub tool_calls: Vec<ToolCall>,
}

impl SkillExecutionResult {
    fn ok(output: String, started: Instant) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            duration: started.elapsed(),
            tool_calls: Vec::new(),
        }
    }

    fn failed(error: SkillError, started: Instant) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.to_string()),
            duration: started.elapsed(),
            tool_calls: Vec::new(),
        }
    }
}

/// Reject a call the skill does not accept from this caller.
pub fn check_invocation_permission(
    skill: &SkillDefinition,
    invoked_by: InvokedBy,
) -> Result<(), SkillError> {
    match invoked_by {
        InvokedBy::User if !skill.user_invocable => {
            Err(SkillError::NotUserInvocable(skill.name.clone()))
        }
        InvokedBy::Model if skill.disable_model_invocation => {
            Err(SkillError::ModelInvocationDisabled(skill.name.clone()))
        }
        _ => Ok(()),
    }
}

/// Resolve and run an invocation. Never fails: every problem becomes `success: false`.
///
/// Without a shell runner, `` !`cmd` `` tokens are left as written and hooks are skipped.
pub async fn execute_skill(
    registry: &SkillRegistry,
    invocation: &SkillInvocation,
    shell: Option<&dyn ShellRunner>,
) -> SkillExecutionResult {
    let started = Instant::now();

    let Some(skill) = registry.get(&invocation.skill_name) else {
        return SkillExecutionResult::failed(
            SkillError::NotFound(invocation.skill_name.clone()),
            started,
        );
    };
    if let Err(e) = check_invocation_permission(skill, invocation.invoked_by) {
        tracing::warn!(skill = %skill.name, error = %e, "Skill invocation rejected");
        return SkillExecutionResult::failed(e, started);
    }

    tracing::info!(
        skill = %skill.name,
        invoked_by = ?invocation.invoked_by,
        args = invocation.arguments.len(),
        "Executing skill"
    );

    let mut instructions = substitute_arguments(&skill.instructions, &invocation.arguments);
    if let Some(shell) = shell {
        instructions = resolve_dynamic_context(&instructions, shell).await;
    }

    let hooks = skill.hooks.clone().unwrap_or_default();
    if let (Some(cmd), Some(shell)) = (hooks.pre_execute.as_deref(), shell) {
        run_hook(&skill.name, "pre-execute", cmd, shell).await;
    }

    let output = match skill.context {
        SkillContext::Main => instructions,
        SkillContext::Fork => format!("[Subagent: {}]\n\n{}", skill.fork_agent(), instructions),
    };

    if let (Some(cmd), Some(shell)) = (hooks.post_execute.as_deref(), shell) {
        run_hook(&skill.name, "post-execute", cmd, shell).await;
    }

    SkillExecutionResult::ok(output, started)
}

/// Hook output is not fed anywhere; only side effects count.
async fn run_hook(skill: &str, phase: &str, command: &str, shell: &dyn ShellRunner) {
    match shell.run(command).await {
        Ok(out) => tracing::debug!(
            skill,
            phase,
            exit_code = out.exit_code,
            stdout = %out.stdout,
            "Skill hook finished"
        ),
        Err(e) => tracing::warn!(skill, phase, error = %e, "Skill hook failed"),
    }
}

// ─── Substitution ───────────────────────────────────────────────────────────

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$(?:ARGUMENTS(?:\[(\d+)\])?|(\d+)|\{([A-Z_][A-Z0-9_]*)\})")
            .expect("placeholder regex")
    })
}

fn dynamic_command_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!`([^`]+)`").expect("dynamic command regex"))
}

/// Expand `$ARGUMENTS`, `$ARGUMENTS[N]` (0-based), `$N` (1-based) and `${ENV_VAR}`.
pub fn substitute_arguments(instructions: &str, args: &[String]) -> String {
    substitute_with_env(instructions, args, |name| std::env::var(name).ok())
}

/// Single left-to-right pass; substituted text is never rescanned.
pub(crate) fn substitute_with_env(
    instructions: &str,
    args: &[String],
    env: impl Fn(&str) -> Option<String>,
) -> String {
    let positional = |i: Option<usize>| i.and_then(|i| args.get(i)).cloned().unwrap_or_default();

    placeholder_re()
        .replace_all(instructions, |caps: &Captures| {
            if let Some(idx) = caps.get(1) {
                positional(idx.as_str().parse().ok())
            } else if let Some(n) = caps.get(2) {
                let n: Option<usize> = n.as_str().parse().ok();
                positional(n.and_then(|n| n.checked_sub(1)))
            } else if let Some(var) = caps.get(3) {
                env(var.as_str()).unwrap_or_default()
            } else {
                args.join(" ")
            }
        })
        .into_owned()
}

/// Commands in `` !`cmd` `` tokens, in order of appearance.
pub fn extract_dynamic_commands(instructions: &str) -> Vec<String> {
    dynamic_command_re()
        .captures_iter(instructions)
        .map(|c| c[1].to_string())
        .collect()
}

/// Replace each `` !`cmd` `` with the command's stdout, or `[Error: …]` on failure.
/// Each distinct command runs once.
pub async fn resolve_dynamic_context(instructions: &str, shell: &dyn ShellRunner) -> String {
    let commands = extract_dynamic_commands(instructions);
    if commands.is_empty() {
        return instructions.to_string();
    }
    tracing::debug!(count = commands.len(), "Injecting dynamic context");

    let mut outputs: HashMap<String, String> = HashMap::new();
    for cmd in commands {
        if outputs.contains_key(&cmd) {
            continue;
        }
        let text = match shell.run(&cmd).await {
            Ok(out) if out.success() => out.stdout,
            Ok(out) => {
                let reason = if out.stderr.trim().is_empty() {
                    format!("exit code {}", out.exit_code)
                } else {
                    out.stderr.trim().to_string()
                };
                format!("[Error: {}]", reason)
            }
            Err(e) => format!("[Error: {}]", e),
        };
        outputs.insert(cmd, text);
    }

    dynamic_command_re()
        .replace_all(instructions, |caps: &Captures| {
            outputs.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

// ─── Prompts and tool permissions ───────────────────────────────────────────

/// Render a skill for direct inclusion in a model prompt.
pub fn prepare_skill_prompt(skill: &SkillDefinition, args: &[String]) -> String {
    let mut prompt = format!("## Skill: {}\n\n", skill.name);
    if !skill.description.is_empty() {
        prompt.push_str(&format!("**Description**: {}\n\n", skill.description));
    }
    if let Some(tools) = restricted_tools(skill) {
        prompt.push_str(&format!("**Allowed Tools**: {}\n", tools.join(", ")));
        prompt.push_str("*Note: Only use the tools listed above for this skill.*\n\n");
    }
    prompt.push_str(&format!(
        "## Instructions\n\n{}\n",
        substitute_arguments(&skill.instructions, args)
    ));
    prompt
}

pub fn tool_restriction_message(skill: &SkillDefinition) -> Option<String> {
    restricted_tools(skill).map(|tools| {
        format!(
            "This skill is restricted to the following tools: {}",
            tools.join(", ")
        )
    })
}

fn restricted_tools(skill: &SkillDefinition) -> Option<&[String]> {
    skill
        .allowed_tools
        .as_deref()
        .filter(|tools| !tools.is_empty())
}

/// Whether `tool` is within the skill's allow-list. `*` matches any run of characters;
/// every other character is literal.
pub fn is_tool_allowed(skill: &SkillDefinition, tool: &str) -> bool {
    let Some(allowed) = restricted_tools(skill) else {
        return true;
    };
    allowed.iter().any(|pattern| {
        if !pattern.contains('*') {
            return pattern == tool;
        }
        let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
        Regex::new(&format!("^{}$", escaped.join(".*")))
            .map(|re| re.is_match(tool))
            .unwrap_or(false)
    })
}

/// `Err` when a restrictive skill is active and `call` is outside its allow-list.
pub fn check_tool_permission(
    active: Option<&SkillDefinition>,
    call: &ToolCall,
) -> Result<(), ToolError> {
    match active {
        Some(skill) if !is_tool_allowed(skill, &call.tool) => Err(ToolError::NotAllowed {
            tool: call.tool.clone(),
            skill: skill.name.clone(),
        }),
        _ => Ok(()),
    }
}
