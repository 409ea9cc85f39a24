//! Skill registry and invocation engine.
//!
//! - `registry`:   validated, precedence-aware skill table; matching and documentation
//! - `invocation`: `/name args` parsing and quote-aware argument splitting
//! - `executor`:   permission checks, `$ARGUMENTS` substitution, `` !`cmd` `` context, hooks,
//!                 and the per-skill tool allow-list

mod executor;
mod invocation;
mod registry;


pub use executor::{
    check_invocation_permission, check_tool_permission, execute_skill, extract_dynamic_commands,
    is_tool_allowed, prepare_skill_prompt, resolve_dynamic_context, substitute_arguments,
    tool_restriction_message, SkillExecutionResult,
};
pub use invocation::{
    create_skill_invocation, parse_arguments, parse_skill_command, InvokedBy, SkillCommand,
    SkillInvocation,
};
pub use registry::{RegistryStats, SkillMatch, SkillRegistry, SourceCounts};

/// Default number of `match_skills` candidates.
pub const DEFAULT_MATCH_LIMIT: usize = 3;
