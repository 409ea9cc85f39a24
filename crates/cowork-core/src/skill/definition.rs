//! Skill data model and registration-time validation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Agent used for `context: fork` skills that do not name one.
pub const DEFAULT_FORK_AGENT: &str = "Explore";

/// Where a skill definition was loaded from. Higher precedence wins on name clashes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillSource {
    User,
    Project,
    Plugin,
}

impl SkillSource {
    /// Precedence rank: project > user > plugin.
    pub fn precedence(self) -> u8 {
        match self {
            SkillSource::Project => 3,
            SkillSource::User => 2,
            SkillSource::Plugin => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SkillSource::User => "user",
            SkillSource::Project => "project",
            SkillSource::Plugin => "plugin",
        }
    }
}

impl fmt::Display for SkillSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution context of a skill's instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillContext {
    /// Instructions are fed to the model in the current conversation.
    #[default]
    Main,
    /// Instructions run in an isolated sub-conversation.
    Fork,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillHooks {
    pub pre_execute: Option<String>,
    pub post_execute: Option<String>,
}

/// A parsed SKILL.md.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillDefinition {
    /// `{source}:{name}`
    pub id: String,
    pub name: String,
    pub description: String,
    pub argument_hint: Option<String>,
    pub disable_model_invocation: bool,
    pub user_invocable: bool,
    /// Tool allow-list; `None` means unrestricted. Entries may contain `*` wildcards.
    pub allowed_tools: Option<Vec<String>>,
    pub context: SkillContext,
    pub agent: Option<String>,
    pub model: Option<String>,
    pub hooks: Option<SkillHooks>,
    /// Raw template body (front matter stripped, trimmed).
    pub instructions: String,
    pub source: SkillSource,
    pub file_path: PathBuf,
    pub directory_path: PathBuf,
    #[serde(default)]
    pub supporting_files: Vec<PathBuf>,
}

fn skill_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9-]+$").expect("skill name regex"))
}

/// Whether `name` satisfies the skill naming rule (lowercase letters, digits, hyphens).
pub fn is_valid_skill_name(name: &str) -> bool {
    skill_name_re().is_match(name)
}

impl SkillDefinition {
    /// Check registration invariants and normalise the definition in place.
    ///
    /// Returns the list of violations; an empty list means the skill may be registered.
    /// A `fork` skill with no agent is defaulted to [`DEFAULT_FORK_AGENT`] (not an error).
    pub fn validate(&mut self) -> Vec<String> {
        let mut errors = Vec::new();
        if !is_valid_skill_name(&self.name) {
            errors.push(
                "Skill name must contain only lowercase letters, numbers, and hyphens".to_string(),
            );
        }
        if self.instructions.trim().is_empty() {
            errors.push("Skill instructions are required".to_string());
        }
        if self.context == SkillContext::Fork
            && self.agent.as_deref().map_or(true, |a| a.trim().is_empty())
        {
            self.agent = Some(DEFAULT_FORK_AGENT.to_string());
        }
        errors
    }

    /// Agent header for fork-context execution.
    pub fn fork_agent(&self) -> &str {
        self.agent
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .unwrap_or(DEFAULT_FORK_AGENT)
    }

    /// Whether the model may invoke this skill on its own.
    pub fn model_invocable(&self) -> bool {
        !self.disable_model_invocation
    }
}

#[cfg(test)]
pub(crate) fn sample_skill(name: &str, source: SkillSource) -> SkillDefinition {
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
