//! Skill definitions: the data model, SKILL.md parsing, and filesystem discovery.

pub mod definition;
pub mod discovery;
pub mod metadata;

pub use definition::{
    is_valid_skill_name, SkillContext, SkillDefinition, SkillHooks, SkillSource,
    DEFAULT_FORK_AGENT,
};
pub use discovery::{
    discover_skills, expand_home, list_supporting_files, DiscoveryError, DiscoveryResult,
};
pub use metadata::{parse_skill_content, parse_skill_file, SkillParseError};
