//! SKILL.md parsing: YAML front matter between `---` fences, followed by the instruction body.

use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

use super::definition::{SkillContext, SkillDefinition, SkillHooks, SkillSource};

#[derive(Debug, Error)]
pub enum SkillParseError {
    #[error("No YAML front matter found")]
    MissingFrontMatter,
    #[error("Failed to parse YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid skill file: missing name in front matter")]
    MissingName,
    #[error("Skill file too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// `allowed-tools` accepts either a YAML list or a comma-separated string.
#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum AllowedTools {
    List(Vec<String>),
    Csv(String),
}

impl AllowedTools {
    fn into_vec(self) -> Vec<String> {
        let items = match self {
            AllowedTools::List(items) => items,
            AllowedTools::Csv(raw) => raw.split(',').map(str::to_string).collect(),
        };
        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
struct RawHooks {
    #[serde(default, rename = "pre-execute")]
    pre_execute: Option<String>,
    #[serde(default, rename = "post-execute")]
    post_execute: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct FrontMatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "argument-hint")]
    argument_hint: Option<String>,
    #[serde(default, rename = "disable-model-invocation")]
    disable_model_invocation: Option<bool>,
    #[serde(default, rename = "user-invocable")]
    user_invocable: Option<bool>,
    #[serde(default, rename = "allowed-tools")]
    allowed_tools: Option<AllowedTools>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    hooks: Option<RawHooks>,
}

fn front_matter_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)\A---[ \t]*\n(.*?)\n---[ \t]*(?:\n(.*))?\z")
            .expect("SKILL.md front matter regex")
    })
}

fn non_blank(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Parse SKILL.md content into a definition. Validation is left to registration.
pub fn parse_skill_content(
    content: &str,
    file_path: &Path,
    directory_path: &Path,
    source: SkillSource,
) -> Result<SkillDefinition, SkillParseError> {
    let normalized = content.replace("\r\n", "\n");
    let caps = front_matter_re()
        .captures(&normalized)
        .ok_or(SkillParseError::MissingFrontMatter)?;
    let yaml = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str());

    let fm: FrontMatter = if yaml.trim().is_empty() {
        FrontMatter::default()
    } else {
        serde_yaml::from_str(yaml)?
    };

    let name = non_blank(fm.name).ok_or(SkillParseError::MissingName)?;
    let context = match fm.context.as_deref().map(str::trim) {
        Some("fork") => SkillContext::Fork,
        Some("main") | None => SkillContext::Main,
        Some(other) => {
            tracing::warn!(skill = %name, context = other, "unknown skill context, using main");
            SkillContext::Main
        }
    };
    let hooks = fm.hooks.map(|h| SkillHooks {
        pre_execute: non_blank(h.pre_execute),
        post_execute: non_blank(h.post_execute),
    });

    Ok(SkillDefinition {
        id: format!("{}:{}", source, name),
        description: fm.description.map(|d| d.trim().to_string()).unwrap_or_default(),
        argument_hint: non_blank(fm.argument_hint),
        disable_model_invocation: fm.disable_model_invocation.unwrap_or(false),
        user_invocable: fm.user_invocable.unwrap_or(true),
        allowed_tools: fm.allowed_tools.map(AllowedTools::into_vec),
        context,
        agent: non_blank(fm.agent),
        model: non_blank(fm.model),
        hooks,
        instructions: body.trim().to_string(),
        source,
        file_path: file_path.to_path_buf(),
        directory_path: directory_path.to_path_buf(),
        supporting_files: Vec::new(),
        name,
    })
}

/// Read and parse `SKILL.md` at `file_path`, rejecting files longer than `max_len` bytes.
pub fn parse_skill_file(
    file_path: &Path,
    source: SkillSource,
    max_len: usize,
) -> Result<SkillDefinition, SkillParseError> {
    let content = std::fs::read_to_string(file_path).map_err(|e| SkillParseError::Io {
        path: file_path.to_path_buf(),
        source: e,
    })?;
    if content.len() > max_len {
        return Err(SkillParseError::TooLarge {
            size: content.len(),
            max: max_len,
        });
    }
    let dir = file_path.parent().unwrap_or_else(|| Path::new("."));
    parse_skill_content(&content, file_path, dir, source)
}
