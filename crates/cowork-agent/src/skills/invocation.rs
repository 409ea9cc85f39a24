//! Slash-command parsing and invocation records.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvokedBy {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillInvocation {
    pub skill_name: String,
    pub raw_arguments: String,
    pub arguments: Vec<String>,
    pub invoked_by: InvokedBy,
}

/// A `/name args…` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillCommand {
    pub skill_name: String,
    /// Whitespace-separated arguments.
    pub arguments: Vec<String>,
    /// Everything after the name, trimmed.
    pub raw_arguments: String,
}

/// Parse `/name args…`. Only input starting with `/` (after trimming) is a command.
pub fn parse_skill_command(input: &str) -> Option<SkillCommand> {
    let rest = input.trim().strip_prefix('/')?;
    let (name, raw) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    };
    if name.is_empty() {
        return None;
    }
    Some(SkillCommand {
        skill_name: name.to_string(),
        arguments: raw.split_whitespace().map(str::to_string).collect(),
        raw_arguments: raw.to_string(),
    })
}

/// Split on whitespace, keeping `'…'` and `"…"` groups together (quotes removed).
pub fn parse_arguments(raw: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in raw.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c.is_whitespace() => {
                if !current.is_empty() {
                    args.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
    }
    if !current.is_empty() {
        args.push(current);
    }
    args
}

pub fn create_skill_invocation(name: &str, raw_arguments: &str, invoked_by: InvokedBy) -> SkillInvocation {
    SkillInvocation {
        skill_name: name.to_string(),
        raw_arguments: raw_arguments.to_string(),
        arguments: parse_arguments(raw_arguments),
        invoked_by,
    }
}
