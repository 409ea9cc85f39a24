//! Structured-call parser: extracts fenced ```` ```tool:<name> ```` blocks from model text
//! and decodes their JSON bodies through the repair chain.

mod repair;

#[cfg(test)]
mod tests;

pub use repair::{
    fix_content_field, fix_unescaped_chars, repair_json, strip_comments, RepairStrategy,
    REPAIR_STRATEGIES,
};

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

use crate::types::{safe_truncate, ToolCall};

fn tool_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```tool:(\w+)\r?\n(.*?)```").expect("tool block regex"))
}

/// A decoded JSON body and the index of the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Repaired {
    pub value: Value,
    pub strategy: usize,
}

/// Run the repair chain, stopping at the first strategy that yields JSON.
///
/// Returns the last strategy's error when every strategy fails.
pub fn try_parse_json(body: &str) -> Result<Repaired, serde_json::Error> {
    let (_, first) = REPAIR_STRATEGIES[0];
    let mut last_err = match first(body) {
        Ok(value) => return Ok(Repaired { value, strategy: 0 }),
        Err(e) => e,
    };
    for (index, (_, strategy)) in REPAIR_STRATEGIES.iter().enumerate().skip(1) {
        match strategy(body) {
            Ok(value) => return Ok(Repaired { value, strategy: index }),
            Err(e) => last_err = e,
        }
    }
    Err(last_err)
}

/// Extract every `tool:` block from `text`, in source order.
///
/// Blocks that no strategy can decode, or that decode to something other than a JSON object,
/// are dropped with a warning; the remaining blocks are still returned.
pub fn parse_tool_calls(text: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    for caps in tool_block_re().captures_iter(text) {
        let tool = &caps[1];
        let body = &caps[2];
        match try_parse_json(body) {
            Ok(Repaired { value: Value::Object(parameters), strategy }) => {
                if strategy > 0 {
                    tracing::info!(
                        tool,
                        strategy,
                        name = REPAIR_STRATEGIES[strategy].0,
                        "tool call parsed after repair"
                    );
                }
                calls.push(ToolCall::new(tool, parameters));
            }
            Ok(Repaired { value, .. }) => {
                tracing::warn!(tool, kind = json_kind(&value), "tool call body is not a JSON object");
            }
            Err(e) => {
                tracing::warn!(
                    tool,
                    error = %e,
                    preview = safe_truncate(body, 200),
                    "failed to parse tool call"
                );
            }
        }
    }
    calls
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
