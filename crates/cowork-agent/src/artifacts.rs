//! Artifact linker.
//!
//! Models describe large files once in a readable fence (```` ```html:index.html ````) and
//! then issue a small `write_file` call that names only the path. This module extracts those
//! fences and fills in the missing `content` before the call is executed.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::types::ToolCall;

/// Map key holding the largest unlabeled code block.
pub const FALLBACK_KEY: &str = "__fallback__";

fn code_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```(\w+)(?::([^\n]+))?\n(.*?)```").expect("code block regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    pub language: String,
    pub filename: Option<String>,
    pub content: String,
}

/// Every ```` ```lang[:filename] ```` fence in source order, `tool:` fences included.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    code_block_re()
        .captures_iter(text)
        .map(|caps| CodeBlock {
            language: caps[1].to_string(),
            filename: caps
                .get(2)
                .map(|m| m.as_str().trim().to_string())
                .filter(|f| !f.is_empty()),
            content: caps[3].to_string(),
        })
        .collect()
}

/// filename → content, plus `__fallback__` when no fence carries a filename.
pub type ArtifactMap = BTreeMap<String, String>;

pub fn extract_artifacts(text: &str) -> ArtifactMap {
    let mut map = ArtifactMap::new();
    let mut fallback: Option<String> = None;

    for block in extract_code_blocks(text) {
        // Tool calls and plans are control fences, never file content.
        if block.language == "tool" || block.language == "plan" {
            continue;
        }
        match block.filename {
            Some(name) => {
                map.insert(name, block.content);
            }
            None => {
                if fallback
                    .as_ref()
                    .map_or(true, |f| block.content.len() > f.len())
                {
                    fallback = Some(block.content);
                }
            }
        }
    }

    if map.is_empty() {
        if let Some(content) = fallback {
            map.insert(FALLBACK_KEY.to_string(), content);
        }
    }
    map
}

/// Placeholder text a model writes instead of repeating a fenced file.
pub fn is_code_block_reference(content: &str) -> bool {
    let normalized = content.trim().to_lowercase();
    normalized.contains("[see code block")
        || normalized.contains("[参考上面的代码块")
        || normalized.contains("[见上面的代码块")
        || normalized == "[see above]"
        || normalized == "[参考上文]"
}

// ─── Artifacts ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artifact {
    pub id: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(filename: impl Into<String>, content: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename: filename.into(),
            content,
            created_at: Utc::now(),
        }
    }
}

/// Artifacts produced during one session, in creation order.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    items: Vec<Artifact>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an artifact and return a copy for event emission.
    pub fn add(&mut self, filename: impl Into<String>, content: Option<String>) -> Artifact {
        let artifact = Artifact::new(filename, content);
        self.items.push(artifact.clone());
        artifact
    }

    pub fn get(&self, id: &str) -> Option<&Artifact> {
        self.items.iter().find(|a| a.id == id)
    }

    pub fn all(&self) -> &[Artifact] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

// ─── Resolution ─────────────────────────────────────────────────────────────

/// Fill in `content` for `write_file` calls that reference an artifact or a fence.
///
/// Order: `artifact_id` from the store, then exact filename (full path or basename),
/// then `__fallback__`, then the first entry sharing the path's extension.
pub fn resolve_artifact_references(
    calls: &mut [ToolCall],
    artifacts: &ArtifactMap,
    store: &ArtifactStore,
) {
    for call in calls.iter_mut().filter(|c| c.tool == "write_file") {
        if let Some(id) = call.parameters.remove("artifact_id") {
            let id = id.as_str().unwrap_or_default().to_string();
            match store.get(&id).and_then(|a| a.content.clone()) {
                Some(content) => {
                    tracing::debug!(artifact_id = %id, "Inlined stored artifact");
                    call.parameters
                        .insert("content".into(), Value::String(content));
                    continue;
                }
                None => tracing::warn!(artifact_id = %id, "Unknown artifact id, dropped"),
            }
        }

        let has_inline = match call.parameters.get("content") {
            Some(Value::String(s)) => !s.is_empty() && !is_code_block_reference(s),
            Some(Value::Null) | None => false,
            Some(_) => true,
        };
        if has_inline {
            continue;
        }
        let Some(path) = call.str_param("path").map(str::to_string) else {
            continue;
        };

        if let Some(content) = lookup(&path, artifacts) {
            tracing::info!(path = %path, "Resolved write_file content from code block");
            call.parameters
                .insert("content".into(), Value::String(content.to_string()));
        } else {
            tracing::warn!(path = %path, "write_file has no content and no matching code block");
        }
    }
}

fn lookup<'a>(path: &str, artifacts: &'a ArtifactMap) -> Option<&'a str> {
    let basename = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    if let Some(c) = artifacts.get(path).or_else(|| artifacts.get(&basename)) {
        return Some(c);
    }
    if let Some(c) = artifacts.get(FALLBACK_KEY) {
        return Some(c);
    }
    let ext = Path::new(path).extension()?.to_str()?;
    artifacts
        .iter()
        .find(|(k, _)| Path::new(k.as_str()).extension().and_then(|e| e.to_str()) == Some(ext))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn write_call(params: Value) -> ToolCall {
        let Value::Object(map) = params else {
            panic!("object expected");
        };
        ToolCall::new("write_file", map)
    }

    #[test]
    fn test_extract_named_and_fallback_blocks() {
        let text = "```html:index.html\n<h1>Hi</h1>\n```\n```tool:write_file\n{\"path\":\"index.html\"}\n```";
        let map = extract_artifacts(text);
        assert_eq!(map.len(), 1);
        assert_eq!(map["index.html"], "<h1>Hi</h1>\n");

        let unnamed = "```js\nshort\n```\n```py\nmuch longer body\n```\n```txt\nsame length body\n```";
        let map = extract_artifacts(unnamed);
        assert_eq!(map.len(), 1);
        assert_eq!(map[FALLBACK_KEY], "much longer body\n");
    }

    #[test]
    fn test_tool_blocks_never_become_fallback() {
        let map = extract_artifacts("```tool:read_file\n{\"path\": \"a\"}\n```");
        assert!(map.is_empty());
    }

    #[test]
    fn test_plan_block_never_becomes_fallback() {
        let map = extract_artifacts("好的：\n```plan\n1. write the report [write_file]\n```");
        assert!(map.is_empty());
    }

    #[test]
    fn test_resolution_precedence() {
        let mut map = ArtifactMap::new();
        map.insert("a.txt".into(), "X".into());
        map.insert(FALLBACK_KEY.into(), "Y".into());
        let store = ArtifactStore::new();

        let mut calls = vec![
            write_call(json!({ "path": "a.txt" })),
            write_call(json!({ "path": "b.txt" })),
            write_call(json!({ "path": "out/a.txt", "content": "[see code block above]" })),
            write_call(json!({ "path": "c.txt", "content": "inline" })),
        ];
        resolve_artifact_references(&mut calls, &map, &store);

        assert_eq!(calls[0].str_param("content"), Some("X"));
        assert_eq!(calls[1].str_param("content"), Some("Y"));
        assert_eq!(calls[2].str_param("content"), Some("X"));
        assert_eq!(calls[3].str_param("content"), Some("inline"));
    }

    #[test]
    fn test_extension_match_is_last_resort() {
        let mut map = ArtifactMap::new();
        map.insert("style.css".into(), "body{}".into());
        let mut calls = vec![
            write_call(json!({ "path": "site/main.css" })),
            write_call(json!({ "path": "notes.md" })),
        ];
        resolve_artifact_references(&mut calls, &map, &ArtifactStore::new());
        assert_eq!(calls[0].str_param("content"), Some("body{}"));
        assert!(calls[1].parameters.get("content").is_none());
    }

    #[test]
    fn test_artifact_id_inlines_and_is_dropped() {
        let mut store = ArtifactStore::new();
        let artifact = store.add("report.md", Some("# Report".into()));
        let mut calls = vec![
            write_call(json!({ "path": "copy.md", "artifact_id": artifact.id })),
            write_call(json!({ "path": "x.md", "artifact_id": "missing" })),
        ];
        resolve_artifact_references(&mut calls, &ArtifactMap::new(), &store);

        assert_eq!(calls[0].str_param("content"), Some("# Report"));
        assert!(!calls[0].parameters.contains_key("artifact_id"));
        assert!(!calls[1].parameters.contains_key("artifact_id"));
        assert!(calls[1].parameters.get("content").is_none());
    }

    #[test]
    fn test_other_tools_untouched() {
        let mut map = ArtifactMap::new();
        map.insert(FALLBACK_KEY.into(), "Y".into());
        let mut calls = vec![ToolCall::new("read_file", Map::new())];
        resolve_artifact_references(&mut calls, &map, &ArtifactStore::new());
        assert!(calls[0].parameters.is_empty());
    }

    #[test]
    fn test_code_block_reference_detection() {
        assert!(is_code_block_reference("  [See code block above] "));
        assert!(is_code_block_reference("[参考上文]"));
        assert!(!is_code_block_reference("see above"));
    }
}
