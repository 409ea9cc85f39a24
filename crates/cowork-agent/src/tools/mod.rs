//! Tool registry and built-in tools.
//!
//! - `builtin`:  the eight built-in tool definitions and their handlers
//! - `registry`: name → definition lookup and the executor
//! - `format`:   human-readable result rendering and one-line summaries
//! - `docs`:     the tool catalogue embedded in the system prompt
//!
//! Tools form a closed set (`ToolKind`); dispatch is an exhaustive match, so adding a
//! tool without a handler does not compile.

pub mod builtin;
mod docs;
mod format;
mod registry;


pub use docs::generate_tools_documentation;
pub use format::{format_result, format_size, generate_summary};
pub use registry::ToolRegistry;

use serde_json::Value;

// ─── Tool kinds ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    WriteFile,
    ReadFile,
    ListDirectory,
    CreateDirectory,
    DeleteFile,
    MoveFile,
    SearchFiles,
    FetchUrl,
}

impl ToolKind {
    /// Registration order of the built-in tools.
    pub const ALL: [ToolKind; 8] = [
        ToolKind::WriteFile,
        ToolKind::ReadFile,
        ToolKind::ListDirectory,
        ToolKind::CreateDirectory,
        ToolKind::DeleteFile,
        ToolKind::MoveFile,
        ToolKind::SearchFiles,
        ToolKind::FetchUrl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::WriteFile => "write_file",
            ToolKind::ReadFile => "read_file",
            ToolKind::ListDirectory => "list_directory",
            ToolKind::CreateDirectory => "create_directory",
            ToolKind::DeleteFile => "delete_file",
            ToolKind::MoveFile => "move_file",
            ToolKind::SearchFiles => "search_files",
            ToolKind::FetchUrl => "fetch_url",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl std::fmt::Display for ToolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ─── Definitions ────────────────────────────────────────────────────────────

/// Semantic parameter type, as shown in the tool documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Object,
    Any,
}

impl ParamType {
    pub fn as_str(self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Object => "object",
            ParamType::Any => "any",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolParameter {
    pub name: &'static str,
    pub param_type: ParamType,
    pub description: &'static str,
    pub required: bool,
}

impl ToolParameter {
    pub fn required(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            param_type,
            description,
            required: true,
        }
    }

    pub fn optional(name: &'static str, param_type: ParamType, description: &'static str) -> Self {
        Self {
            name,
            param_type,
            description,
            required: false,
        }
    }
}

/// A documented example call. The fenced code is rendered from `parameters`, so examples
/// can never drift from the call syntax the parser accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolExample {
    pub description: &'static str,
    pub parameters: Value,
}

impl ToolExample {
    pub fn code(&self, tool: &str) -> String {
        let body = serde_json::to_string_pretty(&self.parameters).unwrap_or_else(|_| "{}".into());
        format!("```tool:{}\n{}\n```", tool, body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolDefinition {
    pub kind: ToolKind,
    pub description: &'static str,
    pub parameters: Vec<ToolParameter>,
    pub examples: Vec<ToolExample>,
}

impl ToolDefinition {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}
