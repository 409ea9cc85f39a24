//! Built-in tools: workspace file operations and `fetch_url`.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use super::{ParamType, ToolDefinition, ToolExample, ToolKind, ToolParameter};
use crate::error::ToolError;
use crate::runtime::{HttpFetcher, HttpRequest, Workspace};

/// Collaborators a handler may touch.
pub(crate) struct ToolContext<'a> {
    pub workspace: &'a dyn Workspace,
    pub http: &'a dyn HttpFetcher,
}

/// Definitions of every built-in tool, in registration order.
pub fn definitions() -> Vec<ToolDefinition> {
    ToolKind::ALL.into_iter().map(definition).collect()
}

pub fn definition(kind: ToolKind) -> ToolDefinition {
    use ParamType::{Any, Object, String as Str};
    match kind {
        ToolKind::WriteFile => ToolDefinition {
            kind,
            description: "Write content to a file (creates or overwrites)",
            parameters: vec![
                ToolParameter::required("path", Str, "File path relative to workspace"),
                ToolParameter::required("content", Str, "Content to write to the file"),
            ],
            examples: vec![
                ToolExample {
                    description: "Create a simple text file",
                    parameters: json!({ "path": "hello.txt", "content": "Hello World" }),
                },
                ToolExample {
                    description: "Create a markdown file",
                    parameters: json!({
                        "path": "notes.md",
                        "content": "# My Notes\n\nThis is my note content."
                    }),
                },
            ],
        },
        ToolKind::ReadFile => ToolDefinition {
            kind,
            description: "Read content from a file",
            parameters: vec![ToolParameter::required(
                "path",
                Str,
                "File path relative to workspace",
            )],
            examples: vec![ToolExample {
                description: "Read a text file",
                parameters: json!({ "path": "notes.md" }),
            }],
        },
        ToolKind::ListDirectory => ToolDefinition {
            kind,
            description: "List files and directories in a path",
            parameters: vec![ToolParameter::optional(
                "path",
                Str,
                "Directory path (default: current directory)",
            )],
            examples: vec![ToolExample {
                description: "List current directory",
                parameters: json!({ "path": "." }),
            }],
        },
        ToolKind::CreateDirectory => ToolDefinition {
            kind,
            description: "Create a new directory",
            parameters: vec![ToolParameter::required(
                "path",
                Str,
                "Directory path to create",
            )],
            examples: vec![ToolExample {
                description: "Create a folder",
                parameters: json!({ "path": "my_folder" }),
            }],
        },
        ToolKind::DeleteFile => ToolDefinition {
            kind,
            description: "Delete a file or directory",
            parameters: vec![ToolParameter::required(
                "path",
                Str,
                "Path to file or directory to delete",
            )],
            examples: vec![ToolExample {
                description: "Delete a file",
                parameters: json!({ "path": "old_file.txt" }),
            }],
        },
        ToolKind::MoveFile => ToolDefinition {
            kind,
            description: "Move or rename a file or directory",
            parameters: vec![
                ToolParameter::required(
                    "source",
                    Str,
                    "Source path of the file or directory to move",
                ),
                ToolParameter::required(
                    "destination",
                    Str,
                    "Destination path where the file or directory should be moved",
                ),
            ],
            examples: vec![
                ToolExample {
                    description: "Move a file to a different directory",
                    parameters: json!({
                        "source": "old_location/file.txt",
                        "destination": "new_location/file.txt"
                    }),
                },
                ToolExample {
                    description: "Rename a file",
                    parameters: json!({ "source": "old_name.txt", "destination": "new_name.txt" }),
                },
            ],
        },
        ToolKind::SearchFiles => ToolDefinition {
            kind,
            description: "Search for files matching a pattern",
            parameters: vec![
                ToolParameter::required("pattern", Str, "Search pattern (e.g., *.md)"),
                ToolParameter::optional(
                    "directory",
                    Str,
                    "Directory to search in (default: current)",
                ),
            ],
            examples: vec![ToolExample {
                description: "Search for markdown files",
                parameters: json!({ "pattern": "*.md", "directory": "." }),
            }],
        },
        ToolKind::FetchUrl => ToolDefinition {
            kind,
            description: "Fetch content from a URL (supports GET, POST, etc.)",
            parameters: vec![
                ToolParameter::required("url", Str, "URL to fetch"),
                ToolParameter::optional(
                    "method",
                    Str,
                    "HTTP method (GET, POST, PUT, DELETE, etc.)",
                ),
                ToolParameter::optional("headers", Object, "HTTP headers"),
                ToolParameter::optional("body", Any, "Request body (for POST, PUT, etc.)"),
            ],
            examples: vec![
                ToolExample {
                    description: "Simple GET request",
                    parameters: json!({
                        "url": "https://api.github.com/repos/microsoft/vscode",
                        "method": "GET"
                    }),
                },
                ToolExample {
                    description: "POST request with body",
                    parameters: json!({
                        "url": "https://api.example.com/data",
                        "method": "POST",
                        "headers": { "Content-Type": "application/json" },
                        "body": { "key": "value" }
                    }),
                },
            ],
        },
    }
}

// ─── Dispatch ───────────────────────────────────────────────────────────────

/// Run one built-in tool. The returned value becomes `ToolResult::data`.
pub(crate) async fn execute(
    kind: ToolKind,
    params: &Map<String, Value>,
    ctx: &ToolContext<'_>,
) -> Result<Value, ToolError> {
    match kind {
        ToolKind::WriteFile => {
            let path = required_str(params, "path")?;
            let content = content_param(params)?;
            ctx.workspace.write(path, &content)?;
            Ok(json!({ "path": path, "bytes": content.len() }))
        }
        ToolKind::ReadFile => {
            let path = required_str(params, "path")?;
            let content = ctx.workspace.read(path)?;
            Ok(json!({ "path": path, "content": content }))
        }
        ToolKind::ListDirectory => {
            let path = optional_str(params, "path")?.unwrap_or(".");
            let entries = ctx.workspace.list(path)?;
            Ok(to_value(entries)?)
        }
        ToolKind::CreateDirectory => {
            let path = required_str(params, "path")?;
            ctx.workspace.mkdir(path)?;
            Ok(json!({ "path": path }))
        }
        ToolKind::DeleteFile => {
            let path = required_str(params, "path")?;
            ctx.workspace.delete(path)?;
            Ok(json!({ "path": path }))
        }
        ToolKind::MoveFile => {
            let source = required_str(params, "source")?;
            let destination = required_str(params, "destination")?;
            ctx.workspace.rename(source, destination)?;
            Ok(json!({ "source": source, "destination": destination }))
        }
        ToolKind::SearchFiles => {
            let pattern = required_str(params, "pattern")?;
            let dir = optional_str(params, "directory")?.unwrap_or(".");
            let entries = ctx.workspace.search(pattern, dir)?;
            Ok(to_value(entries)?)
        }
        ToolKind::FetchUrl => fetch_url(params, ctx.http).await,
    }
}

async fn fetch_url(params: &Map<String, Value>, http: &dyn HttpFetcher) -> Result<Value, ToolError> {
    let url = required_str(params, "url")?;
    let method = optional_str(params, "method")?.unwrap_or("GET");
    let headers = headers_param(params)?;
    let body = params.get("body").filter(|b| !b.is_null()).cloned();

    let response = http
        .fetch(HttpRequest {
            url: url.to_string(),
            method: method.to_string(),
            headers,
            body,
        })
        .await?;

    let empty = match &response.data {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if empty {
        return Err(ToolError::Backend(anyhow::anyhow!(
            "响应数据格式异常：数据为空或格式无效"
        )));
    }
    Ok(to_value(response)?)
}

// ─── Parameter helpers ──────────────────────────────────────────────────────

fn required_str<'a>(params: &'a Map<String, Value>, name: &str) -> Result<&'a str, ToolError> {
    optional_str(params, name)?.ok_or_else(|| ToolError::MissingParameter(name.to_string()))
}

fn optional_str<'a>(
    params: &'a Map<String, Value>,
    name: &str,
) -> Result<Option<&'a str>, ToolError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(ToolError::InvalidParameter {
            name: name.to_string(),
            reason: format!("expected a string, got {}", type_name(other)),
        }),
    }
}

/// `content` is normally a string; structured values (a model writing a JSON file as an
/// object) are pretty-printed.
fn content_param(params: &Map<String, Value>) -> Result<String, ToolError> {
    match params.get("content") {
        None | Some(Value::Null) => Err(ToolError::MissingParameter("content".into())),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => serde_json::to_string_pretty(other).map_err(|e| {
            ToolError::InvalidParameter {
                name: "content".into(),
                reason: e.to_string(),
            }
        }),
    }
}

fn headers_param(params: &Map<String, Value>) -> Result<BTreeMap<String, String>, ToolError> {
    match params.get("headers") {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::Object(map)) => Ok(map
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), v)
            })
            .collect()),
        Some(other) => Err(ToolError::InvalidParameter {
            name: "headers".into(),
            reason: format!("expected an object, got {}", type_name(other)),
        }),
    }
}

fn to_value<T: serde::Serialize>(v: T) -> Result<Value, ToolError> {
    serde_json::to_value(v).map_err(|e| ToolError::Backend(e.into()))
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
