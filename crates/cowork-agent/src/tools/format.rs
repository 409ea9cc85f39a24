//! Human-readable rendering of tool results, shown to the user and fed back to the model.

use serde_json::{Map, Value};

use super::ToolKind;
use crate::types::{truncate_chars, ToolCall, ToolResult};

const MAX_LISTED: usize = 10;
const READ_PREVIEW_CHARS: usize = 200;
const FETCH_PREVIEW_CHARS: usize = 2000;

/// Render a result with the tool's own formatter, falling back to pretty JSON for
/// tools outside the built-in set.
pub fn format_result(tool: &str, result: &ToolResult) -> String {
    match ToolKind::from_name(tool) {
        Some(kind) => kind.format_result(result),
        None if !result.success => format!("❌ 执行失败: {}", error_text(result)),
        None => result
            .data
            .as_ref()
            .and_then(|d| serde_json::to_string_pretty(d).ok())
            .unwrap_or_default(),
    }
}

/// One-line description of a call, e.g. `写入文件: notes.md`.
pub fn generate_summary(call: &ToolCall) -> String {
    match ToolKind::from_name(&call.tool) {
        Some(kind) => kind.summary(&call.parameters),
        None => call.tool.clone(),
    }
}

/// `512B`, `1.5KB`, `2.0MB`, `1.2GB`.
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{}B", bytes)
    } else if b < KB * KB {
        format!("{:.1}KB", b / KB)
    } else if b < KB * KB * KB {
        format!("{:.1}MB", b / (KB * KB))
    } else {
        format!("{:.1}GB", b / (KB * KB * KB))
    }
}

impl ToolKind {
    pub fn format_result(self, result: &ToolResult) -> String {
        if !result.success {
            let verb = match self {
                ToolKind::WriteFile => "写入失败",
                ToolKind::ReadFile => "读取失败",
                ToolKind::ListDirectory => "列出目录失败",
                ToolKind::CreateDirectory => "创建失败",
                ToolKind::DeleteFile => "删除失败",
                ToolKind::MoveFile => "移动失败",
                ToolKind::SearchFiles => "搜索失败",
                ToolKind::FetchUrl => "请求失败",
            };
            return format!("❌ {}: {}", verb, error_text(result));
        }

        let data = result.data.as_ref().unwrap_or(&Value::Null);
        match self {
            ToolKind::WriteFile => format!(
                "✅ 文件已保存\n📄 路径: `{}`",
                field(data, "path").unwrap_or("unknown")
            ),
            ToolKind::ReadFile => {
                let content = field(data, "content").unwrap_or("");
                let (head, cut) = truncate_chars(content, READ_PREVIEW_CHARS);
                format!(
                    "✅ 文件读取成功\n📄 路径: `{}`\n📝 内容:\n```\n{}{}\n```",
                    field(data, "path").unwrap_or(""),
                    head,
                    if cut { "..." } else { "" }
                )
            }
            ToolKind::ListDirectory => {
                let entries = entries(data);
                if entries.is_empty() {
                    return "📂 目录为空".to_string();
                }
                let lines: Vec<String> = entries
                    .iter()
                    .take(MAX_LISTED)
                    .map(|e| {
                        let icon = if field(e, "type") == Some("directory") {
                            "📁"
                        } else {
                            "📄"
                        };
                        let size = match e.get("size").and_then(Value::as_u64) {
                            Some(n) if n > 0 => format!(" ({})", format_size(n)),
                            _ => String::new(),
                        };
                        format!("{} {}{}", icon, field(e, "name").unwrap_or(""), size)
                    })
                    .collect();
                format!(
                    "📂 找到 {} 个项目:\n{}{}",
                    entries.len(),
                    lines.join("\n"),
                    more(entries.len(), "个项目")
                )
            }
            ToolKind::CreateDirectory => format!(
                "✅ 目录已创建\n📁 路径: `{}`",
                field(data, "path").unwrap_or("")
            ),
            ToolKind::DeleteFile => {
                format!("✅ 已删除\n🗑️ 路径: `{}`", field(data, "path").unwrap_or(""))
            }
            ToolKind::MoveFile => format!(
                "✅ 文件已移动\n📁 从: `{}`\n📁 到: `{}`",
                field(data, "source").unwrap_or("未知源路径"),
                field(data, "destination").unwrap_or("未知目标路径")
            ),
            ToolKind::SearchFiles => {
                let entries = entries(data);
                if entries.is_empty() {
                    return "🔍 未找到匹配的文件".to_string();
                }
                let lines: Vec<String> = entries
                    .iter()
                    .take(MAX_LISTED)
                    .map(|e| format!("📄 {}", field(e, "name").unwrap_or("")))
                    .collect();
                format!(
                    "🔍 找到 {} 个文件:\n{}{}",
                    entries.len(),
                    lines.join("\n"),
                    more(entries.len(), "个文件")
                )
            }
            ToolKind::FetchUrl => format_fetch(data),
        }
    }

    pub fn summary(self, params: &Map<String, Value>) -> String {
        let p = |name: &str| params.get(name).and_then(Value::as_str).unwrap_or("");
        match self {
            ToolKind::WriteFile => format!("写入文件: {}", p("path")),
            ToolKind::ReadFile => format!("读取文件: {}", p("path")),
            ToolKind::ListDirectory => {
                let path = p("path");
                format!("列出目录: {}", if path.is_empty() { "." } else { path })
            }
            ToolKind::CreateDirectory => format!("创建目录: {}", p("path")),
            ToolKind::DeleteFile => format!("删除: {}", p("path")),
            ToolKind::MoveFile => format!("移动文件: {} → {}", p("source"), p("destination")),
            ToolKind::SearchFiles => format!("搜索: {}", p("pattern")),
            ToolKind::FetchUrl => format!("请求: {}", p("url")),
        }
    }
}

fn format_fetch(response: &Value) -> String {
    let Some(body) = response.get("data") else {
        return "⚠️ 响应数据格式异常".to_string();
    };
    let status = response.get("status").and_then(Value::as_u64);
    let emoji = match status {
        Some(s) if (200..300).contains(&s) => "✅",
        _ => "⚠️",
    };
    let status = status.map_or_else(|| "N/A".to_string(), |s| s.to_string());
    let duration = response.get("duration").and_then(Value::as_u64).unwrap_or(0);
    let content_type = field(response, "contentType")
        .filter(|s| !s.is_empty())
        .unwrap_or("unknown");

    let text = match body {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    };
    let (head, cut) = truncate_chars(&text, FETCH_PREVIEW_CHARS);

    format!(
        "{emoji} **请求成功** (HTTP {status})\n\n⏱️ 耗时: {duration}ms\n📦 类型: {content_type}\n\n📄 **响应数据**:\n```json\n{head}{}\n```",
        if cut { "\n...(数据过长，已截断)" } else { "" }
    )
}

fn error_text(result: &ToolResult) -> &str {
    result.error.as_deref().unwrap_or("")
}

fn field<'a>(v: &'a Value, name: &str) -> Option<&'a str> {
    v.get(name).and_then(Value::as_str)
}

fn entries(data: &Value) -> &[Value] {
    data.as_array().map(Vec::as_slice).unwrap_or(&[])
}

fn more(total: usize, unit: &str) -> String {
    if total > MAX_LISTED {
        format!("\n... 还有 {} {}", total - MAX_LISTED, unit)
    } else {
        String::new()
    }
}
