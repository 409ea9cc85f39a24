//! Tests for the structured-call parser and its repair strategies.

use super::*;
use serde_json::json;

fn block(tool: &str, body: &str) -> String {
    format!("```tool:{}\n{}\n```", tool, body)
}

// ─── Individual strategies ──────────────────────────────────────────────────

#[test]
fn test_fix_unescaped_chars_only_inside_strings() {
    assert_eq!(fix_unescaped_chars("{\n\"a\": \"x\ty\"\n}"), "{\n\"a\": \"x\\ty\"\n}");
    // An escaped quote does not end the string.
    assert_eq!(fix_unescaped_chars("\"a\\\"b\nc\""), "\"a\\\"b\\nc\"");
    // A doubled backslash does escape the following quote.
    assert_eq!(fix_unescaped_chars("\"a\\\\\"\n"), "\"a\\\\\"\n");
}

#[test]
fn test_strip_comments_keeps_urls_in_strings() {
    let input = "{\"u\": \"http://x\" // note\n/* block */}";
    assert_eq!(strip_comments(input), "{\"u\": \"http://x\" \n}");
}

#[test]
fn test_repair_json_removes_trailing_commas() {
    assert_eq!(repair_json("  {\"a\": [1, 2,], }  "), "{\"a\": [1, 2] }");
}

#[test]
fn test_fix_content_field_escapes_value() {
    let fixed = fix_content_field("{\"path\": \"a.html\", \"content\": \"<b class=\"x\">\nhi</b>\"}");
    let value: serde_json::Value = serde_json::from_str(&fixed).unwrap();
    assert_eq!(value["content"], "<b class=\"x\">\nhi</b>");
    assert_eq!(value["path"], "a.html");
}

#[test]
fn test_fix_content_field_without_content_key_is_identity() {
    assert_eq!(fix_content_field("{\"path\": 1}"), "{\"path\": 1}");
}

// ─── Chain ──────────────────────────────────────────────────────────────────

#[test]
fn test_valid_json_uses_first_strategy_unchanged() {
    let body = r##"{"path": "notes.md", "content": "# Title\n\nBody with // slashes"}"##;
    let repaired = try_parse_json(body).unwrap();
    assert_eq!(repaired.strategy, 0);
    assert_eq!(repaired.value, serde_json::from_str::<serde_json::Value>(body).unwrap());
}

#[test]
fn test_raw_newline_repaired_by_second_strategy() {
    let repaired = try_parse_json("{\"path\": \"a.txt\", \"content\": \"line1\nline2\"}").unwrap();
    assert_eq!(repaired.strategy, 1);
    assert_eq!(repaired.value["content"], "line1\nline2");
}

#[test]
fn test_comments_and_trailing_comma() {
    let body = "{\n  // target\n  \"url\": \"https://example.com/a\", /* method */\n  \"method\": \"GET\",\n}";
    let repaired = try_parse_json(body).unwrap();
    assert_eq!(repaired.strategy, 1);
    assert_eq!(
        repaired.value,
        json!({"url": "https://example.com/a", "method": "GET"})
    );
}

#[test]
fn test_unescaped_quotes_in_content_use_content_strategy() {
    let body = r#"{"path": "a.html", "content": "<div class="x">hi</div>"}"#;
    let repaired = try_parse_json(body).unwrap();
    assert_eq!(repaired.strategy, 3);
    assert_eq!(repaired.value["content"], "<div class=\"x\">hi</div>");
}

#[test]
fn test_combined_strategy() {
    let body = "{\"path\": \"a.html\", \"content\": \"<p class=\"x\">\n</p>\",}";
    let repaired = try_parse_json(body).unwrap();
    assert_eq!(repaired.strategy, 4);
    assert!(repaired.value["content"]
        .as_str()
        .unwrap()
        .starts_with("<p class=\"x\">"));
}

#[test]
fn test_unrepairable_body_errors() {
    assert!(try_parse_json("definitely not json").is_err());
}

// ─── Extraction ─────────────────────────────────────────────────────────────

#[test]
fn test_parse_tool_calls_preserves_order_and_isolates_failures() {
    let text = format!(
        "First I write.\n{}\nThen something broken.\n{}\nThen read.\n{}",
        block("write_file", "{\"path\": \"a.txt\", \"content\": \"one\ntwo\"}"),
        block("delete_file", "{path: oops"),
        block("read_file", r#"{"path": "a.txt"}"#),
    );
    let calls = parse_tool_calls(&text);
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].tool, "write_file");
    assert_eq!(calls[0].str_param("content"), Some("one\ntwo"));
    assert_eq!(calls[1].tool, "read_file");
    assert_eq!(calls[1].str_param("path"), Some("a.txt"));
}

#[test]
fn test_parameters_keep_source_order() {
    let calls = parse_tool_calls(&block("move_file", r#"{"source": "a", "destination": "b"}"#));
    let keys: Vec<_> = calls[0].parameters.keys().cloned().collect();
    assert_eq!(keys, vec!["source", "destination"]);
}

#[test]
fn test_non_object_and_untagged_blocks_are_ignored() {
    let text = format!(
        "{}\n```json\n{{\"path\": \"x\"}}\n```",
        block("read_file", "[\"a.txt\"]")
    );
    assert!(parse_tool_calls(&text).is_empty());
}

#[test]
fn test_no_blocks() {
    assert!(parse_tool_calls("Just a friendly answer.").is_empty());
}
