//! JSON repair passes for near-valid model output.
//!
//! Each strategy is a total, pure function `&str -> Result<Value>`. They are tried in
//! [`REPAIR_STRATEGIES`] order, cheapest and safest first.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

pub type RepairStrategy = fn(&str) -> serde_json::Result<Value>;

/// Ordered repair chain. The first strategy is a plain parse, so valid JSON is never touched.
pub const REPAIR_STRATEGIES: [(&str, RepairStrategy); 5] = [
    ("parse", parse_as_is),
    ("repair", parse_repaired),
    ("repair+commas", parse_repaired_extra_commas),
    ("content-field", parse_content_field),
    ("repair+content-field", parse_repaired_content_field),
];

// ─── Strategies ─────────────────────────────────────────────────────────────

pub fn parse_as_is(s: &str) -> serde_json::Result<Value> {
    serde_json::from_str(s)
}

pub fn parse_repaired(s: &str) -> serde_json::Result<Value> {
    serde_json::from_str(&repair_json(s))
}

pub fn parse_repaired_extra_commas(s: &str) -> serde_json::Result<Value> {
    let repaired = repair_json(s);
    let cleaned = trailing_brace_comma_re().replace_all(&repaired, "}");
    let cleaned = trailing_bracket_comma_re().replace_all(&cleaned, "]");
    serde_json::from_str(&cleaned)
}

pub fn parse_content_field(s: &str) -> serde_json::Result<Value> {
    serde_json::from_str(&fix_content_field(s))
}

pub fn parse_repaired_content_field(s: &str) -> serde_json::Result<Value> {
    serde_json::from_str(&fix_content_field(&repair_json(s)))
}

// ─── Passes ─────────────────────────────────────────────────────────────────

fn trailing_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("trailing comma regex"))
}

fn trailing_brace_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*\}").expect("brace comma regex"))
}

fn trailing_bracket_comma_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",\s*\]").expect("bracket comma regex"))
}

/// Trim, strip comments, escape raw control characters inside strings, drop trailing commas.
pub fn repair_json(s: &str) -> String {
    let stripped = strip_comments(s.trim());
    let escaped = fix_unescaped_chars(&stripped);
    trailing_comma_re().replace_all(&escaped, "$1").into_owned()
}

/// Remove `/* ... */` and `// ...` comments that appear outside string literals.
///
/// Comment markers inside strings (URLs such as `https://`) are kept.
pub fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    let mut in_string = false;
    let mut prev: Option<char> = None;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            if c == '"' && prev != Some('\\') {
                in_string = false;
            }
            prev = if c == '\\' && prev == Some('\\') { None } else { Some(c) };
            continue;
        }
        let next = chars.peek().copied();
        match (c, next) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut last = '\0';
                let mut closed = false;
                for next in chars.by_ref() {
                    if last == '*' && next == '/' {
                        closed = true;
                        break;
                    }
                    last = next;
                }
                if !closed {
                    break;
                }
            }
            _ => out.push(c),
        }
        prev = Some(c);
    }
    out
}

/// Escape literal `\n`, `\r`, `\t` found inside string literals.
///
/// A quote preceded by an unescaped backslash does not toggle string state; a doubled
/// backslash resets the escape tracking.
pub fn fix_unescaped_chars(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    let mut in_string = false;
    let mut prev: Option<char> = None;

    for c in s.chars() {
        if c == '"' && prev != Some('\\') {
            in_string = !in_string;
            out.push(c);
        } else if in_string {
            match c {
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                _ => out.push(c),
            }
        } else {
            out.push(c);
        }
        prev = if c == '\\' && prev == Some('\\') { None } else { Some(c) };
    }
    out
}

/// Re-escape the value of the first `"content"` key.
///
/// The value is taken to run from its opening quote up to the last quote before the first
/// structural character (`}`, `]`, `,`) that has a quote behind it; everything in between is
/// escaped as string content. Input without a `"content"` key is returned unchanged.
pub fn fix_content_field(s: &str) -> String {
    let Some(key_pos) = s.find("\"content\"") else {
        return s.to_string();
    };
    let Some(colon) = s[key_pos..].find(':').map(|i| key_pos + i) else {
        return s.to_string();
    };
    let Some(value_start) = s[colon + 1..].find('"').map(|i| colon + 1 + i) else {
        return s.to_string();
    };

    let bytes = s.as_bytes();
    let mut value_end = value_start + 1;
    while value_end < bytes.len() {
        let b = bytes[value_end];
        if b == b'\n' || b == b'\r' {
            value_end += 1;
            continue;
        }
        if matches!(b, b'}' | b']' | b',') {
            let mut last_quote = value_end - 1;
            while last_quote > value_start && bytes[last_quote] != b'"' {
                last_quote -= 1;
            }
            if last_quote > value_start {
                value_end = last_quote;
                break;
            }
        }
        value_end += 1;
    }

    let content = &s[value_start + 1..value_end.min(s.len())];
    let escaped = content
        .replace('\\', "\\\\")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('"', "\\\"");
    let rest = s.get(value_end + 1..).unwrap_or("");
    format!("{}{}\"{}", &s[..=value_start], escaped, rest)
}
