//! Recovery of tool calls written as text.
//!
//! Some models ignore the structured tool-call field and instead write the
//! call into their reply:
//!
//! ```text
//! Let me check.
//! <tool_call>
//! {"name": "search", "arguments": {"query": "refund policy"}}
//! </tool_call>
//! ```
//!
//! Recognised wrappers are `<tool_call>`, `<toolcall>` and `<tool-call>` tags
//! and fenced blocks tagged `tool_call` (or `tool-call`, `toolcall`). Tags
//! match case-insensitively and may carry inner whitespace. A body
//! holds one JSON object, several objects, an array of them, or an object
//! with a `tool_calls` array. Each object is `{"name", "arguments"}`
//! (`parameters` is accepted for `arguments`, and an OpenAI-style
//! `{"function": {...}}` wrapper is unwrapped).
//!
//! Everything here is a pure function of its input.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::message::Message;
use crate::record::ToolCallRequest;

static CALL_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<\s*tool[_-]?call\s*>(?P<tag>.*?)<\s*/\s*tool[_-]?call\s*>|```\s*tool[_-]?call[ \t]*\r?\n?(?P<fence>.*?)```",
    )
    .expect("valid regex")
});

static MARKUP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<\s*/?\s*tool[_-]?call\s*>|```\s*tool[_-]?call").expect("valid regex")
});

/// Check whether `text` contains any tool-call markup, parsed or not.
#[must_use]
pub fn contains_markup(text: &str) -> bool {
    MARKUP_RE.is_match(text)
}

/// Extract tool calls embedded in `text`.
///
/// Returns the visible text with every successfully parsed block removed,
/// and the recovered calls in order of appearance, each with a freshly
/// generated id. Blocks whose body yields no call are left in the text.
/// When nothing is recovered the text is returned unchanged.
#[must_use]
pub fn extract_tool_calls(text: &str) -> (String, Vec<ToolCallRequest>) {
    let mut calls = Vec::new();
    let mut parts: Vec<&str> = Vec::new();
    let mut last_end = 0;

    for caps in CALL_BLOCK_RE.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        let body = caps
            .name("tag")
            .or_else(|| caps.name("fence"))
            .map_or("", |m| m.as_str());

        let parsed: Vec<ToolCallRequest> = json_values(body)
            .iter()
            .flat_map(calls_in_value)
            .collect();

        if parsed.is_empty() {
            continue;
        }

        parts.push(&text[last_end..whole.start()]);
        last_end = whole.end();
        calls.extend(parsed);
    }

    if calls.is_empty() {
        return (text.to_owned(), calls);
    }

    parts.push(&text[last_end..]);
    let visible = parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    (visible, calls)
}

/// Recover tool calls from a message's text.
///
/// Returns `None` when the message already carries structured calls or when
/// nothing could be recovered; the original message is then used as is.
#[must_use]
pub fn repair_message(message: &Message) -> Option<Message> {
    if message.has_tool_calls() || !contains_markup(&message.content) {
        return None;
    }
    let (content, calls) = extract_tool_calls(&message.content);
    (!calls.is_empty()).then(|| Message::assistant_with_tool_calls(content, calls))
}

/// Every JSON value found in `input`, scanning past non-JSON text.
fn json_values(input: &str) -> Vec<Value> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return vec![value];
    }

    let mut values = Vec::new();
    let mut offset = 0;
    while let Some(rel) = trimmed[offset..].find(['{', '[']) {
        let start = offset + rel;
        let mut stream = serde_json::Deserializer::from_str(&trimmed[start..]).into_iter::<Value>();
        match stream.next() {
            Some(Ok(value)) => {
                values.push(value);
                offset = start + stream.byte_offset();
            }
            _ => offset = start + 1,
        }
    }
    values
}

fn calls_in_value(value: &Value) -> Vec<ToolCallRequest> {
    if let Some(list) = value.get("tool_calls").and_then(Value::as_array) {
        return list.iter().filter_map(call_from_object).collect();
    }
    if let Some(list) = value.as_array() {
        return list.iter().filter_map(call_from_object).collect();
    }
    call_from_object(value).into_iter().collect()
}

fn call_from_object(value: &Value) -> Option<ToolCallRequest> {
    let value = value
        .get("function")
        .filter(|f| f.is_object())
        .unwrap_or(value);

    let name = value.get("name")?.as_str()?.trim();
    if name.is_empty() {
        return None;
    }

    let arguments = match value.get("arguments").or_else(|| value.get("parameters")) {
        None | Some(Value::Null) => Value::Object(Map::new()),
        // An undecodable string stays a string so validation rejects it.
        Some(Value::String(raw)) => {
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()))
        }
        Some(other) => other.clone(),
    };

    Some(ToolCallRequest::generated(name, arguments))
}
