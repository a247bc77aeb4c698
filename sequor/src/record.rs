//! Tool call records: what the model asked for and what came back.
//!
//! Both types are plain values. A [`ToolCallRequest`] is carried on an
//! assistant [`Message`](crate::message::Message); a [`ToolCallResult`] is
//! produced once per request by the executor and turned into a tool-role
//! message.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// A single tool invocation requested by the model.
///
/// # OpenAI API Alignment
///
/// Serializes to the inner shape of a chat-completions tool call:
/// ```json
/// { "id": "call_abc123", "name": "get_weather", "arguments": {"city": "Paris"} }
/// ```
/// `arguments` is kept as an untyped JSON value; the validator rejects
/// anything that is not an object before execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Identifier linking the request to its result. Unique within a turn.
    pub id: String,
    /// Name of the tool to invoke.
    pub name: String,
    /// Arguments for the tool.
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Create a new tool call request.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Create a request with a freshly generated identifier.
    #[must_use]
    pub fn generated(name: impl Into<String>, arguments: Value) -> Self {
        Self::new(generate_call_id(), name, arguments)
    }

    /// Parse arguments as a typed value.
    ///
    /// Accepts both an inline JSON object and a JSON-encoded string, since
    /// providers disagree on which one they send.
    pub fn parse_arguments<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        match &self.arguments {
            Value::String(s) => serde_json::from_str(s),
            other => serde_json::from_value(other.clone()),
        }
    }

    /// Get arguments as a JSON string.
    #[must_use]
    pub fn arguments_string(&self) -> String {
        match &self.arguments {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Generate a tool call identifier (`call_<uuid>`).
#[must_use]
pub fn generate_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Outcome of one tool call.
///
/// # OpenAI API Alignment
///
/// This maps to a tool message in the conversation:
/// ```json
/// {
///     "role": "tool",
///     "tool_call_id": "call_abc123",
///     "content": "{\"result\": ...}"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallResult {
    /// The originating request's id.
    pub tool_call_id: String,
    /// The tool name as requested.
    pub name: String,
    /// Stringified success payload, or a human-readable error description.
    pub content: String,
    /// Whether this result describes a failure.
    pub is_error: bool,
}

impl ToolCallResult {
    /// Create a successful result from a JSON payload.
    ///
    /// String payloads are used verbatim; anything else is serialized.
    #[must_use]
    pub fn success(call: &ToolCallRequest, value: &Value) -> Self {
        let content = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content,
            is_error: false,
        }
    }

    /// Create a failed result.
    #[must_use]
    pub fn failure(call: &ToolCallRequest, error: &ToolError) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: format!("Error: {error}"),
            is_error: true,
        }
    }

    /// Check if the call was successful.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !self.is_error
    }
}
