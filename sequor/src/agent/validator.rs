//! Tool call validation.
//!
//! Every call in an assistant turn gets a [`CallVerdict`] before anything
//! runs. Verdicts fall into two groups with different handling:
//!
//! - **Malformed** output ([`CallVerdict::Structural`], or tool-call markup
//!   left in the text that could not be parsed) means the model did not
//!   produce a usable turn at all. The invoker re-prompts for these.
//! - **Rejected** calls ([`CallVerdict::Unknown`], [`CallVerdict::Schema`])
//!   are well-formed requests the catalog cannot satisfy. They are routed
//!   like any other call and answered with an error result, so the model
//!   sees what went wrong and can adjust.

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

use serde_json::Value;

use crate::error::ToolError;
use crate::message::Message;
use crate::record::ToolCallRequest;
use crate::tool::ToolDefinition;

use super::repair;

/// Outcome of checking one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallVerdict {
    /// The call may be executed.
    Valid,
    /// Empty id or name, non-object arguments, or an id repeated in the turn.
    Structural(String),
    /// No tool with this name is registered.
    Unknown,
    /// The arguments violate the tool's input schema.
    Schema(String),
}

impl CallVerdict {
    /// Returns `true` for [`CallVerdict::Valid`].
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The error reported back to the model for a non-valid call.
    #[must_use]
    pub fn to_error(&self, call: &ToolCallRequest) -> Option<ToolError> {
        match self {
            Self::Valid => None,
            Self::Structural(reason) | Self::Schema(reason) => {
                Some(ToolError::invalid_args(reason.clone()))
            }
            Self::Unknown => Some(ToolError::not_found(call.name.clone())),
        }
    }
}

/// Verdicts for one assistant turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validation {
    verdicts: Vec<CallVerdict>,
    unparsed_markup: bool,
}

impl Validation {
    /// One verdict per tool call, in request order.
    #[must_use]
    pub fn verdicts(&self) -> &[CallVerdict] {
        &self.verdicts
    }

    /// Every call is valid and no stray markup remains.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.unparsed_markup && self.verdicts.iter().all(CallVerdict::is_valid)
    }

    /// The turn should be re-requested rather than routed.
    #[must_use]
    pub fn is_malformed(&self) -> bool {
        self.unparsed_markup
            || self
                .verdicts
                .iter()
                .any(|v| matches!(v, CallVerdict::Structural(_)))
    }

    /// Tool-call markup was found in the text but yielded no call.
    #[must_use]
    pub const fn has_unparsed_markup(&self) -> bool {
        self.unparsed_markup
    }

    /// Corrective instruction describing what was wrong with the turn.
    #[must_use]
    pub fn feedback(&self, message: &Message) -> String {
        let mut out = String::from("Your previous reply could not be used.\n");
        if self.unparsed_markup {
            out.push_str(
                "- It contained tool-call markup that is not valid JSON of the form \
                 {\"name\": ..., \"arguments\": {...}}.\n",
            );
        }
        for (call, verdict) in message.tool_calls.iter().zip(&self.verdicts) {
            let label = if call.name.is_empty() {
                "<unnamed>"
            } else {
                call.name.as_str()
            };
            let reason = match verdict {
                CallVerdict::Valid => continue,
                CallVerdict::Structural(r) | CallVerdict::Schema(r) => r.as_str(),
                CallVerdict::Unknown => "no tool with this name exists",
            };
            let _ = writeln!(out, "- Tool call `{label}`: {reason}.");
        }
        out.push_str(
            "Reply again. To call a tool, use the structured tool-calling interface with a \
             non-empty tool name and a JSON object of arguments. Otherwise answer in plain text.",
        );
        out
    }
}

/// Checks tool calls against a fixed catalog.
///
/// Built once per run; lookups are by name.
#[derive(Debug, Clone, Default)]
pub struct ToolCallValidator {
    catalog: HashMap<String, ToolDefinition>,
}

impl ToolCallValidator {
    /// Create a validator for the given catalog.
    #[must_use]
    pub fn new(definitions: Vec<ToolDefinition>) -> Self {
        Self {
            catalog: definitions
                .into_iter()
                .map(|d| (d.name.clone(), d))
                .collect(),
        }
    }

    /// Validate every tool call in `message`.
    #[must_use]
    pub fn validate(&self, message: &Message) -> Validation {
        let mut seen = HashSet::new();
        let verdicts = message
            .tool_calls
            .iter()
            .map(|call| {
                // Second and later occurrences of an id, whatever else is wrong with them.
                if !call.id.trim().is_empty() && !seen.insert(call.id.as_str()) {
                    return CallVerdict::Structural(format!("duplicate tool call id '{}'", call.id));
                }
                self.check(call)
            })
            .collect();

        Validation {
            verdicts,
            unparsed_markup: !message.has_tool_calls() && repair::contains_markup(&message.content),
        }
    }

    /// Validate a single call.
    #[must_use]
    pub fn check(&self, call: &ToolCallRequest) -> CallVerdict {
        if call.id.trim().is_empty() {
            return CallVerdict::Structural("missing tool call id".to_owned());
        }
        if call.name.trim().is_empty() {
            return CallVerdict::Structural("missing tool name".to_owned());
        }
        let Some(args) = call.arguments.as_object() else {
            return CallVerdict::Structural(format!(
                "arguments must be a JSON object, got {}",
                json_type(&call.arguments)
            ));
        };
        let Some(definition) = self.catalog.get(&call.name) else {
            return CallVerdict::Unknown;
        };
        match check_schema(definition, args) {
            Ok(()) => CallVerdict::Valid,
            Err(reason) => CallVerdict::Schema(reason),
        }
    }
}

/// Top-level object schema check: `required`, property `type` and `enum`,
/// and `additionalProperties: false`.
fn check_schema(
    definition: &ToolDefinition,
    args: &serde_json::Map<String, Value>,
) -> Result<(), String> {
    let missing: Vec<&str> = definition
        .required_keys()
        .filter(|key| !args.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing required argument(s): {}", missing.join(", ")));
    }

    let schema = &definition.parameters;

    let properties = schema.get("properties").and_then(Value::as_object);

    for (key, value) in args {
        let Some(prop) = properties.and_then(|p| p.get(key)) else {
            if schema.get("additionalProperties") == Some(&Value::Bool(false)) {
                return Err(format!("unexpected argument '{key}'"));
            }
            continue;
        };

        if let Some(expected) = prop.get("type")
            && !type_matches(expected, value)
        {
            return Err(format!(
                "argument '{key}' should be {}, got {}",
                describe_type(expected),
                json_type(value)
            ));
        }

        if let Some(allowed) = prop.get("enum").and_then(Value::as_array)
            && !allowed.contains(value)
        {
            return Err(format!("argument '{key}' must be one of {}", Value::Array(allowed.clone())));
        }
    }

    Ok(())
}

fn type_matches(expected: &Value, value: &Value) -> bool {
    match expected {
        Value::String(t) => primitive_matches(t, value),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .any(|t| primitive_matches(t, value)),
        _ => true,
    }
}

fn primitive_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64() || is_integral_float(value),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        // Unknown type keywords are not enforced.
        _ => true,
    }
}

fn is_integral_float(value: &Value) -> bool {
    value.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

fn describe_type(expected: &Value) -> String {
    match expected {
        Value::String(t) => t.clone(),
        Value::Array(types) => types
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" or "),
        other => other.to_string(),
    }
}

const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
