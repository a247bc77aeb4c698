//! Tool trait and the tool set handed to a run.
//!
//! Tools are the only way a run touches the outside world. Each tool has a
//! [`ToolDefinition`] that is advertised to the model and used by the
//! validator to check arguments before the tool is invoked.
//!
//! # OpenAI API Alignment
//!
//! `ToolDefinition` serializes to `{"type": "function", "function": {...}}`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// A type alias for `Result<T, ToolError>`.
pub type ToolResult<T> = Result<T, ToolError>;

/// Definition of a tool for LLM function calling.
///
/// # OpenAI API Alignment
///
/// This type serializes to OpenAI's function calling format:
/// ```json
/// {
///     "type": "function",
///     "function": {
///         "name": "tool_name",
///         "description": "Tool description",
///         "parameters": { ... }
///     }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[non_exhaustive]
pub struct ToolDefinition {
    /// Name of the tool (e.g., "get_weather").
    pub name: String,

    /// Description of what the tool does.
    pub description: String,

    /// JSON schema for the tool's parameters.
    #[serde(alias = "input_schema")]
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Returns the tool name.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the tool description.
    #[inline]
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Names listed under the schema's `required` array.
    pub fn required_keys(&self) -> impl Iterator<Item = &str> {
        self.parameters
            .get("required")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }
}

/// Custom serialization to OpenAI function calling format.
impl Serialize for ToolDefinition {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut function = serde_json::Map::new();
        function.insert("name".to_owned(), Value::String(self.name.clone()));
        function.insert(
            "description".to_owned(),
            Value::String(self.description.clone()),
        );
        function.insert("parameters".to_owned(), self.parameters.clone());

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("type", "function")?;
        map.serialize_entry("function", &function)?;
        map.end()
    }
}

/// The core trait for typed tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Static name of the tool.
    const NAME: &'static str;

    /// Arguments type for the tool.
    type Args: for<'de> Deserialize<'de> + Send;

    /// Output type of the tool.
    type Output: Serialize + Send;

    /// Error type for tool execution.
    type Error: Into<ToolError> + Send;

    /// Get the name of the tool.
    fn name(&self) -> &'static str {
        Self::NAME
    }

    /// Get the description of the tool.
    fn description(&self) -> String;

    /// Get the JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute the tool with the given arguments.
    async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error>;

    /// Get the tool definition for LLM function calling.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters_schema())
    }

    /// Call the tool with JSON arguments and return JSON output.
    async fn call_json(&self, args: Value) -> Result<Value, ToolError>
    where
        Self::Output: 'static,
    {
        let typed_args: Self::Args = match &args {
            Value::String(s) => {
                serde_json::from_str(s).map_err(|e| ToolError::InvalidArguments(e.to_string()))?
            }
            _ => serde_json::from_value(args)
                .map_err(|e| ToolError::InvalidArguments(e.to_string()))?,
        };

        let result = self.call(typed_args).await.map_err(Into::into)?;
        serde_json::to_value(result).map_err(|e| ToolError::Execution(e.to_string()))
    }
}

/// A shared dynamic tool.
pub type SharedTool = Arc<dyn DynTool>;

/// Object-safe version of the Tool trait for dynamic dispatch.
#[async_trait]
pub trait DynTool: Send + Sync {
    /// Get the name of the tool.
    fn name(&self) -> &str;

    /// Get the tool definition.
    fn definition(&self) -> ToolDefinition;

    /// Call the tool with JSON arguments.
    async fn call_json(&self, args: Value) -> Result<Value, ToolError>;
}

#[async_trait]
impl<T: Tool + 'static> DynTool for T
where
    T::Output: 'static,
{
    fn name(&self) -> &str {
        Tool::name(self)
    }

    fn definition(&self) -> ToolDefinition {
        Tool::definition(self)
    }

    async fn call_json(&self, args: Value) -> Result<Value, ToolError> {
        Tool::call_json(self, args).await
    }
}

/// The tools registered for a run.
///
/// Registration order is preserved, so the catalog advertised to the model
/// is deterministic. Registering a second tool under an existing name
/// replaces the first in place.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<SharedTool>,
    index: HashMap<String, usize>,
}

impl ToolSet {
    /// Create a new empty tool set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a typed tool.
    pub fn add<T: Tool + 'static>(&mut self, tool: T)
    where
        T::Output: 'static,
    {
        self.add_shared(Arc::new(tool));
    }

    /// Add a typed tool, builder style.
    #[must_use]
    pub fn with<T: Tool + 'static>(mut self, tool: T) -> Self
    where
        T::Output: 'static,
    {
        self.add(tool);
        self
    }

    /// Add a shared dynamic tool.
    pub fn add_shared(&mut self, tool: SharedTool) {
        let name = tool.name().to_owned();
        if let Some(&slot) = self.index.get(&name) {
            self.tools[slot] = tool;
        } else {
            self.index.insert(name, self.tools.len());
            self.tools.push(tool);
        }
    }

    /// Get a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SharedTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Check if the set contains a tool with the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// All tool definitions, in registration order.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(|t| t.definition()).collect()
    }

    /// The names of all tools, in registration order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Iterate over the registered tools.
    pub fn iter(&self) -> impl Iterator<Item = &SharedTool> {
        self.tools.iter()
    }

    /// Get the number of tools.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Copy, Default)]
    struct EchoTool;

    #[derive(Debug, Deserialize)]
    struct EchoArgs {
        message: String,
    }

    #[async_trait]
    impl Tool for EchoTool {
        const NAME: &'static str = "echo";
        type Args = EchoArgs;
        type Output = String;
        type Error = ToolError;

        fn description(&self) -> String {
            "Echoes back the input message.".to_owned()
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            })
        }

        async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
            Ok(args.message)
        }
    }

    #[derive(Debug, Clone, Copy, Default)]
    struct LoudEchoTool;

    #[async_trait]
    impl Tool for LoudEchoTool {
        const NAME: &'static str = "echo";
        type Args = EchoArgs;
        type Output = String;
        type Error = ToolError;

        fn description(&self) -> String {
            "Echoes back the input message, loudly.".to_owned()
        }

        fn parameters_schema(&self) -> Value {
            EchoTool.parameters_schema()
        }

        async fn call(&self, args: Self::Args) -> Result<Self::Output, Self::Error> {
            Ok(args.message.to_uppercase())
        }
    }

    mod tool_definition {
        use super::*;

        #[test]
        fn serialize_to_openai_format() {
            let def = Tool::definition(&EchoTool);
            let json = serde_json::to_value(&def).unwrap();
            assert_eq!(json["type"], "function");
            assert_eq!(json["function"]["name"], "echo");
            assert_eq!(json["function"]["parameters"]["required"][0], "message");
        }

        #[test]
        fn deserialize_accepts_input_schema_alias() {
            let def: ToolDefinition = serde_json::from_str(
                r#"{"name":"t","description":"d","input_schema":{"type":"object"}}"#,
            )
            .unwrap();
            assert_eq!(def.parameters, json!({"type": "object"}));
        }

        #[test]
        fn required_keys_lists_schema_requirements() {
            let def = Tool::definition(&EchoTool);
            assert_eq!(def.required_keys().collect::<Vec<_>>(), vec!["message"]);
        }

        #[test]
        fn required_keys_empty_without_required() {
            let def = ToolDefinition::new("t", "d", json!({"type": "object"}));
            assert_eq!(def.required_keys().count(), 0);
        }
    }

    mod typed_tool {
        use super::*;

        #[tokio::test]
        async fn call_json_with_object() {
            let out = Tool::call_json(&EchoTool, json!({"message": "hi"}))
                .await
                .unwrap();
            assert_eq!(out, json!("hi"));
        }

        #[tokio::test]
        async fn call_json_with_encoded_string() {
            let out = Tool::call_json(&EchoTool, json!(r#"{"message":"hi"}"#))
                .await
                .unwrap();
            assert_eq!(out, json!("hi"));
        }

        #[tokio::test]
        async fn call_json_rejects_bad_arguments() {
            let err = Tool::call_json(&EchoTool, json!({"msg": 1}))
                .await
                .unwrap_err();
            assert!(matches!(err, ToolError::InvalidArguments(_)));
        }
    }

    mod tool_set {
        use super::*;

        #[test]
        fn preserves_registration_order() {
            #[derive(Debug, Clone, Copy)]
            struct Other;

            #[async_trait]
            impl Tool for Other {
                const NAME: &'static str = "other";
                type Args = Value;
                type Output = Value;
                type Error = ToolError;

                fn description(&self) -> String {
                    String::new()
                }

                fn parameters_schema(&self) -> Value {
                    json!({"type": "object"})
                }

                async fn call(&self, args: Value) -> Result<Value, ToolError> {
                    Ok(args)
                }
            }

            let set = ToolSet::new().with(Other).with(EchoTool);
            assert_eq!(set.names(), vec!["other", "echo"]);
            assert_eq!(set.definitions()[1].name, "echo");
        }

        #[tokio::test]
        async fn same_name_replaces_in_place() {
            let set = ToolSet::new().with(EchoTool).with(LoudEchoTool);
            assert_eq!(set.len(), 1);
            let out = set
                .get("echo")
                .unwrap()
                .call_json(json!({"message": "hi"}))
                .await
                .unwrap();
            assert_eq!(out, json!("HI"));
        }

        #[test]
        fn lookup_missing_tool() {
            let set = ToolSet::new().with(EchoTool);
            assert!(set.contains("echo"));
            assert!(set.get("nonexistent").is_none());
            assert!(!set.is_empty());
        }
    }
}
