//! Shared tools and setup for integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)]

use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use sequor::prelude::*;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Evaluates `<number> <op> <number>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Calculator;

#[derive(Debug, Deserialize)]
pub struct CalculatorArgs {
    expression: String,
}

#[async_trait]
impl Tool for Calculator {
    const NAME: &'static str = "calculator";
    type Args = CalculatorArgs;
    type Output = f64;
    type Error = ToolError;

    fn description(&self) -> String {
        "Evaluate a binary arithmetic expression such as '2+2'.".to_owned()
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"expression": {"type": "string"}},
            "required": ["expression"]
        })
    }

    async fn call(&self, args: CalculatorArgs) -> ToolResult<f64> {
        let expr = args.expression.replace(' ', "");
        let (pos, op) = expr
            .char_indices()
            .skip(1)
            .find(|(_, c)| matches!(c, '+' | '-' | '*' | '/'))
            .ok_or_else(|| ToolError::invalid_args(format!("no operator in '{expr}'")))?;
        let parse = |s: &str| {
            s.parse::<f64>()
                .map_err(|e| ToolError::invalid_args(format!("bad operand '{s}': {e}")))
        };
        let (lhs, rhs) = (parse(&expr[..pos])?, parse(&expr[pos + 1..])?);
        match op {
            '+' => Ok(lhs + rhs),
            '-' => Ok(lhs - rhs),
            '*' => Ok(lhs * rhs),
            _ if rhs == 0.0 => Err(ToolError::execution("division by zero")),
            _ => Ok(lhs / rhs),
        }
    }
}

/// Returns canned document hits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Search;

#[derive(Debug, Deserialize)]
pub struct SearchArgs {
    query: String,
}

#[async_trait]
impl Tool for Search {
    const NAME: &'static str = "search";
    type Args = SearchArgs;
    type Output = Vec<String>;
    type Error = ToolError;

    fn description(&self) -> String {
        "Search the documentation.".to_owned()
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }

    async fn call(&self, args: SearchArgs) -> ToolResult<Vec<String>> {
        Ok(vec![format!("docs/{}.md: Refunds are issued within 14 days.", args.query.replace(' ', "-"))])
    }
}

/// Always returns an execution error.
#[derive(Debug, Clone, Copy, Default)]
pub struct Broken;

#[async_trait]
impl Tool for Broken {
    const NAME: &'static str = "broken";
    type Args = Value;
    type Output = Value;
    type Error = ToolError;

    fn description(&self) -> String {
        "Always fails.".to_owned()
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(&self, _args: Value) -> ToolResult<Value> {
        Err(ToolError::execution("backend unavailable"))
    }
}

/// Always panics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crashing;

#[async_trait]
impl Tool for Crashing {
    const NAME: &'static str = "crashing";
    type Args = Value;
    type Output = Value;
    type Error = ToolError;

    fn description(&self) -> String {
        "Always panics.".to_owned()
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(&self, _args: Value) -> ToolResult<Value> {
        panic!("index out of bounds in crashing tool");
    }
}

/// Sleeps far longer than any test budget.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sleepy;

#[async_trait]
impl Tool for Sleepy {
    const NAME: &'static str = "sleepy";
    type Args = Value;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        "Takes an hour.".to_owned()
    }

    fn parameters_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(&self, _args: Value) -> ToolResult<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("awake".to_owned())
    }
}

/// Every test tool.
pub fn toolset() -> ToolSet {
    ToolSet::new()
        .with(Calculator)
        .with(Search)
        .with(Broken)
        .with(Crashing)
        .with(Sleepy)
}

pub fn call(id: &str, name: &str, arguments: Value) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}

/// Tool-result messages in `result`, as `(tool_call_id, content)`.
pub fn tool_messages(result: &RunResult) -> Vec<(&str, &str)> {
    result
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| (m.tool_call_id.as_deref().unwrap_or_default(), m.content.as_str()))
        .collect()
}
