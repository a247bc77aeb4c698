//! Built-in tools offered to the model by `sequor run`.

use std::path::PathBuf;

use async_trait::async_trait;
use sequor::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Largest file `read_file` returns, in bytes.
const MAX_READ_BYTES: u64 = 64 * 1024;

/// Returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoTool;

/// Arguments for [`EchoTool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoArgs {
    /// Text to echo back.
    pub message: String,
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
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: Self::Args) -> ToolResult<Self::Output> {
        Ok(args.message)
    }
}

/// Reads a UTF-8 text file below the working directory.
#[derive(Debug, Clone, Default)]
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    /// Restrict reads to `root` and its descendants.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Arguments for [`ReadFileTool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadFileArgs {
    /// Path relative to the working directory.
    pub path: String,
}

#[async_trait]
impl Tool for ReadFileTool {
    const NAME: &'static str = "read_file";
    type Args = ReadFileArgs;
    type Output = String;
    type Error = ToolError;

    fn description(&self) -> String {
        format!(
            "Reads a UTF-8 text file (at most {} KiB) relative to the current directory.",
            MAX_READ_BYTES / 1024
        )
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the current directory"
                }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    async fn call(&self, args: Self::Args) -> ToolResult<Self::Output> {
        let root = tokio::fs::canonicalize(&self.root).await?;
        let target = tokio::fs::canonicalize(root.join(&args.path))
            .await
            .map_err(|e| ToolError::execution(format!("cannot open '{}': {e}", args.path)))?;
        if !target.starts_with(&root) {
            return Err(ToolError::invalid_args(format!(
                "'{}' is outside the working directory",
                args.path
            )));
        }

        let size = tokio::fs::metadata(&target).await?.len();
        if size > MAX_READ_BYTES {
            return Err(ToolError::execution(format!(
                "'{}' is {size} bytes, larger than the {MAX_READ_BYTES} byte limit",
                args.path
            )));
        }

        Ok(tokio::fs::read_to_string(&target).await?)
    }
}

/// The tools registered for every CLI run.
#[must_use]
pub fn builtin(root: impl Into<PathBuf>) -> ToolSet {
    ToolSet::new().with(EchoTool).with(ReadFileTool::new(root))
}
