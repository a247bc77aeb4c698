//! Prelude module for convenient imports.
//!
//! ```rust,ignore
//! use sequor::prelude::*;
//! ```

#[cfg(feature = "openai")]
pub use crate::llms::{OpenAI, OpenAIConfig};

pub use crate::agent::{
    CallVerdict, Invocation, RunConfig, RunResult, RunStatus, Supervisor, ToolCallValidator,
    Validation,
};
pub use crate::callback::{LogLevel, LoggingRunHooks, NoopRunHooks, RunHooks, SharedRunHooks};
pub use crate::chat::{
    ChatProvider, ChatRequest, ChatResponse, SharedChatProvider, StopReason, ToolChoice,
};
pub use crate::config::{ConfigError, ConfigIssue, IssueLevel, SequorConfig};
pub use crate::error::{Error, LlmError, Result, ToolError};
pub use crate::llms::ScriptedProvider;
pub use crate::message::{Message, Role};
pub use crate::record::{ToolCallRequest, ToolCallResult};
pub use crate::tool::{DynTool, SharedTool, Tool, ToolDefinition, ToolResult, ToolSet};
pub use crate::usage::Usage;
