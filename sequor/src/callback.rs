//! Run lifecycle hooks.
//!
//! [`RunHooks`] observes a supervised run without influencing it. Every
//! method has a default no-op body, so implementations only override the
//! events they care about.
//!
//! # Lifecycle Events
//!
//! 1. `on_run_start`
//! 2. Per cycle:
//!    - `on_llm_start` → *model call* → `on_llm_end` (once per attempt)
//!    - `on_repair` when calls were recovered from text markup
//!    - `on_tool_start` → *tool execution* → `on_tool_end` (once per call)
//! 3. `on_run_end`, always, with the final [`RunResult`]

use std::sync::Arc;

use async_trait::async_trait;

use crate::agent::RunResult;
use crate::chat::ChatResponse;
use crate::message::Message;
use crate::record::{ToolCallRequest, ToolCallResult};

/// A shared, thread-safe [`RunHooks`] trait object.
pub type SharedRunHooks = Arc<dyn RunHooks>;

/// Run-level lifecycle hooks.
///
/// Hooks are awaited inline. Apart from `on_run_start` and `on_run_end`,
/// they count against the run deadline.
#[async_trait]
pub trait RunHooks: Send + Sync {
    /// Called once before the first model call, with the caller's history.
    async fn on_run_start(&self, _history: &[Message]) {}

    /// Called just before a model call with the messages sent to the model.
    async fn on_llm_start(&self, _messages: &[Message]) {}

    /// Called after a model call returns successfully.
    async fn on_llm_end(&self, _response: &ChatResponse) {}

    /// Called when tool calls were recovered from the message text.
    async fn on_repair(&self, _calls: &[ToolCallRequest]) {}

    /// Called immediately before a validated tool is invoked.
    async fn on_tool_start(&self, _call: &ToolCallRequest) {}

    /// Called once per request with its result, whether or not the tool ran.
    async fn on_tool_end(&self, _result: &ToolCallResult) {}

    /// Called once with the final result.
    async fn on_run_end(&self, _result: &RunResult) {}
}

/// A [`RunHooks`] implementation that does nothing.
///
/// This is the default used when no hooks are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRunHooks;

#[async_trait]
impl RunHooks for NoopRunHooks {}

/// Log verbosity level for hook events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Trace-level logging (most verbose).
    Trace,
    /// Debug-level logging.
    Debug,
    /// Info-level logging (default).
    #[default]
    Info,
}

macro_rules! log_at_level {
    ($level:expr, $($arg:tt)*) => {
        match $level {
            LogLevel::Trace => tracing::trace!($($arg)*),
            LogLevel::Debug => tracing::debug!($($arg)*),
            LogLevel::Info => tracing::info!($($arg)*),
        }
    };
}

/// A [`RunHooks`] implementation that logs lifecycle events via `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRunHooks {
    level: LogLevel,
}

impl LoggingRunHooks {
    /// Create logging hooks at INFO level.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create logging hooks with a custom level.
    #[must_use]
    pub const fn with_level(level: LogLevel) -> Self {
        Self { level }
    }
}

#[async_trait]
impl RunHooks for LoggingRunHooks {
    async fn on_run_start(&self, history: &[Message]) {
        log_at_level!(self.level, messages = history.len(), "Run started");
    }

    async fn on_llm_start(&self, messages: &[Message]) {
        log_at_level!(self.level, messages = messages.len(), "LLM call started");
    }

    async fn on_llm_end(&self, response: &ChatResponse) {
        let usage = response.usage.unwrap_or_default();
        log_at_level!(
            self.level,
            tool_calls = response.message.tool_calls.len(),
            total_tokens = usage.total_tokens,
            "LLM call completed"
        );
    }

    async fn on_repair(&self, calls: &[ToolCallRequest]) {
        log_at_level!(self.level, recovered = calls.len(), "Tool calls recovered from text");
    }

    async fn on_tool_start(&self, call: &ToolCallRequest) {
        log_at_level!(self.level, tool = %call.name, id = %call.id, "Tool started");
    }

    async fn on_tool_end(&self, result: &ToolCallResult) {
        log_at_level!(
            self.level,
            tool = %result.name,
            id = %result.tool_call_id,
            is_error = result.is_error,
            "Tool completed"
        );
    }

    async fn on_run_end(&self, result: &RunResult) {
        log_at_level!(
            self.level,
            status = %result.status,
            iterations = result.iterations,
            total_tokens = result.usage.total_tokens,
            "Run finished"
        );
    }
}
