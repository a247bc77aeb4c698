//! Run result types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};
use crate::record::ToolCallResult;
use crate::usage::Usage;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model produced a final answer.
    Completed,
    /// The iteration bound was reached.
    TruncatedByLimit,
    /// The run deadline elapsed.
    TimedOut,
    /// The provider was unreachable or a component failed.
    FatalError,
}

impl RunStatus {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::TruncatedByLimit => "truncated_by_limit",
            Self::TimedOut => "timed_out",
            Self::FatalError => "fatal_error",
        }
    }

    /// Returns `true` for [`RunStatus::Completed`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of a supervised run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Committed history: the caller's messages followed by every completed
    /// turn, then any closing message.
    pub messages: Vec<Message>,
    /// How the run ended.
    pub status: RunStatus,
    /// Completed Executing → Invoking transitions.
    pub iterations: usize,
    /// Token usage summed over every provider call.
    pub usage: Usage,
    /// Results of every committed tool call, in execution order.
    pub tool_calls: Vec<ToolCallResult>,
}

impl RunResult {
    /// Text of the last assistant message, if any.
    #[must_use]
    pub fn final_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .and_then(Message::text)
    }

    /// Check if the run completed normally.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }
}
