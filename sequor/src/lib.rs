//! Sequor - a sequential tool-calling orchestrator
//!
//! Sequor drives a language model through reason/act/observe cycles: the
//! model proposes tool calls, the calls are validated and executed one at a
//! time, their results are appended to the conversation, and the loop
//! repeats until the model answers in plain text or a bound is reached.
//!
//! A run never fails with an `Err`. Provider outages, malformed model output,
//! tool failures, timeouts and panics are all reported through
//! [`RunResult::status`](agent::RunResult) with a user-safe closing message.
//!
//! ```rust,ignore
//! use sequor::prelude::*;
//!
//! let result = sequor::run(
//!     OpenAI::from_env()?,
//!     vec![Message::user("What is 17 * 23?")],
//!     &ToolSet::new().with(Calculator),
//!     &RunConfig::default(),
//! )
//! .await;
//! ```

pub mod agent;
pub mod callback;
pub mod chat;
pub mod config;
pub mod error;
pub mod llms;
pub mod message;
pub mod prelude;
pub mod record;
pub mod tool;
pub mod usage;

pub use agent::{RunConfig, RunResult, RunStatus, Supervisor};
pub use error::{Error, LlmError, Result, ToolError};

/// Run `history` against `provider` with a fresh [`Supervisor`].
pub async fn run(
    provider: impl chat::ChatProvider + 'static,
    history: Vec<message::Message>,
    tools: &tool::ToolSet,
    config: &RunConfig,
) -> RunResult {
    Supervisor::new(provider).run(history, tools, config).await
}
