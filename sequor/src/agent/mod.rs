//! The orchestration core.
//!
//! A run moves through four states:
//!
//! ```text
//!            ┌──────────────────────────────────────┐
//!            ▼                                      │
//!       Invoking ──► Routing ──► Executing ─────────┘
//!                       │
//!                       └──► Terminal(RunStatus)
//! ```
//!
//! - [`ModelInvoker`](invoker) asks the provider for one assistant message,
//!   recovering text-embedded calls and re-prompting on malformed output.
//! - [`ToolCallValidator`] checks each call against the catalog.
//! - The executor runs calls one at a time, isolating failures per call.
//! - The controller commits whole turns and enforces `max_iterations`.
//! - [`Supervisor`] owns the deadline and turns panics into
//!   [`RunStatus::FatalError`].
//!
//! # Example
//!
//! ```rust,ignore
//! use sequor::prelude::*;
//!
//! let provider = OpenAI::from_env()?;
//! let tools = ToolSet::new().with(Calculator);
//! let result = Supervisor::new(provider)
//!     .run(vec![Message::user("What is 2+2?")], &tools, &RunConfig::default())
//!     .await;
//! println!("{}: {:?}", result.status, result.final_text());
//! ```

mod config;
mod controller;
mod executor;
mod invoker;
pub mod repair;
mod result;
mod supervisor;
mod validator;

pub use config::RunConfig;
pub use invoker::Invocation;
pub use result::{RunResult, RunStatus};
pub use supervisor::Supervisor;
pub use validator::{CallVerdict, ToolCallValidator, Validation};

/// The run deadline elapsed while a component was waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeadlineExceeded;

/// User-facing texts for runs that did not end with a model answer.
pub(crate) mod fallback {
    pub(crate) const PROVIDER_FAILURE: &str =
        "Sorry, I couldn't reach the language model service. Please try again later.";
    pub(crate) const MALFORMED_OUTPUT: &str =
        "Sorry, I wasn't able to produce a valid response to that request.";
    pub(crate) const TIMED_OUT: &str =
        "Sorry, this request took too long and was stopped before it finished.";
    pub(crate) const INTERNAL_ERROR: &str =
        "Sorry, something went wrong while handling this request.";

    /// Closing message when the iteration bound is reached.
    pub(crate) fn iteration_limit(max: usize) -> String {
        format!(
            "I stopped after {max} tool-use step(s) without reaching a final answer. \
             The results gathered so far are above."
        )
    }
}
