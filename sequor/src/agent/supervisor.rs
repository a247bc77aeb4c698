//! Run entry point: deadline, panic containment, lifecycle hooks.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, error, info, info_span, warn};

use crate::callback::{NoopRunHooks, RunHooks, SharedRunHooks};
use crate::chat::{ChatProvider, SharedChatProvider};
use crate::message::Message;
use crate::tool::ToolSet;

use super::config::RunConfig;
use super::controller::GraphController;
use super::executor::{ToolExecutor, panic_message};
use super::fallback;
use super::invoker::ModelInvoker;
use super::result::{RunResult, RunStatus};
use super::validator::ToolCallValidator;

/// Deadline used when `now + timeout` is not representable.
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

/// Runs conversations against a provider.
///
/// A supervisor is cheap to clone and holds no per-run state, so one value
/// can serve any number of concurrent runs.
#[derive(Clone)]
pub struct Supervisor {
    provider: SharedChatProvider,
    hooks: SharedRunHooks,
}

impl fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Supervisor")
            .field("provider", &self.provider.provider_name())
            .finish_non_exhaustive()
    }
}

impl Supervisor {
    /// Create a supervisor for `provider` with no hooks.
    #[must_use]
    pub fn new(provider: impl ChatProvider + 'static) -> Self {
        Self::from_shared(Arc::new(provider))
    }

    /// Create a supervisor from an already shared provider.
    #[must_use]
    pub fn from_shared(provider: SharedChatProvider) -> Self {
        Self {
            provider,
            hooks: Arc::new(NoopRunHooks),
        }
    }

    /// Attach lifecycle hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: impl RunHooks + 'static) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Attach already shared lifecycle hooks.
    #[must_use]
    pub fn with_shared_hooks(mut self, hooks: SharedRunHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// The provider this supervisor calls.
    #[must_use]
    pub fn provider(&self) -> &SharedChatProvider {
        &self.provider
    }

    /// Run `history` to completion.
    ///
    /// Never fails: every outcome, including provider outages, timeouts and
    /// panics, is reported through [`RunResult::status`]. The returned
    /// messages start with `history` and end with an assistant message.
    pub async fn run(&self, history: Vec<Message>, tools: &ToolSet, config: &RunConfig) -> RunResult {
        let model = config
            .model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
            .to_owned();
        let span = info_span!(
            "run",
            run.provider = self.provider.provider_name(),
            run.model = %model,
            run.tools = tools.len(),
            run.max_iterations = config.effective_max_iterations(),
            run.status = tracing::field::Empty,
            run.iterations = tracing::field::Empty,
        );
        self.run_inner(history, tools, config).instrument(span).await
    }

    async fn run_inner(&self, history: Vec<Message>, tools: &ToolSet, config: &RunConfig) -> RunResult {
        let started = Instant::now();
        let deadline = started
            .checked_add(config.timeout)
            .unwrap_or_else(|| started + FAR_FUTURE);

        self.hooks.on_run_start(&history).await;
        info!(messages = history.len(), timeout = ?config.timeout, "Run started");

        let catalog = tools.definitions();
        let validator = ToolCallValidator::new(catalog.clone());
        let invoker = ModelInvoker::new(
            self.provider.as_ref(),
            self.hooks.as_ref(),
            &validator,
            &catalog,
            config,
        );
        let executor = ToolExecutor::new(tools, self.hooks.as_ref(), config.tool_timeout);
        let mut controller = GraphController::new(
            invoker,
            executor,
            config.effective_max_iterations(),
            history,
        );

        let guarded = AssertUnwindSafe(controller.run(deadline)).catch_unwind();
        let status = match timeout_at(deadline, guarded).await {
            Ok(Ok(status)) => status,
            Ok(Err(payload)) => {
                error!(panic = %panic_message(payload.as_ref()), "Run aborted by a panic");
                controller.close(fallback::INTERNAL_ERROR);
                RunStatus::FatalError
            }
            Err(_) => RunStatus::TimedOut,
        };

        if status == RunStatus::TimedOut {
            warn!(
                elapsed = ?started.elapsed(),
                iterations = controller.iterations(),
                "Run deadline elapsed"
            );
            controller.close(fallback::TIMED_OUT);
        }

        let result = controller.finish(status);
        let span = tracing::Span::current();
        span.record("run.status", result.status.as_str());
        span.record("run.iterations", result.iterations);
        info!(
            status = %result.status,
            iterations = result.iterations,
            tool_calls = result.tool_calls.len(),
            usage = %result.usage,
            elapsed = ?started.elapsed(),
            "Run finished"
        );

        self.hooks.on_run_end(&result).await;
        result
    }
}
