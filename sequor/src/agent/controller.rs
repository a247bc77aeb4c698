//! The reason/act/observe state machine.

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::message::Message;
use crate::record::ToolCallResult;
use crate::usage::Usage;

use super::executor::ToolExecutor;
use super::invoker::{Invocation, ModelInvoker};
use super::result::{RunResult, RunStatus};
use super::validator::Validation;
use super::{DeadlineExceeded, fallback};

enum State {
    Invoking,
    Routing(Invocation),
    Executing {
        message: Message,
        validation: Validation,
    },
    Terminal(RunStatus),
}

/// Owns the history of one run and drives it to a terminal status.
///
/// History only grows by whole turns: an assistant message is pushed
/// together with the results of all its calls, or not at all. When the
/// [`run`](Self::run) future is dropped mid-turn, the fields still hold the
/// last committed state.
pub(crate) struct GraphController<'a> {
    invoker: ModelInvoker<'a>,
    executor: ToolExecutor<'a>,
    max_iterations: usize,
    history: Vec<Message>,
    iterations: usize,
    usage: Usage,
    tool_calls: Vec<ToolCallResult>,
}

impl<'a> GraphController<'a> {
    pub(crate) fn new(
        invoker: ModelInvoker<'a>,
        executor: ToolExecutor<'a>,
        max_iterations: usize,
        history: Vec<Message>,
    ) -> Self {
        Self {
            invoker,
            executor,
            max_iterations: max_iterations.max(1),
            history,
            iterations: 0,
            usage: Usage::zero(),
            tool_calls: Vec::new(),
        }
    }

    /// Run until a terminal status is reached.
    pub(crate) async fn run(&mut self, deadline: Instant) -> RunStatus {
        let mut state = State::Invoking;
        loop {
            state = match state {
                State::Invoking => {
                    debug!(iteration = self.iterations, "Invoking model");
                    match self
                        .invoker
                        .invoke(&self.history, &mut self.usage, deadline)
                        .await
                    {
                        Ok(invocation) => State::Routing(invocation),
                        Err(DeadlineExceeded) => State::Terminal(RunStatus::TimedOut),
                    }
                }
                State::Routing(invocation) => self.route(invocation),
                State::Executing {
                    message,
                    validation,
                } => {
                    debug!(calls = message.tool_calls.len(), "Executing tool calls");
                    match self
                        .executor
                        .execute(&message.tool_calls, &validation, deadline)
                        .await
                    {
                        Ok(results) => {
                            self.commit(message, results);
                            self.iterations += 1;
                            if self.iterations >= self.max_iterations {
                                warn!(max = self.max_iterations, "Iteration limit reached");
                                self.close(fallback::iteration_limit(self.max_iterations));
                                State::Terminal(RunStatus::TruncatedByLimit)
                            } else {
                                State::Invoking
                            }
                        }
                        Err(DeadlineExceeded) => State::Terminal(RunStatus::TimedOut),
                    }
                }
                State::Terminal(status) => {
                    info!(%status, iterations = self.iterations, "Run reached terminal state");
                    return status;
                }
            };
        }
    }

    fn route(&mut self, invocation: Invocation) -> State {
        match invocation {
            Invocation::Ready {
                message,
                validation,
            } if message.has_tool_calls() => State::Executing {
                message,
                validation,
            },
            Invocation::Ready { message, .. } | Invocation::Degraded(message) => {
                self.history.push(message);
                State::Terminal(RunStatus::Completed)
            }
            Invocation::Failed(message) => {
                self.history.push(message);
                State::Terminal(RunStatus::FatalError)
            }
        }
    }

    /// Append an assistant message and its results as one turn.
    fn commit(&mut self, message: Message, results: Vec<ToolCallResult>) {
        debug_assert_eq!(message.tool_calls.len(), results.len());
        self.history.push(message);
        self.history.extend(results.iter().map(Message::from_result));
        self.tool_calls.extend(results);
    }

    /// Append a closing assistant message.
    pub(crate) fn close(&mut self, text: impl Into<String>) {
        self.history.push(Message::assistant(text));
    }

    /// Number of committed turns so far.
    pub(crate) const fn iterations(&self) -> usize {
        self.iterations
    }

    pub(crate) fn finish(self, status: RunStatus) -> RunResult {
        RunResult {
            messages: self.history,
            status,
            iterations: self.iterations,
            usage: self.usage,
            tool_calls: self.tool_calls,
        }
    }
}
