//! Scripted provider for tests and offline runs.
//!
//! Returns queued responses in order, and records every request it receives
//! so tests can assert on what the orchestrator sent.
//!
//! # Example
//!
//! ```rust,ignore
//! use sequor::prelude::*;
//!
//! let provider = ScriptedProvider::new()
//!     .tool_calls(vec![ToolCallRequest::new("c1", "echo", json!({"message": "hi"}))])
//!     .text("Done.");
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::chat::{ChatProvider, ChatRequest, ChatResponse, StopReason};
use crate::error::{LlmError, Result};
use crate::message::Message;
use crate::record::ToolCallRequest;

/// One scripted provider reaction.
#[derive(Debug, Clone)]
pub enum Step {
    /// Return this response.
    Reply(ChatResponse),
    /// Fail with this error.
    Fail(LlmError),
    /// Panic with this message.
    Panic(String),
}

/// A [`ChatProvider`] that plays back a script.
///
/// Once the queue is empty, the fallback set with
/// [`always`](Self::always) is returned; without one, calls fail with an
/// internal error.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    model: String,
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<ChatResponse>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Create a provider with an empty script.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: "scripted-model".to_owned(),
            ..Self::default()
        }
    }

    /// Set the default model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Wait this long before answering each call.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a step.
    #[must_use]
    pub fn step(mut self, step: Step) -> Self {
        self.steps
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
        self
    }

    /// Queue a response.
    #[must_use]
    pub fn reply(self, response: ChatResponse) -> Self {
        self.step(Step::Reply(response))
    }

    /// Queue a plain text answer.
    #[must_use]
    pub fn text(self, content: impl Into<String>) -> Self {
        self.reply(ChatResponse::from_text(content))
    }

    /// Queue an assistant turn carrying structured tool calls.
    #[must_use]
    pub fn tool_calls(self, calls: Vec<ToolCallRequest>) -> Self {
        self.reply(
            ChatResponse::new(Message::assistant_with_tool_calls("", calls))
                .with_stop_reason(StopReason::ToolCalls),
        )
    }

    /// Queue an error.
    #[must_use]
    pub fn fail(self, error: LlmError) -> Self {
        self.step(Step::Fail(error))
    }

    /// Queue a panic.
    #[must_use]
    pub fn panic(self, message: impl Into<String>) -> Self {
        self.step(Step::Panic(message.into()))
    }

    /// Answer with `response` once the script runs out.
    #[must_use]
    pub fn always(mut self, response: ChatResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Every request received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `chat` calls received.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Steps not yet played.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn next_step(&self) -> Option<Step> {
        let queued = self
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        queued.or_else(|| self.fallback.clone().map(Step::Reply))
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    #[allow(clippy::panic)]
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_step() {
            Some(Step::Reply(response)) => Ok(response),
            Some(Step::Fail(error)) => Err(error.into()),
            Some(Step::Panic(message)) => panic!("{message}"),
            None => Err(LlmError::internal("script exhausted").into()),
        }
    }

    fn provider_name(&self) -> &'static str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}
