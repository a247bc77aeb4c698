//! One model turn: request, repair, validate, re-prompt.

use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, warn};

use crate::callback::RunHooks;
use crate::chat::{ChatProvider, ChatRequest, ChatResponse, ToolChoice};
use crate::error::Error;
use crate::message::{Message, Role};
use crate::tool::ToolDefinition;
use crate::usage::Usage;

use super::config::RunConfig;
use super::repair;
use super::validator::{ToolCallValidator, Validation};
use super::{DeadlineExceeded, fallback};

/// What a model turn produced.
#[derive(Debug, Clone)]
pub enum Invocation {
    /// A usable assistant message. Any calls in it are routed, including
    /// rejected ones, which are answered with error results.
    Ready {
        /// The assistant message, after repair.
        message: Message,
        /// Verdicts for `message.tool_calls`.
        validation: Validation,
    },
    /// The model kept producing malformed output. Tool calls have been
    /// stripped and the message is final text.
    Degraded(Message),
    /// The provider could not be reached. Carries a user-safe message.
    Failed(Message),
}

/// Drives the provider for a single assistant turn.
pub(crate) struct ModelInvoker<'a> {
    provider: &'a dyn ChatProvider,
    hooks: &'a dyn RunHooks,
    validator: &'a ToolCallValidator,
    catalog: &'a [ToolDefinition],
    config: &'a RunConfig,
}

impl<'a> ModelInvoker<'a> {
    pub(crate) fn new(
        provider: &'a dyn ChatProvider,
        hooks: &'a dyn RunHooks,
        validator: &'a ToolCallValidator,
        catalog: &'a [ToolDefinition],
        config: &'a RunConfig,
    ) -> Self {
        Self {
            provider,
            hooks,
            validator,
            catalog,
            config,
        }
    }

    /// Produce exactly one assistant message for `history`.
    ///
    /// Corrective instructions go into a scratch copy; `history` is never
    /// modified. Token usage of every attempt is added to `usage`.
    pub(crate) async fn invoke(
        &self,
        history: &[Message],
        usage: &mut Usage,
        deadline: Instant,
    ) -> Result<Invocation, DeadlineExceeded> {
        let mut scratch: Option<Vec<Message>> = None;
        let mut retries = 0;

        loop {
            let messages = scratch.as_deref().unwrap_or(history);
            let response = match self.request(messages, usage, deadline).await? {
                Ok(response) => response,
                Err(e) => {
                    error!(error = %e, provider = self.provider.provider_name(), "Model call failed");
                    return Ok(Invocation::Failed(Message::assistant(fallback::PROVIDER_FAILURE)));
                }
            };

            let mut message = response.message;
            message.role = Role::Assistant;
            if let Some(repaired) = repair::repair_message(&message) {
                warn!(recovered = repaired.tool_calls.len(), "Recovered tool calls from text");
                self.hooks.on_repair(&repaired.tool_calls).await;
                message = repaired;
            }

            let validation = self.validator.validate(&message);
            if !validation.is_malformed() {
                return Ok(Invocation::Ready {
                    message,
                    validation,
                });
            }

            if retries >= self.config.max_validation_retries {
                warn!(retries, "Model output still malformed, giving up on tool calls");
                return Ok(Invocation::Degraded(degrade(message)));
            }

            retries += 1;
            warn!(attempt = retries, "Malformed model output, re-prompting");
            let mut corrected = history.to_vec();
            corrected.push(Message::system(validation.feedback(&message)));
            scratch = Some(corrected);
        }
    }

    /// Call the provider, retrying retryable errors without delay.
    async fn request(
        &self,
        messages: &[Message],
        usage: &mut Usage,
        deadline: Instant,
    ) -> Result<Result<ChatResponse, Error>, DeadlineExceeded> {
        let model = self
            .config
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_owned());
        let request = ChatRequest::with_messages(model, messages.to_vec())
            .tools(self.catalog.to_vec())
            .tool_choice(ToolChoice::Auto)
            .parallel_tool_calls(false);

        let attempts = self.config.effective_provider_attempts();
        let mut attempt = 0;
        loop {
            attempt += 1;
            // Immediate retries would otherwise starve the timer driver.
            tokio::task::yield_now().await;
            self.hooks.on_llm_start(messages).await;
            debug!(attempt, messages = messages.len(), "Calling model");

            let outcome = tokio::select! {
                biased;
                () = sleep_until(deadline) => return Err(DeadlineExceeded),
                outcome = self.provider.chat(&request) => outcome,
            };

            match outcome {
                Ok(response) => {
                    if let Some(reported) = response.usage {
                        *usage += reported;
                    }
                    if response.stop_reason.is_truncated() {
                        warn!(attempt, "Model output was cut off at the token limit");
                    }
                    self.hooks.on_llm_end(&response).await;
                    return Ok(Ok(response));
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    warn!(error = %e, attempt, max = attempts, "Model call failed, retrying");
                }
                Err(e) => return Ok(Err(e)),
            }
        }
    }
}

/// Strip tool calls, keeping the text only when it is clean.
fn degrade(mut message: Message) -> Message {
    message.tool_calls.clear();
    if message.text().is_none() || repair::contains_markup(&message.content) {
        message.content = fallback::MALFORMED_OUTPUT.to_owned();
    }
    message
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::callback::NoopRunHooks;
    use crate::error::LlmError;
    use crate::llms::mock::ScriptedProvider;
    use crate::record::ToolCallRequest;

    fn catalog() -> Vec<ToolDefinition> {
        vec![ToolDefinition::new(
            "echo",
            "Echo a message",
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
        )]
    }

    async fn invoke(provider: &ScriptedProvider, config: &RunConfig) -> (Invocation, Usage) {
        let catalog = catalog();
        let validator = ToolCallValidator::new(catalog.clone());
        let invoker = ModelInvoker::new(provider, &NoopRunHooks, &validator, &catalog, config);
        let mut usage = Usage::zero();
        let deadline = Instant::now() + Duration::from_secs(60);
        let invocation = invoker
            .invoke(&[Message::user("hi")], &mut usage, deadline)
            .await
            .unwrap();
        (invocation, usage)
    }

    #[tokio::test]
    async fn request_binds_catalog() {
        let provider = ScriptedProvider::new().text("hello");
        let config = RunConfig::new().model("test-model");
        let (invocation, _) = invoke(&provider, &config).await;
        assert!(matches!(invocation, Invocation::Ready { .. }));

        let requests = provider.requests();
        let request = &requests[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.tools.as_ref().unwrap()[0].name, "echo");
        assert_eq!(request.tool_choice, Some(json!("auto")));
        assert_eq!(request.parallel_tool_calls, Some(false));
    }

    #[tokio::test]
    async fn text_markup_is_repaired() {
        let provider = ScriptedProvider::new()
            .text(r#"<tool_call>{"name":"echo","arguments":{"message":"x"}}</tool_call>"#);
        let (invocation, _) = invoke(&provider, &RunConfig::new()).await;
        let Invocation::Ready { message, validation } = invocation else {
            unreachable!("expected a ready message");
        };
        assert_eq!(message.tool_calls[0].name, "echo");
        assert!(validation.is_valid());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn uppercase_markup_is_repaired_without_reprompt() {
        let provider = ScriptedProvider::new()
            .text(r#"<TOOL_CALL>{"name":"echo","arguments":{"message":"x"}}</TOOL_CALL>"#)
            .text("unused");
        let (invocation, _) = invoke(&provider, &RunConfig::new()).await;
        let Invocation::Ready { message, validation } = invocation else {
            unreachable!("expected a ready message");
        };
        assert_eq!(message.tool_calls.len(), 1);
        assert!(validation.is_valid());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn unknown_tool_is_not_retried() {
        let provider = ScriptedProvider::new().tool_calls(vec![ToolCallRequest::new(
            "c1",
            "nonexistent_tool",
            json!({}),
        )]);
        let (invocation, _) = invoke(&provider, &RunConfig::new()).await;
        let Invocation::Ready { validation, .. } = invocation else {
            unreachable!("expected a ready message");
        };
        assert!(!validation.is_valid());
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn malformed_output_is_reprompted_then_degraded() {
        let provider = ScriptedProvider::new()
            .always(ChatResponse::from_text("<tool_call>{oops</tool_call>"));
        let config = RunConfig::new().max_validation_retries(2);
        let (invocation, _) = invoke(&provider, &config).await;

        let Invocation::Degraded(message) = invocation else {
            unreachable!("expected a degraded message");
        };
        assert!(!message.has_tool_calls());
        assert_eq!(message.content, fallback::MALFORMED_OUTPUT);
        assert_eq!(provider.call_count(), 3);

        let requests = provider.requests();
        assert_eq!(requests[0].messages.len(), 1);
        let retry = &requests[1].messages;
        assert_eq!(retry.len(), 2);
        assert_eq!(retry[1].role, Role::System);
        assert!(retry[1].content.contains("markup"));
        assert_eq!(requests[2].messages.len(), 2);
    }

    #[tokio::test]
    async fn corrective_retry_can_recover() {
        let provider = ScriptedProvider::new()
            .tool_calls(vec![ToolCallRequest::new("c1", "echo", json!("not an object"))])
            .text("fine");
        let (invocation, _) = invoke(&provider, &RunConfig::new()).await;
        let Invocation::Ready { message, .. } = invocation else {
            unreachable!("expected a ready message");
        };
        assert_eq!(message.text(), Some("fine"));
    }

    #[tokio::test]
    async fn retryable_errors_are_retried() {
        let provider = ScriptedProvider::new()
            .fail(LlmError::rate_limited("mock"))
            .reply(ChatResponse::from_text("ok").with_usage(Usage::new(5, 1)));
        let (invocation, usage) = invoke(&provider, &RunConfig::new()).await;
        assert!(matches!(invocation, Invocation::Ready { .. }));
        assert_eq!(usage.total_tokens, 6);
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_attempts_fail_safely() {
        let provider = ScriptedProvider::new()
            .fail(LlmError::network("connection refused"))
            .fail(LlmError::network("connection refused"));
        let config = RunConfig::new().max_provider_attempts(2);
        let (invocation, _) = invoke(&provider, &config).await;
        let Invocation::Failed(message) = invocation else {
            unreachable!("expected a failure");
        };
        assert_eq!(message.content, fallback::PROVIDER_FAILURE);
        assert!(!message.content.contains("refused"));
    }

    #[tokio::test]
    async fn non_retryable_error_fails_immediately() {
        let provider = ScriptedProvider::new()
            .fail(LlmError::auth("mock", "bad key"))
            .text("never reached");
        let (invocation, _) = invoke(&provider, &RunConfig::new()).await;
        assert!(matches!(invocation, Invocation::Failed(_)));
        assert_eq!(provider.call_count(), 1);
    }

    #[cfg(feature = "openai")]
    #[tokio::test]
    async fn transport_builder_error_gets_one_attempt() {
        let builder_error = reqwest::Client::new().get("not a url").build().unwrap_err();
        let provider = ScriptedProvider::new()
            .fail(LlmError::from(builder_error))
            .text("never reached");
        let config = RunConfig::new().max_provider_attempts(5);
        let (invocation, _) = invoke(&provider, &config).await;
        assert!(matches!(invocation, Invocation::Failed(_)));
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn degrade_keeps_clean_text() {
        let msg = Message::assistant_with_tool_calls(
            "Here is what I found.",
            vec![ToolCallRequest::new("", "echo", json!({}))],
        );
        let degraded = degrade(msg);
        assert!(!degraded.has_tool_calls());
        assert_eq!(degraded.content, "Here is what I found.");
    }
}
