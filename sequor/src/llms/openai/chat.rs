//! OpenAI ChatProvider implementation.

use async_trait::async_trait;
use serde_json::Value;

use crate::chat::{ChatProvider, ChatRequest, ChatResponse, StopReason};
use crate::error::{LlmError, Result};
use crate::message::Message;
use crate::record::ToolCallRequest;

use super::client::OpenAI;
use super::types::{OpenAIChatResponse, OpenAIToolCall};

impl OpenAI {
    /// Parse the response into ChatResponse.
    pub(crate) fn parse_response(response: OpenAIChatResponse) -> Result<ChatResponse> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::response_format("at least one choice", "empty choices"))?;

        let stop_reason = choice
            .finish_reason
            .as_deref()
            .map_or(StopReason::Stop, StopReason::parse);

        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(Self::convert_tool_call)
            .collect();

        let content = choice
            .message
            .content
            .or(choice.message.refusal)
            .unwrap_or_default();

        let mut chat_response =
            ChatResponse::new(Message::assistant_with_tool_calls(content, tool_calls))
                .with_stop_reason(stop_reason)
                .with_model(response.model)
                .with_id(response.id);
        chat_response.usage = response.usage;
        Ok(chat_response)
    }

    /// Decode wire arguments.
    ///
    /// Undecodable argument strings are kept verbatim; validation rejects
    /// them as non-object arguments.
    fn convert_tool_call(tc: OpenAIToolCall) -> ToolCallRequest {
        let arguments = if tc.function.arguments.trim().is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str(&tc.function.arguments)
                .unwrap_or(Value::String(tc.function.arguments))
        };
        ToolCallRequest::new(tc.id, tc.function.name, arguments)
    }
}

#[async_trait]
impl ChatProvider for OpenAI {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = self.chat_url();
        let body = self.build_body(request);

        let response = self
            .build_request(&url)
            .json(&body)
            .send()
            .await
            .map_err(LlmError::from)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Self::parse_error(status.as_u16(), &error_text).into());
        }

        let response_text = response.text().await.map_err(LlmError::from)?;
        let parsed: OpenAIChatResponse = serde_json::from_str(&response_text).map_err(|e| {
            LlmError::response_format(
                "valid OpenAI response",
                format!("parse error: {e}, response: {response_text}"),
            )
        })?;

        Self::parse_response(parsed)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn default_model(&self) -> &str {
        self.model()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: Value) -> Result<ChatResponse> {
        OpenAI::parse_response(serde_json::from_value(body).unwrap())
    }

    #[test]
    fn parses_text_reply() {
        let resp = parse(json!({
            "id": "chatcmpl-1",
            "model": "gpt-4o",
            "choices": [{"message": {"role": "assistant", "content": "Paris"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 9, "completion_tokens": 1, "total_tokens": 10}
        }))
        .unwrap();
        assert_eq!(resp.text(), Some("Paris"));
        assert_eq!(resp.stop_reason, StopReason::Stop);
        assert_eq!(resp.usage.unwrap().total_tokens, 10);
        assert_eq!(resp.id.as_deref(), Some("chatcmpl-1"));
    }

    #[test]
    fn parses_tool_calls() {
        let resp = parse(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "calculator", "arguments": "{\"expr\":\"2+2\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        let call = &resp.message.tool_calls[0];
        assert_eq!(call.id, "call_1");
        assert_eq!(call.arguments, json!({"expr": "2+2"}));
        assert_eq!(resp.stop_reason, StopReason::ToolCalls);
        assert!(resp.message.content.is_empty());
    }

    #[test]
    fn malformed_arguments_are_kept_as_string() {
        let resp = parse(json!({
            "choices": [{
                "message": {
                    "tool_calls": [{"id": "c", "function": {"name": "t", "arguments": "{oops"}}]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        assert_eq!(resp.message.tool_calls[0].arguments, json!("{oops"));
    }

    #[test]
    fn empty_choices_is_format_error() {
        let err = parse(json!({"choices": []})).unwrap_err();
        assert!(err.to_string().contains("empty choices"));
    }

    #[test]
    fn refusal_becomes_content() {
        let resp = parse(json!({
            "choices": [{"message": {"content": null, "refusal": "I can't help"}, "finish_reason": "stop"}]
        }))
        .unwrap();
        assert_eq!(resp.text(), Some("I can't help"));
    }
}
