//! Sequential tool execution with per-call isolation.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, debug, error, info_span, warn};

use crate::callback::RunHooks;
use crate::error::ToolError;
use crate::record::{ToolCallRequest, ToolCallResult};
use crate::tool::ToolSet;

use super::DeadlineExceeded;
use super::validator::{CallVerdict, Validation};

/// Runs the calls of one assistant turn, one at a time, in request order.
///
/// A failing, panicking or slow tool only affects its own result. The run
/// deadline is the one exception: when it elapses the whole turn is
/// abandoned.
pub(crate) struct ToolExecutor<'a> {
    tools: &'a ToolSet,
    hooks: &'a dyn RunHooks,
    tool_timeout: Option<Duration>,
}

impl<'a> ToolExecutor<'a> {
    pub(crate) fn new(
        tools: &'a ToolSet,
        hooks: &'a dyn RunHooks,
        tool_timeout: Option<Duration>,
    ) -> Self {
        Self {
            tools,
            hooks,
            tool_timeout,
        }
    }

    /// Produce exactly one result per call, in the same order.
    pub(crate) async fn execute(
        &self,
        calls: &[ToolCallRequest],
        validation: &Validation,
        deadline: Instant,
    ) -> Result<Vec<ToolCallResult>, DeadlineExceeded> {
        let mut results = Vec::with_capacity(calls.len());
        let verdicts = validation.verdicts();

        for (index, call) in calls.iter().enumerate() {
            let verdict = verdicts.get(index).cloned().unwrap_or(CallVerdict::Valid);
            let span = info_span!(
                "tool",
                tool.name = %call.name,
                tool.id = %call.id,
                tool.input = %call.arguments,
                tool.success = tracing::field::Empty,
            );
            let result = self
                .execute_one(call, &verdict, deadline)
                .instrument(span)
                .await?;
            results.push(result);
        }

        Ok(results)
    }

    async fn execute_one(
        &self,
        call: &ToolCallRequest,
        verdict: &CallVerdict,
        deadline: Instant,
    ) -> Result<ToolCallResult, DeadlineExceeded> {
        let outcome = if let Some(rejection) = verdict.to_error(call) {
            warn!(error = %rejection, "Tool call rejected");
            Err(rejection)
        } else {
            self.hooks.on_tool_start(call).await;
            self.dispatch(call, deadline).await?
        };

        let result = match outcome {
            Ok(value) => ToolCallResult::success(call, &value),
            Err(e) => ToolCallResult::failure(call, &e),
        };
        tracing::Span::current().record("tool.success", result.is_success());
        debug!(is_error = result.is_error, "Tool call finished");

        self.hooks.on_tool_end(&result).await;
        Ok(result)
    }

    async fn dispatch(
        &self,
        call: &ToolCallRequest,
        deadline: Instant,
    ) -> Result<Result<serde_json::Value, ToolError>, DeadlineExceeded> {
        let Some(tool) = self.tools.get(&call.name) else {
            return Ok(Err(ToolError::not_found(&call.name)));
        };

        let per_call = async {
            match self.tool_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending().await,
            }
        };
        let invocation = AssertUnwindSafe(tool.call_json(call.arguments.clone())).catch_unwind();

        let outcome = tokio::select! {
            biased;
            () = sleep_until(deadline) => return Err(DeadlineExceeded),
            () = per_call => {
                let secs = self.tool_timeout.unwrap_or_default().as_secs_f64();
                warn!(secs, "Tool call timed out");
                Err(ToolError::Timeout { name: call.name.clone(), secs })
            }
            caught = invocation => caught.unwrap_or_else(|payload| {
                error!(panic = %panic_message(payload.as_ref()), "Tool panicked");
                Err(ToolError::Panicked(call.name.clone()))
            }),
        };
        Ok(outcome)
    }
}

/// Best-effort text of a panic payload, for logs only.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("<non-string panic payload>")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::{Value, json};

    use super::*;
    use crate::agent::validator::ToolCallValidator;
    use crate::callback::NoopRunHooks;
    use crate::message::Message;
    use crate::tool::Tool;

    #[derive(Debug, Deserialize)]
    struct AddArgs {
        a: i64,
        b: i64,
    }

    #[derive(Debug, Clone, Copy)]
    struct AddTool;

    #[async_trait]
    impl Tool for AddTool {
        const NAME: &'static str = "add";
        type Args = AddArgs;
        type Output = i64;
        type Error = ToolError;

        fn description(&self) -> String {
            "Add two integers".to_owned()
        }

        fn parameters_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {"a": {"type": "integer"}, "b": {"type": "integer"}},
                "required": ["a", "b"]
            })
        }

        async fn call(&self, args: AddArgs) -> Result<i64, ToolError> {
            Ok(args.a + args.b)
        }
    }

    #[derive(Debug, Clone, Copy)]
    struct PanicTool;

    #[async_trait]
    impl Tool for PanicTool {
        const NAME: &'static str = "explode";
        type Args = Value;
        type Output = Value;
        type Error = ToolError;

        fn description(&self) -> String {
            "Always panics".to_owned()
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        #[allow(clippy::panic)]
        async fn call(&self, _args: Value) -> Result<Value, ToolError> {
            panic!("boom");
        }
    }

    #[derive(Debug, Clone, Copy)]
    struct SlowTool;

    #[async_trait]
    impl Tool for SlowTool {
        const NAME: &'static str = "slow";
        type Args = Value;
        type Output = String;
        type Error = ToolError;

        fn description(&self) -> String {
            "Sleeps for a minute".to_owned()
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn call(&self, _args: Value) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("done".to_owned())
        }
    }

    #[derive(Default)]
    struct CountingHooks {
        starts: AtomicUsize,
        ends: AtomicUsize,
    }

    #[async_trait]
    impl RunHooks for CountingHooks {
        async fn on_tool_start(&self, _call: &ToolCallRequest) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_tool_end(&self, _result: &ToolCallResult) {
            self.ends.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tools() -> ToolSet {
        ToolSet::new().with(AddTool).with(PanicTool).with(SlowTool)
    }

    async fn run(
        tools: &ToolSet,
        hooks: &dyn RunHooks,
        tool_timeout: Option<Duration>,
        calls: Vec<ToolCallRequest>,
        deadline: Instant,
    ) -> Result<Vec<ToolCallResult>, DeadlineExceeded> {
        let message = Message::assistant_with_tool_calls("", calls);
        let validation = ToolCallValidator::new(tools.definitions()).validate(&message);
        ToolExecutor::new(tools, hooks, tool_timeout)
            .execute(&message.tool_calls, &validation, deadline)
            .await
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[tokio::test]
    async fn results_follow_request_order() {
        let tools = tools();
        let calls = vec![
            ToolCallRequest::new("c1", "add", json!({"a": 1, "b": 2})),
            ToolCallRequest::new("c2", "missing", json!({})),
            ToolCallRequest::new("c3", "add", json!({"a": 10, "b": 20})),
        ];
        let results = run(&tools, &NoopRunHooks, None, calls, far_deadline())
            .await
            .unwrap();

        let ids: Vec<_> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
        assert_eq!(results[0].content, "3");
        assert!(results[1].is_error);
        assert!(results[1].content.contains("not found"));
        assert_eq!(results[2].content, "30");
    }

    #[tokio::test]
    async fn rejected_calls_skip_the_tool() {
        let tools = tools();
        let hooks = CountingHooks::default();
        let calls = vec![
            ToolCallRequest::new("c1", "add", json!({"a": "one", "b": 2})),
            ToolCallRequest::new("c2", "add", json!({"a": 1, "b": 1})),
        ];
        let results = run(&tools, &hooks, None, calls, far_deadline())
            .await
            .unwrap();

        assert!(results[0].is_error);
        assert!(results[0].content.contains("Invalid arguments"));
        assert_eq!(results[1].content, "2");
        assert_eq!(hooks.starts.load(Ordering::SeqCst), 1);
        assert_eq!(hooks.ends.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panic_is_isolated() {
        let tools = tools();
        let calls = vec![
            ToolCallRequest::new("c1", "explode", json!({})),
            ToolCallRequest::new("c2", "add", json!({"a": 2, "b": 2})),
        ];
        let results = run(&tools, &NoopRunHooks, None, calls, far_deadline())
            .await
            .unwrap();

        assert!(results[0].is_error);
        assert!(results[0].content.contains("crashed"));
        assert!(!results[0].content.contains("boom"));
        assert_eq!(results[1].content, "4");
    }

    #[tokio::test(start_paused = true)]
    async fn per_call_timeout() {
        let tools = tools();
        let calls = vec![
            ToolCallRequest::new("c1", "slow", json!({})),
            ToolCallRequest::new("c2", "add", json!({"a": 0, "b": 5})),
        ];
        let results = run(
            &tools,
            &NoopRunHooks,
            Some(Duration::from_secs(1)),
            calls,
            far_deadline(),
        )
        .await
        .unwrap();

        assert!(results[0].is_error);
        assert!(results[0].content.contains("timed out"));
        assert_eq!(results[1].content, "5");
    }

    #[tokio::test(start_paused = true)]
    async fn run_deadline_abandons_the_turn() {
        let tools = tools();
        let hooks = CountingHooks::default();
        let calls = vec![ToolCallRequest::new("c1", "slow", json!({}))];
        let outcome = run(
            &tools,
            &hooks,
            None,
            calls,
            Instant::now() + Duration::from_secs(2),
        )
        .await;

        assert!(outcome.is_err());
        assert_eq!(hooks.ends.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn panic_message_downcasts() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }
}
