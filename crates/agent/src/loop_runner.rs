//! The tool-calling loop.
//!
//! One run: call the model, append its reply, execute any tools it asked
//! for, append their results, repeat. The run ends when the model stops
//! asking for tools, when the turn limit is hit, or when it is cancelled.
//!
//! Tool failures never end a run. Whatever goes wrong inside a tool (bad
//! arguments, unknown name, timeout, an error from the tool itself) comes
//! back to the model as an `ERROR: ...` tool result. Model errors do end it.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kbagent_core::error::{AgentError, ToolError};
use kbagent_core::guardrail::{AllowAll, Guardrail};
use kbagent_core::hooks::{Instrumentation, NoopInstrumentation, SpanKind, SpanOutcome};
use kbagent_core::message::{Message, Role};
use kbagent_core::provider::{ModelInvoker, ModelTurn};
use kbagent_core::tool::{ToolCallRequest, ToolExecutionResult, ToolExecutor, ToolSpec};
use kbagent_core::usage::TokenUsage;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::result::{InferenceResult, StopReason};

pub const DEFAULT_MAX_TURNS: u32 = 8;
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_PARALLEL_TOOLS: usize = 4;

/// Drives one model through tool-calling turns.
///
/// Holds only policy; each run owns its own transcript, so one `ToolLoop`
/// can serve concurrent runs.
#[derive(Clone)]
pub struct ToolLoop {
    /// Maximum model invocations per run
    max_turns: u32,

    /// Bound on each tool execution
    tool_timeout: Duration,

    /// Tool calls of one turn executing at the same time
    max_parallel_tools: usize,

    /// Cancelled runs return an error instead of partial output
    discard_on_cancel: bool,

    /// Checked once against the first user message
    guardrail: Arc<dyn Guardrail>,

    hooks: Arc<dyn Instrumentation>,
}

impl Default for ToolLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolLoop {
    pub fn new() -> Self {
        Self {
            max_turns: DEFAULT_MAX_TURNS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            max_parallel_tools: DEFAULT_MAX_PARALLEL_TOOLS,
            discard_on_cancel: false,
            guardrail: Arc::new(AllowAll),
            hooks: Arc::new(NoopInstrumentation),
        }
    }

    /// Set the maximum number of model turns.
    pub fn with_max_turns(mut self, max: u32) -> Self {
        self.max_turns = max;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_max_parallel_tools(mut self, n: usize) -> Self {
        self.max_parallel_tools = n.max(1);
        self
    }

    pub fn with_discard_on_cancel(mut self, discard: bool) -> Self {
        self.discard_on_cancel = discard;
        self
    }

    pub fn with_guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.guardrail = guardrail;
        self
    }

    pub fn with_instrumentation(mut self, hooks: Arc<dyn Instrumentation>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    /// Run the loop under a fresh run id.
    pub async fn run(
        &self,
        initial_messages: Vec<Message>,
        tool_specs: &[ToolSpec],
        executor: &dyn ToolExecutor,
        model: &dyn ModelInvoker,
        cancel: &CancellationToken,
    ) -> Result<InferenceResult, AgentError> {
        let run_id = Uuid::new_v4().to_string();
        self.run_as(&run_id, initial_messages, tool_specs, executor, model, cancel)
            .await
    }

    /// Run the loop, tagging instrumentation with `run_id`.
    pub async fn run_as(
        &self,
        run_id: &str,
        initial_messages: Vec<Message>,
        tool_specs: &[ToolSpec],
        executor: &dyn ToolExecutor,
        model: &dyn ModelInvoker,
        cancel: &CancellationToken,
    ) -> Result<InferenceResult, AgentError> {
        if let Some(first_user) = initial_messages.iter().find(|m| m.role == Role::User) {
            if let Err(rejection) = self.guardrail.check(&first_user.content) {
                warn!(run_id, reason = %rejection, "Run rejected by guardrail");
                return Err(AgentError::Rejected(rejection.reason));
            }
        }

        info!(
            run_id,
            model = model.name(),
            messages = initial_messages.len(),
            tools = tool_specs.len(),
            max_turns = self.max_turns,
            "Starting tool loop"
        );

        let mut transcript = initial_messages;
        let mut output: Vec<String> = Vec::new();
        let mut usage = TokenUsage::default();
        let mut turns: u32 = 0;

        let stop_reason = loop {
            if turns >= self.max_turns {
                warn!(run_id, turns, "Max turns reached with tool requests pending");
                break StopReason::MaxTurns;
            }
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }

            debug!(run_id, turn = turns, "Invoking model");
            let span = self.hooks.on_begin(run_id, SpanKind::ModelCall, model.name());
            let invoked = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                r = model.invoke(&transcript, tool_specs) => Some(r),
            };
            let Some(invoked) = invoked else {
                self.hooks.on_end(span, SpanOutcome::failed("cancelled"));
                break StopReason::Cancelled;
            };
            let ModelTurn {
                mut message,
                tool_calls,
                usage: turn_usage,
            } = match invoked {
                Ok(turn) => {
                    self.hooks
                        .on_end(span, SpanOutcome::ok().with_usage(turn.usage));
                    turn
                }
                Err(e) => {
                    self.hooks.on_end(span, SpanOutcome::failed(e.to_string()));
                    warn!(run_id, turn = turns, error = %e, "Model invocation failed");
                    return Err(AgentError::Model(e));
                }
            };
            turns += 1;

            if message.tool_calls.is_empty() && !tool_calls.is_empty() {
                message.tool_calls = tool_calls.iter().map(Into::into).collect();
            }
            if !message.is_blank() {
                output.push(message.content.clone());
            }
            usage += turn_usage;
            transcript.push(message);

            if tool_calls.is_empty() {
                break StopReason::Completed;
            }

            debug!(run_id, turn = turns, tool_count = tool_calls.len(), "Executing tool calls");
            let executed = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                results = self.execute_all(run_id, &tool_calls, executor) => Some(results),
            };
            let Some(results) = executed else {
                break StopReason::Cancelled;
            };
            transcript.extend(results.iter().map(ToolExecutionResult::to_message));
        };

        if stop_reason == StopReason::Cancelled && self.discard_on_cancel {
            info!(run_id, turns, "Run cancelled, discarding partial output");
            return Err(AgentError::Cancelled { turns });
        }

        info!(run_id, turns, stop_reason = %stop_reason, %usage, "Tool loop finished");

        Ok(InferenceResult {
            run_id: run_id.to_string(),
            text: output.join("\n"),
            usage_summary: (!usage.is_empty()).then(|| usage.to_string()),
            usage,
            turns,
            transcript,
            stop_reason,
        })
    }

    /// Execute every request of a turn. At most `max_parallel_tools` run at
    /// once; results come back in request order.
    async fn execute_all(
        &self,
        run_id: &str,
        requests: &[ToolCallRequest],
        executor: &dyn ToolExecutor,
    ) -> Vec<ToolExecutionResult> {
        futures::stream::iter(requests)
            .map(|request| self.execute_one(run_id, request, executor))
            .buffered(self.max_parallel_tools)
            .collect()
            .await
    }

    async fn execute_one(
        &self,
        run_id: &str,
        request: &ToolCallRequest,
        executor: &dyn ToolExecutor,
    ) -> ToolExecutionResult {
        let span = self
            .hooks
            .on_begin(run_id, SpanKind::ToolExecution, &request.tool_name);

        let outcome = match request.parse_arguments() {
            Ok(args) => {
                match tokio::time::timeout(
                    self.tool_timeout,
                    executor.execute(&request.tool_name, args),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(ToolError::Timeout {
                        tool_name: request.tool_name.clone(),
                        timeout_secs: self.tool_timeout.as_secs(),
                    }),
                }
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(text) => {
                debug!(run_id, tool = %request.tool_name, call_id = %request.id, "Tool succeeded");
                self.hooks.on_end(span, SpanOutcome::ok());
                ToolExecutionResult::success(request, text)
            }
            Err(e) => {
                warn!(run_id, tool = %request.tool_name, call_id = %request.id, error = %e, "Tool execution failed");
                self.hooks.on_end(span, SpanOutcome::failed(e.to_string()));
                ToolExecutionResult::failure(request, e)
            }
        }
    }
}
