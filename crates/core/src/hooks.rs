//! Instrumentation hooks.
//!
//! Components call `on_begin` / `on_end` at their boundaries (a whole run,
//! the retrieval step, each model call, each tool call). What happens with
//! those callbacks is up to the implementation: the default does nothing,
//! `kbagent-telemetry` records spans and counters.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::usage::TokenUsage;

/// The kind of work a span represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    /// One full orchestrator run.
    Run,
    /// Knowledge-base lookup for auto-context.
    Retrieval,
    /// One model invocation.
    ModelCall,
    /// One tool execution.
    ToolExecution,
}

impl std::fmt::Display for SpanKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Run => write!(f, "run"),
            Self::Retrieval => write!(f, "retrieval"),
            Self::ModelCall => write!(f, "model_call"),
            Self::ToolExecution => write!(f, "tool_execution"),
        }
    }
}

/// An open span, returned by `on_begin` and handed back to `on_end`.
#[derive(Debug, Clone)]
pub struct SpanHandle {
    pub id: String,
    pub run_id: String,
    pub kind: SpanKind,
    pub label: String,
    pub started: Instant,
}

impl SpanHandle {
    pub fn new(run_id: &str, kind: SpanKind, label: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            kind,
            label: label.to_string(),
            started: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// How a span finished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanOutcome {
    pub error: Option<String>,
    pub usage: TokenUsage,
}

impl SpanOutcome {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            usage: TokenUsage::default(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Begin/end callbacks at component boundaries.
pub trait Instrumentation: Send + Sync {
    fn on_begin(&self, run_id: &str, kind: SpanKind, label: &str) -> SpanHandle {
        SpanHandle::new(run_id, kind, label)
    }

    fn on_end(&self, handle: SpanHandle, outcome: SpanOutcome);
}

/// Discards every span.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopInstrumentation;

impl Instrumentation for NoopInstrumentation {
    fn on_end(&self, _handle: SpanHandle, _outcome: SpanOutcome) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_kind_display() {
        assert_eq!(SpanKind::ToolExecution.to_string(), "tool_execution");
        assert_eq!(SpanKind::ModelCall.to_string(), "model_call");
    }

    #[test]
    fn outcome_success_flag() {
        assert!(SpanOutcome::ok().is_success());
        assert!(!SpanOutcome::failed("boom").is_success());
    }

    #[test]
    fn noop_hands_out_distinct_spans() {
        let hooks = NoopInstrumentation;
        let a = hooks.on_begin("run-1", SpanKind::Run, "run");
        let b = hooks.on_begin("run-1", SpanKind::ModelCall, "scripted");
        assert_ne!(a.id, b.id);
        assert_eq!(b.run_id, "run-1");
        hooks.on_end(a, SpanOutcome::ok());
    }
}
