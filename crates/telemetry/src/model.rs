//! Data model for run traces, spans and usage snapshots.

use chrono::{DateTime, Utc};
use kbagent_core::hooks::{SpanHandle, SpanKind, SpanOutcome};
use kbagent_core::usage::TokenUsage;
use serde::{Deserialize, Serialize};

// ── Span ──────────────────────────────────────────────────────────────────

/// A single finished unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Span {
    pub id: String,
    pub run_id: String,
    pub kind: SpanKind,
    /// Tool name, model name, or query text
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl Span {
    /// Close an open handle with its outcome.
    pub fn finish(handle: SpanHandle, outcome: SpanOutcome) -> Self {
        let elapsed = handle.elapsed();
        let ended_at = Utc::now();
        let started_at = chrono::Duration::from_std(elapsed)
            .map(|d| ended_at - d)
            .unwrap_or(ended_at);
        Self {
            id: handle.id,
            run_id: handle.run_id,
            kind: handle.kind,
            label: handle.label,
            started_at,
            ended_at,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            success: outcome.is_success(),
            error: outcome.error,
            usage: outcome.usage,
        }
    }
}

// ── Trace ─────────────────────────────────────────────────────────────────

/// Every span recorded for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub run_id: String,
    pub spans: Vec<Span>,
    pub started_at: DateTime<Utc>,
    /// Set once the run's own span closes.
    pub ended_at: Option<DateTime<Utc>>,
}

impl Trace {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            spans: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn add_span(&mut self, span: Span) {
        if span.kind == SpanKind::Run {
            self.ended_at = Some(span.ended_at);
        }
        self.spans.push(span);
    }

    pub fn is_finished(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Usage summed over model-call spans.
    pub fn total_usage(&self) -> TokenUsage {
        self.spans
            .iter()
            .filter(|s| s.kind == SpanKind::ModelCall)
            .fold(TokenUsage::default(), |acc, s| acc.merge(s.usage))
    }

    /// Wall time of the run span, or the sum of child spans while it is open.
    pub fn total_duration_ms(&self) -> u64 {
        self.spans
            .iter()
            .find(|s| s.kind == SpanKind::Run)
            .map(|s| s.duration_ms)
            .unwrap_or_else(|| self.spans.iter().map(|s| s.duration_ms).sum())
    }

    pub fn count(&self, kind: SpanKind) -> usize {
        self.spans.iter().filter(|s| s.kind == kind).count()
    }

    pub fn model_call_count(&self) -> usize {
        self.count(SpanKind::ModelCall)
    }

    pub fn tool_execution_count(&self) -> usize {
        self.count(SpanKind::ToolExecution)
    }

    pub fn failed_spans(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|s| !s.success)
    }
}

// ── Aggregated view ───────────────────────────────────────────────────────

/// Process-wide counters since the engine was created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Runs started
    pub prompts: u64,
    pub model_calls: u64,
    pub model_failures: u64,
    pub tool_calls: u64,
    pub tool_failures: u64,
    pub retrievals: u64,
    pub usage: TokenUsage,
    /// Traces currently retained
    pub trace_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(kind: SpanKind, outcome: SpanOutcome) -> Span {
        Span::finish(SpanHandle::new("run-1", kind, "x"), outcome)
    }

    #[test]
    fn finish_copies_handle_and_outcome() {
        let s = span(SpanKind::ToolExecution, SpanOutcome::failed("boom"));
        assert_eq!(s.run_id, "run-1");
        assert_eq!(s.kind, SpanKind::ToolExecution);
        assert!(!s.success);
        assert_eq!(s.error.as_deref(), Some("boom"));
        assert!(s.started_at <= s.ended_at);
    }

    #[test]
    fn run_span_closes_trace() {
        let mut trace = Trace::new("run-1");
        trace.add_span(span(SpanKind::ModelCall, SpanOutcome::ok()));
        assert!(!trace.is_finished());
        trace.add_span(span(SpanKind::Run, SpanOutcome::ok()));
        assert!(trace.is_finished());
    }

    #[test]
    fn trace_counts_and_usage() {
        let mut trace = Trace::new("run-1");
        trace.add_span(span(
            SpanKind::ModelCall,
            SpanOutcome::ok().with_usage(TokenUsage::counted(3, 2)),
        ));
        trace.add_span(span(
            SpanKind::ModelCall,
            SpanOutcome::ok().with_usage(TokenUsage::new(Some(4), None, None)),
        ));
        trace.add_span(span(SpanKind::ToolExecution, SpanOutcome::failed("x")));

        assert_eq!(trace.model_call_count(), 2);
        assert_eq!(trace.tool_execution_count(), 1);
        assert_eq!(trace.failed_spans().count(), 1);
        assert_eq!(trace.total_usage(), TokenUsage::new(Some(7), Some(2), Some(5)));
    }

    #[test]
    fn span_serializes_kind_in_snake_case() {
        let s = span(SpanKind::ModelCall, SpanOutcome::ok());
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["kind"], "model_call");
        assert!(json.get("error").is_none());
    }
}
