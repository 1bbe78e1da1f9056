//! Thread-safe telemetry engine: collects spans per run and keeps
//! running counters.

use std::sync::{PoisonError, RwLock};

use kbagent_core::hooks::{Instrumentation, SpanHandle, SpanKind, SpanOutcome};
use tracing::debug;

use crate::model::{Span, Trace, UsageSnapshot};

const MAX_TRACES: usize = 5_000;

/// Records spans reported through [`Instrumentation`].
///
/// Traces are created lazily, keyed by run id, and closed when the run's own
/// span ends. Once `max_traces` is reached the oldest finished traces are
/// dropped in batches of a tenth.
pub struct TelemetryEngine {
    /// All retained traces (most recent last).
    traces: RwLock<Vec<Trace>>,
    totals: RwLock<UsageSnapshot>,
    max_traces: usize,
}

impl Default for TelemetryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryEngine {
    pub fn new() -> Self {
        Self::with_max_traces(MAX_TRACES)
    }

    pub fn with_max_traces(max_traces: usize) -> Self {
        Self {
            traces: RwLock::new(Vec::new()),
            totals: RwLock::new(UsageSnapshot::default()),
            max_traces: max_traces.max(1),
        }
    }

    // ── Trace management ──────────────────────────────────────────────

    fn ensure_trace(&self, run_id: &str) {
        let mut traces = self.traces.write().unwrap_or_else(PoisonError::into_inner);
        if traces.iter().rev().any(|t| t.run_id == run_id) {
            return;
        }

        if traces.len() >= self.max_traces {
            let drain_count = (self.max_traces / 10).max(1);
            let mut removed = 0;
            traces.retain(|t| {
                if removed >= drain_count || !t.is_finished() {
                    return true;
                }
                removed += 1;
                false
            });
        }

        traces.push(Trace::new(run_id));
    }

    /// Record a finished span and update the counters.
    pub fn record_span(&self, span: Span) {
        {
            let mut totals = self.totals.write().unwrap_or_else(PoisonError::into_inner);
            match span.kind {
                SpanKind::Run => {}
                SpanKind::Retrieval => totals.retrievals += 1,
                SpanKind::ModelCall => {
                    totals.model_calls += 1;
                    if !span.success {
                        totals.model_failures += 1;
                    }
                    totals.usage = totals.usage.merge(span.usage);
                }
                SpanKind::ToolExecution => {
                    totals.tool_calls += 1;
                    if !span.success {
                        totals.tool_failures += 1;
                    }
                }
            }
        }

        self.ensure_trace(&span.run_id);
        let mut traces = self.traces.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(trace) = traces.iter_mut().rev().find(|t| t.run_id == span.run_id) {
            debug!(run_id = %span.run_id, kind = %span.kind, label = %span.label, "Span recorded");
            trace.add_span(span);
        }
    }

    // ── Queries ───────────────────────────────────────────────────────

    pub fn get_trace(&self, run_id: &str) -> Option<Trace> {
        let traces = self.traces.read().unwrap_or_else(PoisonError::into_inner);
        traces.iter().rev().find(|t| t.run_id == run_id).cloned()
    }

    /// The most recent traces, newest first.
    pub fn recent_traces(&self, limit: usize) -> Vec<Trace> {
        let traces = self.traces.read().unwrap_or_else(PoisonError::into_inner);
        traces.iter().rev().take(limit).cloned().collect()
    }

    pub fn trace_count(&self) -> usize {
        self.traces.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn usage_snapshot(&self) -> UsageSnapshot {
        let mut snapshot = self.totals.read().unwrap_or_else(PoisonError::into_inner).clone();
        snapshot.trace_count = self.trace_count() as u64;
        snapshot
    }

    /// Drop every trace and reset the counters.
    pub fn reset(&self) {
        self.traces.write().unwrap_or_else(PoisonError::into_inner).clear();
        *self.totals.write().unwrap_or_else(PoisonError::into_inner) = UsageSnapshot::default();
    }
}

impl Instrumentation for TelemetryEngine {
    fn on_begin(&self, run_id: &str, kind: SpanKind, label: &str) -> SpanHandle {
        if kind == SpanKind::Run {
            self.totals.write().unwrap_or_else(PoisonError::into_inner).prompts += 1;
            self.ensure_trace(run_id);
        }
        SpanHandle::new(run_id, kind, label)
    }

    fn on_end(&self, handle: SpanHandle, outcome: SpanOutcome) {
        self.record_span(Span::finish(handle, outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbagent_core::usage::TokenUsage;
    use std::sync::Arc;

    fn record(engine: &TelemetryEngine, run_id: &str, kind: SpanKind, outcome: SpanOutcome) {
        let handle = engine.on_begin(run_id, kind, "label");
        engine.on_end(handle, outcome);
    }

    #[test]
    fn run_begin_counts_prompt_and_opens_trace() {
        let engine = TelemetryEngine::new();
        let run = engine.on_begin("run-1", SpanKind::Run, "run");
        assert_eq!(engine.usage_snapshot().prompts, 1);
        let trace = engine.get_trace("run-1").unwrap();
        assert!(!trace.is_finished());

        engine.on_end(run, SpanOutcome::ok());
        assert!(engine.get_trace("run-1").unwrap().is_finished());
    }

    #[test]
    fn counters_follow_span_kinds() {
        let engine = TelemetryEngine::new();
        record(&engine, "r", SpanKind::Retrieval, SpanOutcome::ok());
        record(
            &engine,
            "r",
            SpanKind::ModelCall,
            SpanOutcome::ok().with_usage(TokenUsage::counted(10, 4)),
        );
        record(&engine, "r", SpanKind::ModelCall, SpanOutcome::failed("503"));
        record(&engine, "r", SpanKind::ToolExecution, SpanOutcome::ok());
        record(&engine, "r", SpanKind::ToolExecution, SpanOutcome::failed("Unknown tool: x"));

        let snap = engine.usage_snapshot();
        assert_eq!(snap.prompts, 0);
        assert_eq!(snap.retrievals, 1);
        assert_eq!(snap.model_calls, 2);
        assert_eq!(snap.model_failures, 1);
        assert_eq!(snap.tool_calls, 2);
        assert_eq!(snap.tool_failures, 1);
        assert_eq!(snap.usage, TokenUsage::counted(10, 4));
        assert_eq!(snap.trace_count, 1);
    }

    #[test]
    fn spans_land_in_their_own_trace() {
        let engine = TelemetryEngine::new();
        record(&engine, "a", SpanKind::ModelCall, SpanOutcome::ok());
        record(&engine, "b", SpanKind::ToolExecution, SpanOutcome::ok());
        record(&engine, "a", SpanKind::ToolExecution, SpanOutcome::ok());

        let a = engine.get_trace("a").unwrap();
        assert_eq!(a.spans.len(), 2);
        assert_eq!(engine.get_trace("b").unwrap().spans.len(), 1);
        assert!(engine.get_trace("c").is_none());

        let recent = engine.recent_traces(1);
        assert_eq!(recent[0].run_id, "b");
    }

    #[test]
    fn prunes_oldest_finished_traces() {
        let engine = TelemetryEngine::with_max_traces(3);
        for id in ["r1", "r2", "r3"] {
            record(&engine, id, SpanKind::Run, SpanOutcome::ok());
        }
        assert_eq!(engine.trace_count(), 3);

        record(&engine, "r4", SpanKind::Run, SpanOutcome::ok());
        assert_eq!(engine.trace_count(), 3);
        assert!(engine.get_trace("r1").is_none());
        assert!(engine.get_trace("r4").is_some());
    }

    #[test]
    fn open_traces_survive_pruning() {
        let engine = TelemetryEngine::with_max_traces(1);
        let _open = engine.on_begin("open", SpanKind::Run, "run");
        record(&engine, "next", SpanKind::ModelCall, SpanOutcome::ok());
        assert!(engine.get_trace("open").is_some());
        assert!(engine.get_trace("next").is_some());
    }

    #[test]
    fn reset_clears_everything() {
        let engine = TelemetryEngine::new();
        record(&engine, "r", SpanKind::Run, SpanOutcome::ok());
        engine.reset();
        assert_eq!(engine.trace_count(), 0);
        assert_eq!(engine.usage_snapshot(), UsageSnapshot::default());
    }

    #[tokio::test]
    async fn concurrent_recording() {
        let engine = Arc::new(TelemetryEngine::new());
        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                let run_id = format!("run-{i}");
                for _ in 0..10 {
                    record(&engine, &run_id, SpanKind::ToolExecution, SpanOutcome::ok());
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let snap = engine.usage_snapshot();
        assert_eq!(snap.tool_calls, 80);
        assert_eq!(snap.trace_count, 8);
    }
}
