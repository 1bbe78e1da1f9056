//! Run tracing and usage counters for kbagent.
//!
//! [`TelemetryEngine`] plugs into the agent as an
//! [`Instrumentation`](kbagent_core::hooks::Instrumentation) sink. Every
//! finished span lands in the trace of its run, and process-wide counters
//! (prompts, model calls, tool calls, tool failures, token usage) are kept
//! alongside.

pub mod engine;
pub mod model;

pub use engine::TelemetryEngine;
pub use model::{Span, Trace, UsageSnapshot};
