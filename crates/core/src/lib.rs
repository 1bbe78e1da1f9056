//! # kbagent core
//!
//! Domain types, traits, and error definitions shared by every kbagent crate.
//! Nothing here talks to the network or the filesystem: the model provider,
//! the tools, and the knowledge base are all reached through the traits
//! defined in this crate.
//!
//! ## Layout
//!
//! - [`message`]: transcript messages and the tool calls they carry
//! - [`tool`]: the [`Tool`] capability, [`ToolSpec`] metadata, call/result types
//! - [`provider`]: the [`ModelInvoker`] callback the agent loop drives
//! - [`usage`]: null-safe token accounting
//! - [`guardrail`]: the pre-run request check
//! - [`hooks`]: begin/end instrumentation callbacks

pub mod error;
pub mod guardrail;
pub mod hooks;
pub mod message;
pub mod provider;
pub mod tool;
pub mod usage;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, KnowledgeError, ProviderError, ToolError};
pub use guardrail::{AllowAll, DenyKeywordGuardrail, Guardrail, Rejection};
pub use hooks::{Instrumentation, NoopInstrumentation, SpanHandle, SpanKind, SpanOutcome};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{ModelInvoker, ModelTurn};
pub use tool::{Parameter, Tool, ToolArgs, ToolCallRequest, ToolExecutionResult, ToolExecutor, ToolSpec};
pub use usage::TokenUsage;
