//! Error types for the kbagent domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`AgentError`] is what a
//! caller of the orchestration loop sees.

use thiserror::Error;

/// Errors raised by the model-invocation callback.
///
/// Fatal for the run that observed them: the loop does not retry.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// Errors raised by tools and the tool registry.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Tool execution failed: {tool_name}: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("tool '{tool_name}' timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool spec unavailable: {0}")]
    Spec(String),
}

/// Errors raised by the knowledge base (chunking, ingestion).
#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("Invalid chunk window: {0}")]
    InvalidWindow(usize),

    #[error("Failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Malformed document {path}: {reason}")]
    Malformed { path: String, reason: String },
}

/// Errors that end an agent run.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Model invocation failed: {0}")]
    Model(#[from] ProviderError),

    #[error("Request rejected by guardrails: {0}")]
    Rejected(String),

    #[error("Run cancelled after {turns} turns")]
    Cancelled { turns: u32 },

    #[error("Configuration error: {0}")]
    Config(String),
}
