//! Model invocation: the abstraction over LLM backends.
//!
//! The agent loop never sees vendor request shapes. A provider adapter
//! implements [`ModelInvoker`], translating the transcript and tool specs to
//! whatever its SDK wants and translating the reply back into a
//! [`ModelTurn`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::message::Message;
use crate::tool::{ToolCallRequest, ToolSpec};
use crate::usage::TokenUsage;

/// One model reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTurn {
    /// The assistant message (may have blank content when only tools were requested)
    pub message: Message,

    /// Tool invocations the model asked for, in the order it asked
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Token usage for this turn, if the provider reported any
    #[serde(default)]
    pub usage: TokenUsage,
}

impl ModelTurn {
    /// A plain text reply with no tool requests.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content),
            tool_calls: Vec::new(),
            usage: TokenUsage::default(),
        }
    }

    /// A reply requesting tools, with optional accompanying text.
    pub fn tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            message: Message::assistant(content),
            tool_calls,
            usage: TokenUsage::default(),
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }
}

/// The model-invocation callback driven by the agent loop.
///
/// Implementations may block on network I/O. Errors are fatal for the run;
/// retry policy belongs to the adapter or to whoever wraps the run.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    async fn invoke(
        &self,
        transcript: &[Message],
        tool_specs: &[ToolSpec],
    ) -> Result<ModelTurn, ProviderError>;
}
