//! What a run hands back to its caller.

use kbagent_core::message::Message;
use kbagent_core::usage::TokenUsage;
use serde::{Deserialize, Serialize};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model answered without requesting tools.
    Completed,
    /// The turn limit was reached while the model still wanted tools.
    MaxTurns,
    /// The run was cancelled; output is whatever accumulated so far.
    Cancelled,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::MaxTurns => write!(f, "max_turns"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResult {
    pub run_id: String,

    /// Non-blank assistant texts of every turn, newline-joined
    pub text: String,

    pub usage: TokenUsage,

    /// Human-readable usage line, absent when no counter was reported
    pub usage_summary: Option<String>,

    /// Model invocations performed
    pub turns: u32,

    /// The full transcript, including the caller's initial messages
    pub transcript: Vec<Message>,

    pub stop_reason: StopReason,
}

impl InferenceResult {
    pub fn is_complete(&self) -> bool {
        self.stop_reason == StopReason::Completed
    }

    /// Tool-result messages in transcript order.
    pub fn tool_results(&self) -> impl Iterator<Item = &Message> {
        self.transcript.iter().filter(|m| m.tool_call_id.is_some())
    }
}
