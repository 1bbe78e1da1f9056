//! The agent runtime for kbagent.
//!
//! The agent follows a **call → act → observe** cycle:
//!
//! 1. **Receive** a conversation from the caller
//! 2. **Augment** it with the agent prompt and retrieved knowledge
//! 3. **Call the model** through the [`ModelInvoker`](kbagent_core::ModelInvoker)
//! 4. **If tool calls**: execute them, append results, loop back to step 3
//! 5. **If text only**: return the accumulated output
//!
//! The loop continues until the model answers without tool calls, the turn
//! limit is reached, or the run is cancelled.

pub mod loop_runner;
pub mod orchestrator;
pub mod result;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use loop_runner::ToolLoop;
pub use orchestrator::Orchestrator;
pub use result::{InferenceResult, StopReason};
