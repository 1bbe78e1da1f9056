//! Context assembly: turns retrieved chunks into a prompt block.
//!
//! # Determinism
//!
//! The output depends only on the chunk texts and their order.

use kbagent_core::message::Message;

use crate::document::Chunk;

/// First line of every context block.
pub const CONTEXT_HEADER: &str = "### Retrieved Context (do not quote verbatim unless necessary)\n";

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    /// Header, then one `- ` bullet per chunk with its text flattened onto a
    /// single line. Ends with a newline.
    pub fn build_prompt_block(chunks: &[Chunk]) -> String {
        let lines: Vec<String> = chunks
            .iter()
            .map(|c| format!("- {}", c.text.replace('\n', " ").trim()))
            .collect();
        format!("{CONTEXT_HEADER}{}\n", lines.join("\n"))
    }

    /// The block as a system message, or `None` when nothing was retrieved.
    pub fn system_message(chunks: &[Chunk]) -> Option<Message> {
        if chunks.is_empty() {
            return None;
        }
        Some(Message::system(Self::build_prompt_block(chunks)))
    }
}
