//! Markdown chunking and tokenization.
//!
//! Text is first split at top-level headers (a newline followed by `# `),
//! then each section is cut into fixed, non-overlapping windows. Windows are
//! measured in `char`s so a multi-byte character is never split.

use kbagent_core::error::KnowledgeError;

use crate::document::Chunk;

/// Default window size in characters.
pub const DEFAULT_WINDOW: usize = 800;

const SECTION_BREAK: &str = "\n# ";

#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    window: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
        }
    }
}

impl Chunker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window(window: usize) -> Result<Self, KnowledgeError> {
        if window == 0 {
            return Err(KnowledgeError::InvalidWindow(window));
        }
        Ok(Self { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Split `text` into chunks owned by `doc_id`. Ordinals run from 0.
    pub fn chunk(&self, doc_id: &str, text: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        for section in split_sections(text) {
            for window in windows(section, self.window) {
                chunks.push(Chunk::new(doc_id, chunks.len(), window));
            }
        }
        chunks
    }
}

/// Sections start at a line beginning with `# `; the separating newline is dropped.
fn split_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;
    while let Some(pos) = rest.find(SECTION_BREAK) {
        sections.push(&rest[..pos]);
        // keep the "# " with the next section
        rest = &rest[pos + 1..];
    }
    sections.push(rest);
    sections
}

fn windows(section: &str, size: usize) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in section.char_indices() {
        if count == size {
            out.push(&section[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < section.len() {
        out.push(&section[start..]);
    }
    out
}

/// Lower-case, split on runs of anything outside `[a-z0-9]`, drop empties.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}
