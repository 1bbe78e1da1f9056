//! Knowledge base for kbagent.
//!
//! Documents are split into chunks, indexed by term frequency, and queried
//! for context snippets that get prepended to an agent run.

pub mod chunker;
pub mod context;
pub mod document;
pub mod index;
pub mod ingest;

pub use chunker::{Chunker, DEFAULT_WINDOW, tokenize};
pub use context::{CONTEXT_HEADER, ContextAssembler};
pub use document::{Chunk, Document, SourceKind};
pub use index::{IndexStats, InventoryEntry, KnowledgeIndex};
pub use ingest::{AGENT_PROMPT_ID, FoundationIngester};
