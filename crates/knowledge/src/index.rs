//! In-memory term-frequency retrieval index.
//!
//! The whole index state sits behind an `Arc` snapshot. Readers take a clone
//! of the `Arc` under a momentary lock and score without holding it; writers
//! go through `Arc::make_mut`, so a reader never sees half of an insertion.
//!
//! Documents, chunks and per-term postings are themselves behind `Arc`s. When
//! a writer has to copy a snapshot that a reader still holds, only those
//! pointers are copied, and a posting list is cloned only when a write
//! touches its term.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tracing::{debug, warn};

use crate::chunker::tokenize;
use crate::document::{Chunk, Document, SourceKind};

#[derive(Debug, Clone, Default)]
struct IndexState {
    documents: HashMap<String, Arc<Document>>,
    /// doc id -> ids of its chunks, in ordinal order
    doc_chunks: HashMap<String, Vec<String>>,
    chunks: HashMap<String, Arc<IndexedChunk>>,
    /// term -> chunk id -> term frequency
    postings: HashMap<String, Arc<HashMap<String, u32>>>,
    /// term -> number of chunks containing it
    doc_freq: HashMap<String, u32>,
    total_chunks: usize,
}

#[derive(Debug)]
struct IndexedChunk {
    chunk: Chunk,
    term_freq: HashMap<String, u32>,
}

impl IndexState {
    fn insert_chunk(&mut self, chunk: Chunk) {
        let mut term_freq: HashMap<String, u32> = HashMap::new();
        for token in tokenize(&chunk.text) {
            *term_freq.entry(token).or_insert(0) += 1;
        }
        for (term, tf) in &term_freq {
            *self.doc_freq.entry(term.clone()).or_insert(0) += 1;
            Arc::make_mut(self.postings.entry(term.clone()).or_default())
                .insert(chunk.chunk_id.clone(), *tf);
        }
        self.total_chunks += 1;
        self.chunks
            .insert(chunk.chunk_id.clone(), Arc::new(IndexedChunk { chunk, term_freq }));
    }

    fn retract_document(&mut self, doc_id: &str) {
        self.documents.remove(doc_id);
        let Some(chunk_ids) = self.doc_chunks.remove(doc_id) else {
            return;
        };
        for chunk_id in chunk_ids {
            let Some(indexed) = self.chunks.remove(&chunk_id) else {
                continue;
            };
            for term in indexed.term_freq.keys() {
                if let Some(df) = self.doc_freq.get_mut(term) {
                    *df = df.saturating_sub(1);
                    if *df == 0 {
                        self.doc_freq.remove(term);
                    }
                }
                if let Some(posting) = self.postings.get_mut(term) {
                    let posting = Arc::make_mut(posting);
                    posting.remove(&chunk_id);
                    if posting.is_empty() {
                        self.postings.remove(term);
                    }
                }
            }
            self.total_chunks = self.total_chunks.saturating_sub(1);
        }
    }

    /// Replace `doc` and its chunks. Chunk ids are always derived from the
    /// owning document and the chunk's position, so one document can never
    /// claim (or clobber) another document's chunk.
    fn put_document(&mut self, doc: Document, chunks: Vec<Chunk>) -> (String, bool) {
        let doc_id = doc.id.clone();
        let replaced = self.documents.contains_key(&doc_id);
        self.retract_document(&doc_id);

        let mut chunk_ids = Vec::with_capacity(chunks.len());
        for (ordinal, chunk) in chunks.into_iter().enumerate() {
            if chunk.parent_doc_id != doc_id || chunk.ordinal != ordinal {
                warn!(
                    doc_id = %doc_id,
                    chunk_id = %chunk.chunk_id,
                    ordinal,
                    "Chunk does not belong at this position, re-keying"
                );
            }
            let chunk = Chunk::new(&doc_id, ordinal, chunk.text);
            chunk_ids.push(chunk.chunk_id.clone());
            self.insert_chunk(chunk);
        }
        self.doc_chunks.insert(doc_id.clone(), chunk_ids);
        self.documents.insert(doc_id.clone(), Arc::new(doc));
        (doc_id, replaced)
    }
}

/// Counts describing the index contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub documents: usize,
    pub chunks: usize,
    pub terms: usize,
}

/// One line of the index inventory: a document without its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InventoryEntry {
    pub id: String,
    pub title: String,
    pub source_kind: SourceKind,
}

/// Thread-safe knowledge index shared by the orchestrator and tools.
#[derive(Debug, Default)]
pub struct KnowledgeIndex {
    state: RwLock<Arc<IndexState>>,
}

impl KnowledgeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn snapshot(&self) -> Arc<IndexState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Index a document with its chunks. Re-adding an id replaces the
    /// previous version and its postings.
    ///
    /// Chunks are keyed `{doc.id}:{position}` whatever ids they arrive with.
    pub fn add(&self, doc: Document, chunks: Vec<Chunk>) -> String {
        let chunk_count = chunks.len();
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let (doc_id, replaced) = Arc::make_mut(&mut guard).put_document(doc, chunks);
        debug!(doc_id = %doc_id, chunks = chunk_count, replaced, "Indexed document");
        doc_id
    }

    /// Index many documents under a single write, so a snapshot held by a
    /// concurrent reader is copied at most once. Returns the ids in order.
    pub fn add_batch<I>(&self, entries: I) -> Vec<String>
    where
        I: IntoIterator<Item = (Document, Vec<Chunk>)>,
    {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let state = Arc::make_mut(&mut guard);
        let ids: Vec<String> = entries
            .into_iter()
            .map(|(doc, chunks)| state.put_document(doc, chunks).0)
            .collect();
        debug!(documents = ids.len(), "Indexed document batch");
        ids
    }

    pub fn get(&self, doc_id: &str) -> Option<Document> {
        self.snapshot().documents.get(doc_id).map(|d| Document::clone(d))
    }

    /// Every document's id, title and kind, sorted by id.
    pub fn inventory(&self) -> Vec<InventoryEntry> {
        let state = self.snapshot();
        let mut entries: Vec<InventoryEntry> = state
            .documents
            .values()
            .map(|d| InventoryEntry {
                id: d.id.clone(),
                title: d.title.clone(),
                source_kind: d.source_kind,
            })
            .collect();
        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries
    }

    /// Top `top_k` chunks for `query`, highest score first.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<Chunk> {
        self.search_scored(query, top_k)
            .into_iter()
            .map(|(chunk, _)| chunk)
            .collect()
    }

    /// Like [`search`](Self::search), with the score of each chunk.
    ///
    /// `score = Σ tf(t, chunk) · ln((1 + total_chunks) / df(t))` over the
    /// query's tokens. Chunks scoring zero are dropped; ties go to the
    /// smaller chunk id.
    pub fn search_scored(&self, query: &str, top_k: usize) -> Vec<(Chunk, f64)> {
        let terms = tokenize(query);
        if terms.is_empty() || top_k == 0 {
            return Vec::new();
        }

        let state = self.snapshot();
        let total = (1 + state.total_chunks) as f64;

        let mut scores: HashMap<&str, f64> = HashMap::new();
        for term in &terms {
            let Some(posting) = state.postings.get(term) else {
                continue;
            };
            let df = state.doc_freq.get(term).copied().unwrap_or(1).max(1);
            let idf = (total / f64::from(df)).ln();
            for (chunk_id, tf) in posting.iter() {
                *scores.entry(chunk_id.as_str()).or_insert(0.0) += f64::from(*tf) * idf;
            }
        }

        let mut ranked: Vec<(&str, f64)> = scores.into_iter().filter(|(_, s)| *s > 0.0).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(top_k);

        let results: Vec<(Chunk, f64)> = ranked
            .into_iter()
            .filter_map(|(id, score)| state.chunks.get(id).map(|c| (c.chunk.clone(), score)))
            .collect();

        debug!(query_terms = terms.len(), hits = results.len(), "Index search");
        results
    }

    /// Remove everything.
    pub fn clear(&self) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(IndexState::default());
    }

    /// Number of documents.
    pub fn size(&self) -> usize {
        self.snapshot().documents.len()
    }

    pub fn stats(&self) -> IndexStats {
        let state = self.snapshot();
        IndexStats {
            documents: state.documents.len(),
            chunks: state.total_chunks,
            terms: state.doc_freq.len(),
        }
    }
}
