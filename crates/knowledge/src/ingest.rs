//! Foundation directory ingestion.
//!
//! Layout understood under the root:
//!
//! - `Agent.md`: the agent prompt, indexed as `agent-md`
//! - `docs/*.md`, `docs/*.mdx`: markdown pages, indexed as `doc:{file name}`
//! - `apis/*.json`: OpenAPI specs, one document per operation, `api:{operationId}`
//!
//! Unreadable or malformed files are skipped with a warning; one bad file
//! never aborts the whole ingestion.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kbagent_core::error::KnowledgeError;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::chunker::Chunker;
use crate::document::{Document, SourceKind};
use crate::index::KnowledgeIndex;

/// Document id of the foundation's `Agent.md`.
pub const AGENT_PROMPT_ID: &str = "agent-md";

const HTTP_METHODS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch", "trace"];

/// Reads a foundation tree into a [`KnowledgeIndex`].
pub struct FoundationIngester {
    index: Arc<KnowledgeIndex>,
    chunker: Chunker,
}

impl FoundationIngester {
    pub fn new(index: Arc<KnowledgeIndex>) -> Self {
        Self {
            index,
            chunker: Chunker::default(),
        }
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn index(&self) -> &Arc<KnowledgeIndex> {
        &self.index
    }

    /// Ingest everything under `root`. Returns the number of documents added.
    /// A missing root is not an error.
    pub fn ingest_dir(&self, root: &Path) -> Result<usize, KnowledgeError> {
        if !root.exists() {
            info!(root = %root.display(), "Foundation directory not found, nothing to ingest");
            return Ok(0);
        }
        if !root.is_dir() {
            return Err(KnowledgeError::Read {
                path: root.display().to_string(),
                reason: "not a directory".into(),
            });
        }

        let mut docs = Vec::new();

        let agent_md = root.join("Agent.md");
        if agent_md.is_file() {
            if let Some(text) = read_file(&agent_md) {
                docs.push(
                    Document::new(AGENT_PROMPT_ID, "Agent Prompt", text, SourceKind::AgentPrompt)
                        .with_metadata("path", agent_md.display().to_string()),
                );
            }
        }

        for path in list_files(&root.join("docs"), &["md", "mdx"]) {
            let Some(text) = read_file(&path) else {
                continue;
            };
            let name = file_name(&path);
            docs.push(
                Document::new(format!("doc:{name}"), name, text, SourceKind::MarkdownDoc)
                    .with_metadata("path", path.display().to_string()),
            );
        }

        for path in list_files(&root.join("apis"), &["json"]) {
            match read_openapi(&path) {
                Ok(operations) => docs.extend(operations),
                Err(e) => warn!(error = %e, "Skipping API spec"),
            }
        }

        let count = self.index_all(docs);
        info!(root = %root.display(), documents = count, "Foundation ingested");
        Ok(count)
    }

    /// Index one document per operation of an OpenAPI JSON file.
    pub fn ingest_openapi(&self, path: &Path) -> Result<usize, KnowledgeError> {
        let docs = read_openapi(path)?;
        let count = self.index_all(docs);
        debug!(path = %path.display(), operations = count, "Ingested API spec");
        Ok(count)
    }

    /// Chunk and index `docs` in one index write.
    fn index_all(&self, docs: Vec<Document>) -> usize {
        let entries: Vec<_> = docs
            .into_iter()
            .map(|doc| {
                let chunks = self.chunker.chunk(&doc.id, &doc.text);
                (doc, chunks)
            })
            .collect();
        self.index.add_batch(entries).len()
    }
}

fn read_openapi(path: &Path) -> Result<Vec<Document>, KnowledgeError> {
    let raw = std::fs::read_to_string(path).map_err(|e| KnowledgeError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let root: Value = serde_json::from_str(&raw).map_err(|e| KnowledgeError::Malformed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(openapi_documents(&root))
}

fn openapi_documents(root: &Value) -> Vec<Document> {
    let title = root
        .pointer("/info/title")
        .and_then(Value::as_str)
        .unwrap_or("API");
    let Some(paths) = root.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut docs = Vec::new();
    for (path, item) in paths {
        let Some(methods) = item.as_object() else {
            continue;
        };
        for (method, op) in methods {
            if !HTTP_METHODS.contains(&method.as_str()) {
                continue;
            }
            let field = |name: &str| op.get(name).and_then(Value::as_str).unwrap_or("").to_string();
            let op_id = op
                .get("operationId")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{method}_{path}"));
            let text = format!(
                "# {title} – {op_id}\n**Method**: {} {path}\n\n**Summary**: {}\n\n{}\n",
                method.to_uppercase(),
                field("summary"),
                field("description"),
            );
            docs.push(
                Document::new(format!("api:{op_id}"), op_id, text, SourceKind::GeneratedApiMethod)
                    .with_metadata("path", path.clone())
                    .with_metadata("method", method.clone()),
            );
        }
    }
    docs
}

fn list_files(dir: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Cannot list directory");
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .collect();
    files.sort();
    files
}

fn read_file(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Skipping unreadable file");
            None
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const PETSTORE: &str = r#"{
        "info": { "title": "Petstore" },
        "paths": {
            "/pets": {
                "get": { "operationId": "listPets", "summary": "List pets", "description": "All of them." },
                "post": { "summary": "Create pet" },
                "parameters": []
            }
        }
    }"#;

    fn foundation() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Agent.md"), "You are a pet shop assistant.").unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/guide.md"), "# Guide\nFeeding schedule").unwrap();
        fs::write(dir.path().join("docs/notes.mdx"), "Grooming tips").unwrap();
        fs::write(dir.path().join("docs/ignored.txt"), "not markdown").unwrap();
        fs::create_dir(dir.path().join("apis")).unwrap();
        fs::write(dir.path().join("apis/petstore.json"), PETSTORE).unwrap();
        dir
    }

    #[test]
    fn ingests_whole_foundation() {
        let dir = foundation();
        let index = Arc::new(KnowledgeIndex::new());
        let ingester = FoundationIngester::new(Arc::clone(&index));

        let count = ingester.ingest_dir(dir.path()).unwrap();
        assert_eq!(count, 5);
        assert_eq!(index.size(), 5);

        let agent = index.get(AGENT_PROMPT_ID).unwrap();
        assert_eq!(agent.title, "Agent Prompt");
        assert_eq!(agent.source_kind, SourceKind::AgentPrompt);

        let guide = index.get("doc:guide.md").unwrap();
        assert_eq!(guide.source_kind, SourceKind::MarkdownDoc);
        assert!(guide.metadata["path"].ends_with("guide.md"));
        assert!(index.get("doc:notes.mdx").is_some());
        assert!(index.get("doc:ignored.txt").is_none());
    }

    #[test]
    fn openapi_operation_text_and_fallback_id() {
        let dir = foundation();
        let index = Arc::new(KnowledgeIndex::new());
        FoundationIngester::new(Arc::clone(&index))
            .ingest_dir(dir.path())
            .unwrap();

        let list = index.get("api:listPets").unwrap();
        assert_eq!(
            list.text,
            "# Petstore – listPets\n**Method**: GET /pets\n\n**Summary**: List pets\n\nAll of them.\n"
        );
        assert_eq!(list.metadata["method"], "get");
        assert_eq!(list.source_kind, SourceKind::GeneratedApiMethod);

        let create = index.get("api:post_/pets").unwrap();
        assert!(create.text.contains("**Method**: POST /pets"));
    }

    #[test]
    fn missing_root_is_empty() {
        let index = Arc::new(KnowledgeIndex::new());
        let count = FoundationIngester::new(index)
            .ingest_dir(Path::new("/definitely/not/here"))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn malformed_spec_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("apis")).unwrap();
        fs::write(dir.path().join("apis/broken.json"), "{ not json").unwrap();
        fs::write(dir.path().join("Agent.md"), "prompt").unwrap();

        let index = Arc::new(KnowledgeIndex::new());
        let ingester = FoundationIngester::new(Arc::clone(&index));
        assert_eq!(ingester.ingest_dir(dir.path()).unwrap(), 1);
        assert!(matches!(
            ingester.ingest_openapi(&dir.path().join("apis/broken.json")),
            Err(KnowledgeError::Malformed { .. })
        ));
    }

    #[test]
    fn ingested_docs_are_searchable() {
        let dir = foundation();
        let index = Arc::new(KnowledgeIndex::new());
        FoundationIngester::new(Arc::clone(&index))
            .ingest_dir(dir.path())
            .unwrap();
        let hits = index.search("feeding", 4);
        assert_eq!(hits[0].parent_doc_id, "doc:guide.md");
    }
}
