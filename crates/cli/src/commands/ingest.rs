//! `kbagent ingest`: build the index from a foundation directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use kbagent_config::AppConfig;
use kbagent_knowledge::{Chunker, FoundationIngester, KnowledgeIndex};

/// Ingest `dir`, or the configured foundation directory, into a fresh index.
pub fn load_foundation(config: &AppConfig, dir: Option<&Path>) -> anyhow::Result<Arc<KnowledgeIndex>> {
    let root = dir.unwrap_or(config.knowledge_base.foundation_dir.as_path());
    let chunker = Chunker::with_window(config.knowledge_base.chunk_window)?;
    let ingester = FoundationIngester::new(Arc::new(KnowledgeIndex::new())).with_chunker(chunker);
    ingester
        .ingest_dir(root)
        .with_context(|| format!("Failed to ingest {}", root.display()))?;
    Ok(Arc::clone(ingester.index()))
}

pub async fn run(dir: Option<PathBuf>) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let index = load_foundation(&config, dir.as_deref())?;
    let stats = index.stats();

    println!("Documents: {}", stats.documents);
    println!("Chunks:    {}", stats.chunks);
    println!("Terms:     {}", stats.terms);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_docs_with_configured_window() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/guide.md"), "a".repeat(25)).unwrap();

        let mut config = AppConfig::default();
        config.knowledge_base.chunk_window = 10;
        let index = load_foundation(&config, Some(dir.path())).unwrap();

        let stats = index.stats();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 3);
    }

    #[test]
    fn missing_directory_yields_empty_index() {
        let dir = tempfile::tempdir().unwrap();
        let index = load_foundation(&AppConfig::default(), Some(&dir.path().join("nope"))).unwrap();
        assert_eq!(index.size(), 0);
    }
}
