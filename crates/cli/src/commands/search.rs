//! `kbagent search`: show what auto-context would retrieve for a query.

use std::path::PathBuf;

use anyhow::Context;
use kbagent_config::AppConfig;
use kbagent_knowledge::ContextAssembler;

use super::ingest::load_foundation;

pub async fn run(query: &str, top_k: usize, dir: Option<PathBuf>, scores: bool) -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let index = load_foundation(&config, dir.as_deref())?;

    if scores {
        let hits = index.search_scored(query, top_k);
        if hits.is_empty() {
            eprintln!("No matches.");
        }
        for (chunk, score) in hits {
            println!("{score:>8.4}  {}", chunk.chunk_id);
        }
        return Ok(());
    }

    let chunks = index.search(query, top_k);
    if chunks.is_empty() {
        eprintln!("No matches.");
        return Ok(());
    }
    print!("{}", ContextAssembler::build_prompt_block(&chunks));
    Ok(())
}
