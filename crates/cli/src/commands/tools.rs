//! `kbagent tools`: built-in tool specs in the shape sent to the model.

use std::sync::Arc;

use anyhow::Context;
use kbagent_config::AppConfig;
use kbagent_core::tool::ToolSpec;
use kbagent_knowledge::KnowledgeIndex;
use serde_json::{Value, json};

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::load().context("Failed to load config")?;
    let registry = kbagent_tools::default_registry(Arc::new(KnowledgeIndex::new()), &config.runtime)?;
    let listing = describe(&registry.current_tool_specs());
    println!("{}", serde_json::to_string_pretty(&listing)?);
    Ok(())
}

fn describe(specs: &[ToolSpec]) -> Value {
    Value::Array(
        specs
            .iter()
            .map(|spec| {
                json!({
                    "name": spec.name,
                    "description": spec.description,
                    "parameters": spec.to_json_schema(),
                })
            })
            .collect(),
    )
}
