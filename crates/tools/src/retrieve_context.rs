//! Knowledge base lookup tool.
//!
//! Lets the model pull more context mid-run, on top of whatever the
//! orchestrator prepended automatically.

use std::sync::Arc;

use async_trait::async_trait;
use kbagent_core::error::ToolError;
use kbagent_core::tool::{Parameter, Tool, ToolArgs, ToolSpec};
use kbagent_knowledge::{ContextAssembler, KnowledgeIndex};
use serde_json::json;

pub const DEFAULT_TOP_K: usize = 4;

pub struct RetrieveContextTool {
    index: Arc<KnowledgeIndex>,
}

impl RetrieveContextTool {
    pub fn new(index: Arc<KnowledgeIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl Tool for RetrieveContextTool {
    fn spec(&self) -> Result<ToolSpec, ToolError> {
        Ok(ToolSpec::new(
            "retrieve_context",
            "Retrieve contextual information from the knowledge base using a natural language query.",
        )
        .with_parameter(Parameter::new("query", "string", true, "Natural language query"))
        .with_parameter(
            Parameter::new("top_k", "integer", false, "Max results (default 4)")
                .with_extra("default", json!(DEFAULT_TOP_K))
                .with_extra("minimum", json!(1)),
        ))
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let query = args
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?;

        let top_k = match args.get("top_k") {
            None | Some(serde_json::Value::Null) => DEFAULT_TOP_K,
            Some(v) => v
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| ToolError::InvalidArguments("'top_k' must be a non-negative integer".into()))?,
        };

        let chunks = self.index.search(query, top_k);
        Ok(ContextAssembler::build_prompt_block(&chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbagent_knowledge::{CONTEXT_HEADER, Chunker, Document, SourceKind};

    fn index() -> Arc<KnowledgeIndex> {
        let index = Arc::new(KnowledgeIndex::new());
        for (id, text) in [
            ("refunds", "Refunds are issued within 14 days."),
            ("shipping", "Shipping takes 3 business days."),
            ("returns", "Returns need a receipt; refunds follow."),
        ] {
            index.add(
                Document::new(id, id, text, SourceKind::MarkdownDoc),
                Chunker::new().chunk(id, text),
            );
        }
        index
    }

    fn args(value: serde_json::Value) -> ToolArgs {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn returns_context_block() {
        let tool = RetrieveContextTool::new(index());
        let out = tool.execute(args(json!({"query": "refunds"}))).await.unwrap();
        assert!(out.starts_with(CONTEXT_HEADER));
        assert_eq!(out.lines().count(), 3);
    }

    #[tokio::test]
    async fn respects_top_k() {
        let tool = RetrieveContextTool::new(index());
        let out = tool
            .execute(args(json!({"query": "refunds", "top_k": 1})))
            .await
            .unwrap();
        assert_eq!(out.lines().count(), 2);
    }

    #[tokio::test]
    async fn missing_query_is_invalid() {
        let tool = RetrieveContextTool::new(index());
        let err = tool.execute(ToolArgs::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn spec_declares_parameters() {
        let spec = RetrieveContextTool::new(index()).spec().unwrap();
        assert_eq!(spec.name, "retrieve_context");
        let schema = spec.to_json_schema();
        assert_eq!(schema["required"], json!(["query"]));
        assert_eq!(schema["properties"]["top_k"]["default"], json!(4));
    }
}
