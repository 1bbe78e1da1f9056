//! Built-in tools and the tool registry for kbagent.
//!
//! Tools give the agent the ability to act during a run:
//! look things up in the knowledge base and evaluate code in the
//! external TypeScript runtime. Synchronous tools are adapted through
//! [`BlockingToolBridge`].

pub mod blocking;
pub mod code_runtime;
pub mod registry;
pub mod retrieve_context;

use std::sync::Arc;
use std::time::Duration;

use kbagent_config::RuntimeConfig;
use kbagent_core::error::ToolError;
use kbagent_core::tool::Tool;
use kbagent_knowledge::KnowledgeIndex;

pub use blocking::{BlockingTool, BlockingToolBridge};
pub use code_runtime::{CodeRuntimeTool, RunResponse};
pub use registry::{ToolRegistry, ToolSet};
pub use retrieve_context::RetrieveContextTool;

/// Create a registry with all built-in tools.
pub fn default_registry(
    index: Arc<KnowledgeIndex>,
    runtime: &RuntimeConfig,
) -> Result<ToolRegistry, ToolError> {
    let code = CodeRuntimeTool::new(&runtime.url, Duration::from_secs(runtime.timeout_secs))?;
    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(RetrieveContextTool::new(index)),
        Arc::new(code),
    ];
    Ok(ToolRegistry::with_tools(tools))
}
