//! Tool registry and per-run tool sets.
//!
//! The registry holds the long-lived tools. Its list is an immutable
//! snapshot that writers replace wholesale, so a caller iterating
//! `current_tools()` is never disturbed by a concurrent `add_tool`.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use kbagent_core::error::ToolError;
use kbagent_core::tool::{Tool, ToolArgs, ToolExecutor, ToolSpec};
use tracing::{debug, warn};

/// A registry of available tools.
///
/// The agent uses this to:
/// 1. Get tool specs to send to the model
/// 2. Look up and execute tools when the model requests them
pub struct ToolRegistry {
    tools: RwLock<Arc<[Arc<dyn Tool>]>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(Arc::from(Vec::new())),
        }
    }

    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            tools: RwLock::new(Arc::from(tools)),
        }
    }

    /// Snapshot of the registered tools, in registration order.
    pub fn current_tools(&self) -> Arc<[Arc<dyn Tool>]> {
        Arc::clone(&self.tools.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Specs of every tool that can currently describe itself.
    pub fn current_tool_specs(&self) -> Vec<ToolSpec> {
        self.current_tools()
            .iter()
            .filter_map(|tool| match tool.spec() {
                Ok(spec) => Some(spec),
                Err(e) => {
                    warn!(error = %e, "Excluding tool whose spec failed");
                    None
                }
            })
            .collect()
    }

    pub fn add_tool(&self, tool: Arc<dyn Tool>) {
        self.add_tools(std::iter::once(tool));
    }

    pub fn add_tools<I>(&self, tools: I)
    where
        I: IntoIterator<Item = Arc<dyn Tool>>,
    {
        let mut guard = self.tools.write().unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Arc<dyn Tool>> = guard.iter().cloned().collect();
        next.extend(tools);
        debug!(count = next.len(), "Tool registry updated");
        *guard = Arc::from(next);
    }

    pub fn len(&self) -> usize {
        self.current_tools().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build the name -> tool map for one run. Registry tools go in first,
    /// then `ad_hoc`, so an ad-hoc tool shadows a registry tool of the same
    /// name.
    pub fn merged_with(&self, ad_hoc: &[Arc<dyn Tool>]) -> ToolSet {
        let mut set = ToolSet::new();
        for tool in self.current_tools().iter().chain(ad_hoc.iter()) {
            set.insert(Arc::clone(tool));
        }
        set
    }

    fn find(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.current_tools()
            .iter()
            .find(|t| t.spec().is_ok_and(|s| s.name == name))
            .cloned()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, args: ToolArgs) -> Result<String, ToolError> {
        let tool = self
            .find(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(args).await
    }
}

/// The tools visible to a single run, keyed by name.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: HashMap<String, (ToolSpec, Arc<dyn Tool>)>,
    /// Names in first-insertion order, so specs are sent in a stable order.
    order: Vec<String>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool, replacing any tool with the same name. Tools whose spec
    /// fails are skipped.
    pub fn insert(&mut self, tool: Arc<dyn Tool>) {
        let spec = match tool.spec() {
            Ok(spec) => spec,
            Err(e) => {
                warn!(error = %e, "Skipping tool whose spec failed");
                return;
            }
        };
        let name = spec.name.clone();
        if self.tools.insert(name.clone(), (spec, tool)).is_none() {
            self.order.push(name);
        }
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|(spec, _)| spec.clone()))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name).map(|(_, tool)| tool)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[async_trait]
impl ToolExecutor for ToolSet {
    async fn execute(&self, name: &str, args: ToolArgs) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbagent_core::tool::Parameter;
    use serde_json::json;

    /// A simple test tool that answers with a fixed label.
    struct LabelTool {
        name: &'static str,
        label: &'static str,
    }

    #[async_trait]
    impl Tool for LabelTool {
        fn spec(&self) -> Result<ToolSpec, ToolError> {
            Ok(ToolSpec::new(self.name, "Returns a label")
                .with_parameter(Parameter::new("text", "string", false, "ignored")))
        }

        async fn execute(&self, _args: ToolArgs) -> Result<String, ToolError> {
            Ok(self.label.to_string())
        }
    }

    struct BrokenSpecTool;

    #[async_trait]
    impl Tool for BrokenSpecTool {
        fn spec(&self) -> Result<ToolSpec, ToolError> {
            Err(ToolError::Spec("schema unavailable".into()))
        }

        async fn execute(&self, _args: ToolArgs) -> Result<String, ToolError> {
            Ok("unreachable".into())
        }
    }

    fn label(name: &'static str, label: &'static str) -> Arc<dyn Tool> {
        Arc::new(LabelTool { name, label })
    }

    #[test]
    fn specs_exclude_broken_tools() {
        let registry = ToolRegistry::new();
        registry.add_tools(vec![label("echo", "e"), Arc::new(BrokenSpecTool) as Arc<dyn Tool>]);
        let specs = registry.current_tool_specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "echo");
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn snapshot_is_unaffected_by_later_adds() {
        let registry = ToolRegistry::new();
        registry.add_tool(label("a", "a"));
        let before = registry.current_tools();
        registry.add_tool(label("b", "b"));
        assert_eq!(before.len(), 1);
        assert_eq!(registry.current_tools().len(), 2);
    }

    #[tokio::test]
    async fn registry_executes_by_name() {
        let registry = ToolRegistry::with_tools(vec![label("echo", "hello")]);
        let out = registry.execute("echo", ToolArgs::new()).await.unwrap();
        assert_eq!(out, "hello");
    }

    #[tokio::test]
    async fn unknown_tool_is_not_found() {
        let registry = ToolRegistry::new();
        let err = registry.execute("nonexistent", ToolArgs::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(name) if name == "nonexistent"));
    }

    #[tokio::test]
    async fn ad_hoc_tools_shadow_registry() {
        let registry = ToolRegistry::with_tools(vec![label("lookup", "registry"), label("other", "o")]);
        let set = registry.merged_with(&[label("lookup", "ad-hoc"), Arc::new(BrokenSpecTool) as Arc<dyn Tool>]);

        assert_eq!(set.len(), 2);
        assert_eq!(set.names(), &["lookup".to_string(), "other".to_string()]);
        let args = json!({}).as_object().cloned().unwrap();
        assert_eq!(set.execute("lookup", args).await.unwrap(), "ad-hoc");
        assert!(matches!(
            set.execute("missing", ToolArgs::new()).await,
            Err(ToolError::NotFound(_))
        ));
    }
}
