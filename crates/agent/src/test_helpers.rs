//! Shared test helpers for loop and orchestrator tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kbagent_core::error::{ProviderError, ToolError};
use kbagent_core::message::Message;
use kbagent_core::provider::{ModelInvoker, ModelTurn};
use kbagent_core::tool::{ToolArgs, ToolCallRequest, ToolExecutor, ToolSpec};

/// A model that replays a script of turns in sequence.
///
/// Each call to `invoke` returns the next entry. In repeating mode the
/// single entry is returned forever. Every transcript it is shown is kept.
pub struct ScriptedModel {
    script: Mutex<Vec<Result<ModelTurn, ProviderError>>>,
    repeat: bool,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new(script: Vec<Result<ModelTurn, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(script),
            repeat: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn repeating(turn: ModelTurn) -> Self {
        Self {
            script: Mutex::new(vec![Ok(turn)]),
            repeat: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    /// The transcript passed on the `n`th call.
    pub fn transcript(&self, n: usize) -> Vec<Message> {
        self.seen.lock().unwrap()[n].clone()
    }
}

#[async_trait]
impl ModelInvoker for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(
        &self,
        transcript: &[Message],
        _tool_specs: &[ToolSpec],
    ) -> Result<ModelTurn, ProviderError> {
        let call = {
            let mut seen = self.seen.lock().unwrap();
            seen.push(transcript.to_vec());
            seen.len() - 1
        };
        let script = self.script.lock().unwrap();
        let index = if self.repeat { 0 } else { call };
        script.get(index).cloned().unwrap_or_else(|| {
            Err(ProviderError::NotConfigured(format!(
                "script exhausted: call #{call}, have {}",
                script.len()
            )))
        })
    }
}

type ToolFn = Arc<dyn Fn(&ToolArgs) -> Result<String, ToolError> + Send + Sync>;

/// A name -> closure executor with optional per-tool delays.
#[derive(Default, Clone)]
pub struct StaticTools {
    tools: HashMap<String, ToolFn>,
    delays: HashMap<String, Duration>,
}

impl StaticTools {
    pub fn with<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&ToolArgs) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        self.tools.insert(name.to_string(), Arc::new(f));
        self
    }

    pub fn with_delay(mut self, name: &str, delay: Duration) -> Self {
        self.delays.insert(name.to_string(), delay);
        self
    }
}

#[async_trait]
impl ToolExecutor for StaticTools {
    async fn execute(&self, name: &str, args: ToolArgs) -> Result<String, ToolError> {
        let tool = self
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        if let Some(delay) = self.delays.get(name) {
            tokio::time::sleep(*delay).await;
        }
        tool(&args)
    }
}

pub fn call(id: &str, name: &str, arguments: &str) -> ToolCallRequest {
    ToolCallRequest::new(id, name, arguments)
}
