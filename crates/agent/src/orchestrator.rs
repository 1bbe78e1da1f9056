//! The orchestrator: everything around one loop run.
//!
//! For each request it
//! 1. checks the guardrail against the first user message,
//! 2. merges registry tools with the caller's ad-hoc tools (ad-hoc wins),
//! 3. prepends the system prompt and retrieved context as system messages,
//! 4. hands the result to the [`ToolLoop`].
//!
//! The system prompt is the explicit one if set, otherwise the ingested
//! `Agent.md` when enabled. With the environment summary on, it is followed
//! by listings of the knowledge base, the API operations in it, and the tools
//! of this run.
//!
//! All dependencies are passed in explicitly; nothing is looked up globally.

use std::sync::Arc;

use kbagent_config::AppConfig;
use kbagent_core::error::AgentError;
use kbagent_core::guardrail::{AllowAll, DenyKeywordGuardrail, Guardrail};
use kbagent_core::hooks::{Instrumentation, NoopInstrumentation, SpanKind, SpanOutcome};
use kbagent_core::message::{Message, Role};
use kbagent_core::provider::ModelInvoker;
use kbagent_core::tool::Tool;
use kbagent_knowledge::{AGENT_PROMPT_ID, ContextAssembler, KnowledgeIndex, SourceKind};
use kbagent_tools::{ToolRegistry, ToolSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::loop_runner::ToolLoop;
use crate::result::InferenceResult;

const DEFAULT_TOP_K: usize = 4;

pub struct Orchestrator {
    model: Arc<dyn ModelInvoker>,
    registry: Arc<ToolRegistry>,
    index: Arc<KnowledgeIndex>,
    guardrail: Arc<dyn Guardrail>,
    hooks: Arc<dyn Instrumentation>,
    tool_loop: ToolLoop,

    /// Explicit agent prompt; takes precedence over `Agent.md`
    system_prompt: Option<String>,
    prompt_from_index: bool,
    describe_environment: bool,

    auto_context: bool,
    auto_context_top_k: usize,
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn ModelInvoker>,
        registry: Arc<ToolRegistry>,
        index: Arc<KnowledgeIndex>,
    ) -> Self {
        Self {
            model,
            registry,
            index,
            guardrail: Arc::new(AllowAll),
            hooks: Arc::new(NoopInstrumentation),
            tool_loop: ToolLoop::new(),
            system_prompt: None,
            prompt_from_index: false,
            describe_environment: false,
            auto_context: true,
            auto_context_top_k: DEFAULT_TOP_K,
        }
    }

    /// Build an orchestrator with loop limits, prompt assembly, auto-context,
    /// and guardrail rules taken from configuration.
    pub fn from_config(
        config: &AppConfig,
        model: Arc<dyn ModelInvoker>,
        registry: Arc<ToolRegistry>,
        index: Arc<KnowledgeIndex>,
    ) -> Result<Self, AgentError> {
        config
            .validate()
            .map_err(|e| AgentError::Config(e.to_string()))?;

        let tool_loop = ToolLoop::new()
            .with_max_turns(config.orchestrator.max_turns)
            .with_tool_timeout(config.orchestrator.tool_timeout())
            .with_max_parallel_tools(config.orchestrator.max_parallel_tools)
            .with_discard_on_cancel(config.orchestrator.discard_on_cancel);

        let mut orchestrator = Self::new(model, registry, index)
            .with_loop(tool_loop)
            .with_agent_prompt_from_index(config.orchestrator.agent_prompt_from_index)
            .with_environment_summary(config.orchestrator.describe_environment)
            .with_auto_context(
                config.knowledge_base.auto_context,
                config.knowledge_base.auto_context_top_k,
            );
        if !config.guardrails.rules.trim().is_empty() {
            orchestrator = orchestrator.with_guardrail(Arc::new(DenyKeywordGuardrail::from_rules(
                &config.guardrails.rules,
            )));
        }
        Ok(orchestrator)
    }

    /// Replace the loop policy (limits, timeouts, concurrency).
    ///
    /// The loop reports to this orchestrator's instrumentation, and its own
    /// guardrail is reset to [`AllowAll`]: the orchestrator already checked
    /// the request before retrieval.
    pub fn with_loop(mut self, tool_loop: ToolLoop) -> Self {
        self.tool_loop = tool_loop
            .with_guardrail(Arc::new(AllowAll))
            .with_instrumentation(Arc::clone(&self.hooks));
        self
    }

    pub fn with_guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.guardrail = guardrail;
        self
    }

    /// Instrument the run, the retrieval step, and every model and tool call.
    pub fn with_instrumentation(mut self, hooks: Arc<dyn Instrumentation>) -> Self {
        self.tool_loop = self.tool_loop.with_instrumentation(Arc::clone(&hooks));
        self.hooks = hooks;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.trim().is_empty()).then_some(prompt);
        self
    }

    /// Fall back to the ingested `Agent.md` when no explicit prompt is set.
    pub fn with_agent_prompt_from_index(mut self, enabled: bool) -> Self {
        self.prompt_from_index = enabled;
        self
    }

    /// Append knowledge-base, service and tool listings to the system prompt.
    pub fn with_environment_summary(mut self, enabled: bool) -> Self {
        self.describe_environment = enabled;
        self
    }

    pub fn with_auto_context(mut self, enabled: bool, top_k: usize) -> Self {
        self.auto_context = enabled;
        self.auto_context_top_k = top_k;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn index(&self) -> &Arc<KnowledgeIndex> {
        &self.index
    }

    /// Process one request end to end.
    pub async fn run(
        &self,
        messages: Vec<Message>,
        ad_hoc_tools: &[Arc<dyn Tool>],
        cancel: &CancellationToken,
    ) -> Result<InferenceResult, AgentError> {
        let run_id = Uuid::new_v4().to_string();
        let span = self.hooks.on_begin(&run_id, SpanKind::Run, "orchestrator.run");

        let result = self.run_inner(&run_id, messages, ad_hoc_tools, cancel).await;

        let outcome = match &result {
            Ok(r) => SpanOutcome::ok().with_usage(r.usage),
            Err(e) => SpanOutcome::failed(e.to_string()),
        };
        self.hooks.on_end(span, outcome);
        result
    }

    async fn run_inner(
        &self,
        run_id: &str,
        messages: Vec<Message>,
        ad_hoc_tools: &[Arc<dyn Tool>],
        cancel: &CancellationToken,
    ) -> Result<InferenceResult, AgentError> {
        info!(run_id, messages = messages.len(), ad_hoc_tools = ad_hoc_tools.len(), "Orchestrating run");

        if let Some(first_user) = messages.iter().find(|m| m.role == Role::User) {
            if let Err(rejection) = self.guardrail.check(&first_user.content) {
                warn!(run_id, reason = %rejection, "Request rejected by guardrails");
                return Err(AgentError::Rejected(rejection.reason));
            }
        }

        let tools = self.registry.merged_with(ad_hoc_tools);
        let specs = tools.specs();
        debug!(run_id, tools = ?tools.names(), "Tools merged for run");

        let mut transcript = Vec::with_capacity(messages.len() + 2);
        if let Some(prompt) = self.system_prompt_for(&tools) {
            transcript.push(Message::system(prompt));
        }
        if let Some(context) = self.retrieve_context(run_id, &messages) {
            transcript.push(context);
        }
        transcript.extend(messages);

        self.tool_loop
            .run_as(run_id, transcript, &specs, &tools, self.model.as_ref(), cancel)
            .await
    }

    /// The system prompt for a run over `tools`, if there is anything to say.
    fn system_prompt_for(&self, tools: &ToolSet) -> Option<String> {
        let base = match &self.system_prompt {
            Some(prompt) => Some(prompt.clone()),
            None if self.prompt_from_index => self.index.get(AGENT_PROMPT_ID).map(|doc| doc.text),
            None => None,
        };

        let mut sections: Vec<String> = base.into_iter().filter(|p| !p.trim().is_empty()).collect();
        if self.describe_environment {
            sections.extend(self.environment_sections(tools));
        }
        (!sections.is_empty()).then(|| sections.join("\n\n"))
    }

    /// Listing sections; empty listings are left out.
    fn environment_sections(&self, tools: &ToolSet) -> Vec<String> {
        let inventory = self.index.inventory();

        let resources: Vec<String> = inventory
            .iter()
            .filter(|e| e.source_kind != SourceKind::AgentPrompt)
            .map(|e| format!("- {} :: {}", e.id, e.title))
            .collect();
        let services: Vec<String> = inventory
            .iter()
            .filter(|e| e.source_kind == SourceKind::GeneratedApiMethod)
            .map(|e| format!("- {}", e.id))
            .collect();
        let tool_lines: Vec<String> = tools
            .specs()
            .iter()
            .map(|spec| format!("- {} :: {}", spec.name, spec.description))
            .collect();

        [
            ("Knowledge Base (resources):", resources),
            ("Available Services:", services),
            ("Available Tools:", tool_lines),
        ]
        .into_iter()
        .filter(|(_, lines)| !lines.is_empty())
        .map(|(title, lines)| format!("{title}\n{}", lines.join("\n")))
        .collect()
    }

    /// Context block for the last message, if auto-context is on and
    /// anything matched.
    fn retrieve_context(&self, run_id: &str, messages: &[Message]) -> Option<Message> {
        if !self.auto_context {
            return None;
        }
        let query = &messages.last()?.content;

        let span = self.hooks.on_begin(run_id, SpanKind::Retrieval, "kb.retrieve");
        let chunks = self.index.search(query, self.auto_context_top_k);
        self.hooks.on_end(span, SpanOutcome::ok());

        debug!(run_id, hits = chunks.len(), "Auto-context retrieval");
        ContextAssembler::system_message(&chunks)
    }
}
