//! Tool trait: the abstraction over agent capabilities.
//!
//! A tool is anything the model can ask the agent to run: a knowledge-base
//! lookup, a code sandbox, a calculator. Each one exposes two capabilities,
//! `spec` (what it is) and `execute` (do it). Both may fail; the registry and
//! the agent loop decide how those failures are contained.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ToolError;
use crate::message::{Message, MessageToolCall};

/// Parsed tool arguments: always a JSON object.
pub type ToolArgs = Map<String, Value>;

/// A single declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,

    /// JSON-Schema type tag ("string", "integer", ...)
    #[serde(rename = "type")]
    pub type_tag: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub description: String,

    /// Extra JSON-Schema keywords merged into the property (e.g. `default`, `enum`).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub schema_extras: Map<String, Value>,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        type_tag: impl Into<String>,
        required: bool,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
            required,
            description: description.into(),
            schema_extras: Map::new(),
        }
    }

    /// Add a schema keyword such as `default` or `minimum`.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.schema_extras.insert(key.into(), value);
        self
    }
}

/// Tool metadata sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Unique tool name
    pub name: String,

    /// What the tool does, in words the model can act on
    pub description: String,

    /// Ordered parameter list
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Render the parameters as a JSON-Schema object.
    ///
    /// Property order follows declaration order; `schema_extras` are merged
    /// into each property without overriding `type` or `description`.
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for p in &self.parameters {
            let mut prop = p.schema_extras.clone();
            prop.insert("type".into(), Value::String(p.type_tag.clone()));
            if !p.description.is_empty() {
                prop.insert("description".into(), Value::String(p.description.clone()));
            }
            properties.insert(p.name.clone(), Value::Object(prop));
            if p.required {
                required.push(Value::String(p.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, echoed on the result message
    pub id: String,

    pub tool_name: String,

    /// Raw JSON argument text exactly as the model produced it
    pub arguments: String,
}

impl ToolCallRequest {
    pub fn new(
        id: impl Into<String>,
        tool_name: impl Into<String>,
        arguments: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the argument payload.
    ///
    /// Blank text means "no arguments". Anything else must be a JSON object.
    pub fn parse_arguments(&self) -> Result<ToolArgs, ToolError> {
        if self.arguments.trim().is_empty() {
            return Ok(ToolArgs::new());
        }
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(ToolError::InvalidArguments(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
            Err(e) => Err(ToolError::InvalidArguments(format!(
                "failed to parse tool arguments JSON: {e}"
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl From<&MessageToolCall> for ToolCallRequest {
    fn from(call: &MessageToolCall) -> Self {
        Self {
            id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
        }
    }
}

impl From<&ToolCallRequest> for MessageToolCall {
    fn from(req: &ToolCallRequest) -> Self {
        Self {
            id: req.id.clone(),
            name: req.tool_name.clone(),
            arguments: req.arguments.clone(),
        }
    }
}

/// Outcome of one tool call as fed back to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub request_id: String,
    pub tool_name: String,
    pub text: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolExecutionResult {
    pub fn success(request: &ToolCallRequest, text: impl Into<String>) -> Self {
        Self {
            request_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            text: text.into(),
            is_error: false,
        }
    }

    /// Failure result; the text is prefixed with `ERROR: `.
    pub fn failure(request: &ToolCallRequest, message: impl std::fmt::Display) -> Self {
        Self {
            request_id: request.id.clone(),
            tool_name: request.tool_name.clone(),
            text: format!("ERROR: {message}"),
            is_error: true,
        }
    }

    /// The transcript message for this result.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.request_id, &self.text)
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Describe the tool. May fail; callers exclude tools whose spec fails.
    fn spec(&self) -> Result<ToolSpec, ToolError>;

    /// Run the tool with parsed arguments.
    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError>;
}

/// Something that can dispatch a tool call by name.
///
/// Implemented by the tool registry and by per-run merged tool sets.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, name: &str, args: ToolArgs) -> Result<String, ToolError>;
}
