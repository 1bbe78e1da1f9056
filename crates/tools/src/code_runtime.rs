//! TypeScript runtime tool.
//!
//! Sends a snippet to an external runtime service (`POST {url}/run` with
//! `{"snippet": code}`) and returns the value it evaluated to.

use std::time::Duration;

use async_trait::async_trait;
use kbagent_core::error::ToolError;
use kbagent_core::tool::{Parameter, Tool, ToolArgs, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

const TOOL_NAME: &str = "run_typescript";
const NO_RESULT: &str = "(no result)";

/// Response body of the runtime's `/run` endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub logs: Vec<LogEntry>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One console call captured by the runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl RunResponse {
    /// The tool output for this response.
    pub fn into_output(self) -> Result<String, ToolError> {
        if !self.ok {
            return Err(ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: self.error.unwrap_or_else(|| "runtime reported failure".into()),
            });
        }
        Ok(match self.value {
            None | Some(Value::Null) => NO_RESULT.to_string(),
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
        })
    }
}

pub struct CodeRuntimeTool {
    base_url: String,
    client: reqwest::Client,
}

impl CodeRuntimeTool {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ToolError::Spec(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn run(&self, code: &str) -> Result<RunResponse, ToolError> {
        let url = format!("{}/run", self.base_url);
        let failed = |reason: String| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason,
        };

        debug!(url = %url, bytes = code.len(), "Sending snippet to runtime");

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "snippet": code }))
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status, body = %body, "Runtime returned error");
            return Err(failed(format!("runtime returned HTTP {status}: {body}")));
        }

        response
            .json::<RunResponse>()
            .await
            .map_err(|e| failed(format!("unreadable runtime response: {e}")))
    }
}

#[async_trait]
impl Tool for CodeRuntimeTool {
    fn spec(&self) -> Result<ToolSpec, ToolError> {
        Ok(ToolSpec::new(
            TOOL_NAME,
            "Execute a short TypeScript snippet in the isolated runtime and return its result.",
        )
        .with_parameter(Parameter::new("code", "string", true, "TypeScript code to execute")))
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let code = args
            .get("code")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'code' argument".into()))?;

        let response = self.run(code).await?;
        for log in &response.logs {
            debug!(level = %log.level, args = ?log.args, "runtime console");
        }
        response.into_output()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: Value) -> RunResponse {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn string_value_is_returned_raw() {
        let r = parse(json!({"ok": true, "value": "42", "logs": [], "error": null}));
        assert_eq!(r.into_output().unwrap(), "42");
    }

    #[test]
    fn structured_value_is_serialized() {
        let r = parse(json!({"ok": true, "value": {"n": 1}}));
        assert_eq!(r.into_output().unwrap(), r#"{"n":1}"#);
    }

    #[test]
    fn null_value_means_no_result() {
        let r = parse(json!({"ok": true, "value": null, "logs": [{"level": "log", "args": ["hi"]}]}));
        assert_eq!(r.into_output().unwrap(), "(no result)");
    }

    #[test]
    fn failed_run_is_tool_error() {
        let r = parse(json!({"ok": false, "error": "ReferenceError: x is not defined"}));
        let err = r.into_output().unwrap_err();
        assert!(err.to_string().contains("ReferenceError"));
    }

    #[tokio::test]
    async fn missing_code_is_invalid() {
        let tool = CodeRuntimeTool::new("http://localhost:3000/", Duration::from_secs(1)).unwrap();
        assert_eq!(tool.base_url(), "http://localhost:3000");
        let err = tool.execute(ToolArgs::new()).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn unreachable_runtime_is_execution_failure() {
        // Port 9 (discard) on localhost is not expected to speak HTTP.
        let tool = CodeRuntimeTool::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let args = json!({"code": "1 + 1"}).as_object().cloned().unwrap();
        let err = tool.execute(args).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
