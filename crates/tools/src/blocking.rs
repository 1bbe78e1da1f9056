//! Bridge for tools whose work is synchronous.
//!
//! The closure runs on tokio's blocking pool. A semaphore caps how many run
//! at once, and the permit stays with the closure until it really returns,
//! so a hung call keeps occupying its slot. Past the timeout the caller gets
//! a textual marker instead of an error; the model sees it like any output.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kbagent_core::error::ToolError;
use kbagent_core::tool::{Tool, ToolArgs, ToolSpec};
use tokio::sync::Semaphore;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct BlockingToolBridge {
    permits: Arc<Semaphore>,
    timeout: Duration,
}

impl BlockingToolBridge {
    pub fn new(max_parallel: usize, timeout: Duration) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_parallel.max(1))),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `work` off the async runtime, bounded by the pool and the timeout.
    pub async fn run<F>(&self, tool_name: &str, work: F) -> Result<String, ToolError>
    where
        F: FnOnce() -> Result<String, ToolError> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: format!("worker pool closed: {e}"),
            })?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            work()
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ToolError::ExecutionFailed {
                tool_name: tool_name.to_string(),
                reason: format!("blocking task failed: {join}"),
            }),
            Err(_) => {
                warn!(tool = tool_name, timeout_secs = self.timeout.as_secs(), "Blocking tool timed out");
                Ok(format!("(timed out after {}s)", self.timeout.as_secs()))
            }
        }
    }
}

type BlockingFn = dyn Fn(ToolArgs) -> Result<String, ToolError> + Send + Sync;

/// A [`Tool`] backed by a synchronous function.
pub struct BlockingTool {
    spec: ToolSpec,
    func: Arc<BlockingFn>,
    bridge: BlockingToolBridge,
}

impl BlockingTool {
    pub fn new<F>(spec: ToolSpec, bridge: BlockingToolBridge, func: F) -> Self
    where
        F: Fn(ToolArgs) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Self {
            spec,
            func: Arc::new(func),
            bridge,
        }
    }
}

#[async_trait]
impl Tool for BlockingTool {
    fn spec(&self) -> Result<ToolSpec, ToolError> {
        Ok(self.spec.clone())
    }

    async fn execute(&self, args: ToolArgs) -> Result<String, ToolError> {
        let func = Arc::clone(&self.func);
        self.bridge.run(&self.spec.name, move || func(args)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[tokio::test]
    async fn returns_closure_output() {
        let bridge = BlockingToolBridge::new(2, Duration::from_secs(5));
        let out = bridge.run("sum", || Ok((2 + 2).to_string())).await.unwrap();
        assert_eq!(out, "4");
    }

    #[tokio::test]
    async fn closure_error_passes_through() {
        let bridge = BlockingToolBridge::new(1, Duration::from_secs(5));
        let err = bridge
            .run("bad", || Err(ToolError::InvalidArguments("nope".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn timeout_yields_marker() {
        let bridge = BlockingToolBridge::new(1, Duration::from_secs(1));
        let (release, wait) = mpsc::channel::<()>();
        let out = bridge
            .run("slow", move || {
                let _ = wait.recv_timeout(Duration::from_secs(10));
                Ok("late".into())
            })
            .await
            .unwrap();
        assert_eq!(out, "(timed out after 1s)");
        let _ = release.send(());
    }

    #[tokio::test]
    async fn pool_bounds_parallelism() {
        let bridge = BlockingToolBridge::new(1, Duration::from_secs(5));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let calls = (0..4).map(|_| {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            let bridge = bridge.clone();
            async move {
                bridge
                    .run("work", move || {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(String::new())
                    })
                    .await
            }
        });
        for r in futures::future::join_all(calls).await {
            r.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn blocking_tool_executes_function() {
        let bridge = BlockingToolBridge::new(1, Duration::from_secs(5));
        let tool = BlockingTool::new(ToolSpec::new("upper", "Upper-cases text"), bridge, |args| {
            let text = args.get("text").and_then(|v| v.as_str()).unwrap_or_default();
            Ok(text.to_uppercase())
        });
        let args = serde_json::json!({"text": "abc"}).as_object().cloned().unwrap();
        assert_eq!(tool.execute(args).await.unwrap(), "ABC");
        assert_eq!(tool.spec().unwrap().name, "upper");
    }
}
