use crate::handler::LocalHandler;
use crate::http::call_http;
use crate::validate::validate_args;
use async_trait::async_trait;
use metatools_core::{MetatoolsError, MetatoolsResult, ToolBackend};
use metatools_discovery::ToolIndex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    /// Structured result as produced by the backend.
    pub structured: Value,
    pub duration: Duration,
}

/// Executes a tool by identifier.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, tool_id: &str, args: Map<String, Value>) -> MetatoolsResult<RunResult>;
}

/// A [`Runner`] that looks tools up in a [`ToolIndex`] and dispatches on
/// their registered backend. No retries happen here.
pub struct ToolRunner {
    index: Arc<ToolIndex>,
    handlers: HashMap<String, Arc<dyn LocalHandler>>,
    client: reqwest::Client,
}

impl ToolRunner {
    /// Runner over `index` with no local handlers yet.
    pub fn new(index: Arc<ToolIndex>) -> MetatoolsResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| MetatoolsError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            index,
            handlers: HashMap::new(),
            client,
        })
    }

    /// Makes `handler` available to tools with a matching local backend.
    pub fn register_handler(&mut self, handler: Arc<dyn LocalHandler>) {
        let name = handler.name().to_string();
        info!(handler = %name, "Registered local handler");
        self.handlers.insert(name, handler);
    }

    /// Number of registered local handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

#[async_trait]
impl Runner for ToolRunner {
    async fn run(&self, tool_id: &str, args: Map<String, Value>) -> MetatoolsResult<RunResult> {
        let tool = self
            .index
            .tool(tool_id)
            .ok_or_else(|| MetatoolsError::NotFound(format!("tool '{tool_id}'")))?;
        let backend = self
            .index
            .backend(tool_id)
            .ok_or_else(|| MetatoolsError::NotFound(format!("backend for '{tool_id}'")))?;

        validate_args(tool.input_schema.as_ref(), &args)?;

        let started = Instant::now();
        let structured = match &backend {
            ToolBackend::Local { name } => {
                let handler = self.handlers.get(name).ok_or_else(|| {
                    MetatoolsError::NotFound(format!("local handler '{name}' for '{tool_id}'"))
                })?;
                handler.call(args).await
            }
            ToolBackend::Http { url, headers } => {
                call_http(&self.client, url, headers, &args).await
            }
        };

        let duration = started.elapsed();
        match structured {
            Ok(structured) => {
                info!(
                    tool = %tool_id,
                    duration_ms = duration.as_millis() as u64,
                    "Tool run completed"
                );
                Ok(RunResult {
                    structured,
                    duration,
                })
            }
            Err(e) => {
                warn!(tool = %tool_id, error = %e, "Tool run failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::EchoHandler;
    use metatools_core::Tool;
    use serde_json::json;

    struct FailingHandler;

    #[async_trait]
    impl LocalHandler for FailingHandler {
        fn name(&self) -> &str {
            "fail"
        }
        async fn call(&self, _args: Map<String, Value>) -> MetatoolsResult<Value> {
            Err(MetatoolsError::Upstream("intentional failure".into()))
        }
    }

    fn make_runner() -> ToolRunner {
        let index = Arc::new(ToolIndex::new());
        index
            .register_tool(
                Tool::new("echo", "Echo").with_input_schema(json!({
                    "type": "object",
                    "properties": {"message": {"type": "string"}},
                    "required": ["message"]
                })),
                ToolBackend::local("echo"),
                None,
            )
            .unwrap();
        index
            .register_tool(Tool::new("broken", "Fails"), ToolBackend::local("fail"), None)
            .unwrap();
        index
            .register_tool(Tool::new("orphan", "No handler"), ToolBackend::local("missing"), None)
            .unwrap();

        let mut runner = ToolRunner::new(index).unwrap();
        runner.register_handler(Arc::new(EchoHandler));
        runner.register_handler(Arc::new(FailingHandler));
        runner
    }

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_run_local_handler() {
        let runner = make_runner();
        let result = runner.run("echo", args(json!({"message": "ok"}))).await.unwrap();
        assert_eq!(result.structured, json!("ok"));
    }

    #[tokio::test]
    async fn test_run_unknown_tool() {
        let runner = make_runner();
        let err = runner.run("nope", Map::new()).await.unwrap_err();
        assert!(matches!(err, MetatoolsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_run_missing_handler() {
        let runner = make_runner();
        let err = runner.run("orphan", Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[tokio::test]
    async fn test_run_validates_arguments() {
        let runner = make_runner();
        let err = runner.run("echo", Map::new()).await.unwrap_err();
        assert!(matches!(err, MetatoolsError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_handler_failure_propagates() {
        let runner = make_runner();
        let err = runner.run("broken", Map::new()).await.unwrap_err();
        assert!(err.to_string().contains("intentional failure"));
    }
}
