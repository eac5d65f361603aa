use async_trait::async_trait;
use metatools_core::MetatoolsResult;
use serde_json::{Map, Value};

/// An in-process tool implementation, addressed by a `local` backend.
#[async_trait]
pub trait LocalHandler: Send + Sync {
    /// Name that `ToolBackend::Local { name }` refers to.
    fn name(&self) -> &str;

    async fn call(&self, args: Map<String, Value>) -> MetatoolsResult<Value>;
}

/// Returns its arguments unchanged.
pub struct EchoHandler;

#[async_trait]
impl LocalHandler for EchoHandler {
    fn name(&self) -> &str {
        "echo"
    }

    async fn call(&self, args: Map<String, Value>) -> MetatoolsResult<Value> {
        // A lone "message" argument echoes as plain text.
        if args.len() == 1 {
            if let Some(Value::String(message)) = args.get("message") {
                return Ok(Value::String(message.clone()));
            }
        }
        Ok(Value::Object(args))
    }
}
