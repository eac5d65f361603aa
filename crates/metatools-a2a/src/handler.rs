//! HTTP and JSON-RPC operations of the A2A surface.
//!
//! Business logic lives in [`Agent`] and [`TaskManager`]; this module only
//! decodes requests, calls them and shapes the replies.

use crate::agent::Agent;
use crate::protocol::{
    codes, methods, AgentCard, InvokeParams, JsonRpcRequest, JsonRpcResponse, SkillsResponse,
    TaskIdParams,
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::{Stream, StreamExt};
use metatools_core::MetatoolsError;
use metatools_task::{Artifact, Task, TaskEvent, TaskEventKind, TaskManager, TaskState};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Name reported by the health endpoint.
pub const SERVICE_NAME: &str = "metatools-a2a";

/// An error rendered as `{"error": message}` with an HTTP status.
#[derive(Debug)]
pub struct ApiError {
    /// Response status.
    pub status: StatusCode,
    /// Text placed in the `error` field.
    pub message: String,
}

impl ApiError {
    /// Error with an explicit status.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Plain 404.
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not found")
    }
}

impl From<MetatoolsError> for ApiError {
    fn from(e: MetatoolsError) -> Self {
        let status = match &e {
            MetatoolsError::NotFound(_) => StatusCode::NOT_FOUND,
            MetatoolsError::InvalidRequest(_)
            | MetatoolsError::Json(_)
            | MetatoolsError::Registry(_) => StatusCode::BAD_REQUEST,
            MetatoolsError::Upstream(_) => StatusCode::BAD_GATEWAY,
            MetatoolsError::MisconfiguredAgent(_)
            | MetatoolsError::NoRunner
            | MetatoolsError::Config(_)
            | MetatoolsError::Server(_)
            | MetatoolsError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status.as_u16(), self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Shared state behind every A2A route.
pub struct A2aHandler {
    agent: Arc<Agent>,
    tasks: Arc<TaskManager>,
}

impl A2aHandler {
    /// Wires the agent facade and the task store together.
    pub fn new(agent: Arc<Agent>, tasks: Arc<TaskManager>) -> Self {
        Self { agent, tasks }
    }

    /// The agent facade.
    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    /// The task store.
    pub fn tasks(&self) -> &Arc<TaskManager> {
        &self.tasks
    }

    /// Decodes and dispatches one JSON-RPC request body.
    pub async fn handle_rpc_body(&self, body: &[u8]) -> JsonRpcResponse {
        let value: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                return JsonRpcResponse::error(
                    Value::Null,
                    codes::PARSE_ERROR,
                    format!("parse error: {e}"),
                )
            }
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.dispatch(request).await,
            Err(e) => JsonRpcResponse::error(
                id,
                codes::INVALID_REQUEST,
                format!("invalid request: {e}"),
            ),
        }
    }

    /// Routes a decoded request by method name.
    pub async fn dispatch(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.id.clone().unwrap_or(Value::Null);
        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                id,
                codes::INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            );
        }
        debug!(method = %request.method, "A2A RPC request");

        let outcome = match request.method.as_str() {
            methods::GET_CARD => self
                .agent
                .agent_card()
                .await
                .map_err(|e| rpc_error(&e))
                .and_then(to_result),
            methods::LIST_SKILLS => self
                .agent
                .list_skills()
                .await
                .map_err(|e| rpc_error(&e))
                .and_then(|skills| to_result(SkillsResponse { skills })),
            methods::INVOKE_SKILL => match parse_params::<InvokeParams>(request.params) {
                Ok(p) => self
                    .agent
                    .invoke(&p.skill_id, p.arguments)
                    .await
                    .map_err(|e| rpc_error(&e))
                    .and_then(to_result),
                Err(e) => Err(e),
            },
            methods::SEND_TASK => match parse_params::<InvokeParams>(request.params) {
                Ok(p) => self
                    .send_task(p.skill_id, p.arguments)
                    .map_err(|e| rpc_error(&e))
                    .and_then(to_result),
                Err(e) => Err(e),
            },
            methods::GET_TASK => parse_params::<TaskIdParams>(request.params).and_then(|p| {
                self.tasks
                    .get(&p.id)
                    .ok_or_else(|| task_not_found(&p.id))
                    .and_then(to_result)
            }),
            methods::LIST_TASKS => to_result(json!({ "tasks": self.tasks.list() })),
            methods::CANCEL_TASK => parse_params::<TaskIdParams>(request.params).and_then(|p| {
                self.tasks
                    .cancel(&p.id)
                    .map_err(|e| match e {
                        MetatoolsError::NotFound(_) => task_not_found(&p.id),
                        MetatoolsError::InvalidRequest(msg) => {
                            (codes::TASK_NOT_CANCELABLE, msg)
                        }
                        other => rpc_error(&other),
                    })
                    .and_then(to_result)
            }),
            other => Err((
                codes::METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err((code, message)) => {
                warn!(method = %request.method, code, error = %message, "A2A RPC failed");
                JsonRpcResponse::error(id, code, message)
            }
        }
    }

    /// Creates a task for `skill_id` and runs it in the background.
    pub fn send_task(
        &self,
        skill_id: String,
        arguments: Map<String, Value>,
    ) -> Result<Task, MetatoolsError> {
        if !self.agent.has_runner() {
            return Err(MetatoolsError::NoRunner);
        }
        let task = self.tasks.create(Some(skill_id.clone()));
        let cancel = self
            .tasks
            .cancellation_token(&task.id)
            .unwrap_or_default();

        tokio::spawn(run_task(
            self.agent.clone(),
            self.tasks.clone(),
            task.id.clone(),
            skill_id,
            arguments,
            cancel,
        ));
        Ok(task)
    }

    /// Event stream for one task as server-sent events.
    pub fn task_events(
        &self,
        id: &str,
    ) -> Result<impl Stream<Item = Result<Event, axum::Error>> + Send + 'static, MetatoolsError>
    {
        let subscription = self.tasks.subscribe(id)?;
        Ok(subscription.into_stream().map(|event| sse_event(&event)))
    }
}

/// Worker body of a background task.
async fn run_task(
    agent: Arc<Agent>,
    tasks: Arc<TaskManager>,
    task_id: String,
    skill_id: String,
    arguments: Map<String, Value>,
    cancel: CancellationToken,
) {
    if let Err(e) = tasks.transition(&task_id, TaskState::Working, None) {
        debug!(task_id = %task_id, error = %e, "Task not started");
        return;
    }

    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            info!(task_id = %task_id, "Task worker abandoned after cancel");
            return;
        }
        result = agent.invoke(&skill_id, arguments) => result,
    };

    let finished = match outcome {
        Ok(result) => tasks
            .add_artifact(&task_id, Artifact::new(result.content).with_name(skill_id))
            .and_then(|_| tasks.transition(&task_id, TaskState::Completed, None)),
        Err(e) => tasks.transition(&task_id, TaskState::Failed, Some(e.to_string())),
    };
    if let Err(e) = finished {
        // Canceled while the invocation was finishing.
        debug!(task_id = %task_id, error = %e, "Task result discarded");
    }
}

fn sse_event(event: &TaskEvent) -> Result<Event, axum::Error> {
    let name = match event.kind {
        TaskEventKind::Status { .. } => "status",
        TaskEventKind::Artifact { .. } => "artifact",
    };
    Event::default()
        .event(name)
        .id(event.sequence.to_string())
        .json_data(event)
}

type RpcFailure = (i64, String);

fn to_result<T: serde::Serialize>(value: T) -> Result<Value, RpcFailure> {
    serde_json::to_value(value).map_err(|e| (codes::INTERNAL_ERROR, e.to_string()))
}

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcFailure> {
    serde_json::from_value(params.unwrap_or(Value::Null))
        .map_err(|e| (codes::INVALID_PARAMS, format!("invalid params: {e}")))
}

fn task_not_found(id: &str) -> RpcFailure {
    (codes::TASK_NOT_FOUND, format!("task not found: {id}"))
}

fn rpc_error(e: &MetatoolsError) -> RpcFailure {
    let code = match e {
        MetatoolsError::NotFound(_)
        | MetatoolsError::InvalidRequest(_)
        | MetatoolsError::Json(_)
        | MetatoolsError::Registry(_) => codes::INVALID_PARAMS,
        MetatoolsError::Upstream(_) => codes::UPSTREAM_FAILURE,
        MetatoolsError::MisconfiguredAgent(_)
        | MetatoolsError::NoRunner
        | MetatoolsError::Config(_)
        | MetatoolsError::Server(_)
        | MetatoolsError::Io(_) => codes::INTERNAL_ERROR,
    };
    (code, e.to_string())
}

// ---------------------------------------------------------------------------
// axum handlers
// ---------------------------------------------------------------------------

pub(crate) async fn serve_rpc(
    State(handler): State<Arc<A2aHandler>>,
    body: Bytes,
) -> Json<JsonRpcResponse> {
    Json(handler.handle_rpc_body(&body).await)
}

pub(crate) async fn serve_agent_card(
    State(handler): State<Arc<A2aHandler>>,
) -> Result<Json<AgentCard>, ApiError> {
    Ok(Json(handler.agent.agent_card().await?))
}

pub(crate) async fn serve_skills(
    State(handler): State<Arc<A2aHandler>>,
) -> Result<Json<SkillsResponse>, ApiError> {
    let skills = handler.agent.list_skills().await?;
    Ok(Json(SkillsResponse { skills }))
}

pub(crate) async fn serve_task_list(State(handler): State<Arc<A2aHandler>>) -> Json<Value> {
    Json(json!({ "tasks": handler.tasks.list() }))
}

pub(crate) async fn serve_task(handler: &A2aHandler, id: &str) -> Result<Json<Task>, ApiError> {
    handler
        .tasks
        .get(id)
        .map(Json)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, format!("task not found: {id}")))
}

pub(crate) async fn serve_task_events(handler: &A2aHandler, id: &str) -> Result<Response, ApiError> {
    let stream = handler.task_events(id)?;
    Ok(Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

pub(crate) async fn serve_health() -> Json<Value> {
    Json(json!({ "status": "ok", "service": SERVICE_NAME }))
}
