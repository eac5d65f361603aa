//! Path layout of the A2A surface under a configurable base path.

use crate::handler::{
    serve_agent_card, serve_health, serve_rpc, serve_skills, serve_task, serve_task_events,
    serve_task_list, A2aHandler, ApiError,
};
use axum::{
    extract::State,
    http::Uri,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Base path used when none is configured.
pub const DEFAULT_BASE_PATH: &str = "/a2a";

/// A resolved `{base}/tasks/...` sub-resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRoute<'a> {
    /// `{base}/tasks/{id}`
    Task(&'a str),
    /// `{base}/tasks/{id}/events`
    Events(&'a str),
}

/// Normalizes a configured base path: leading `/`, no trailing `/`.
///
/// Empty selects [`DEFAULT_BASE_PATH`]; `/` mounts at the root and yields
/// an empty prefix.
pub fn normalize_base_path(base: &str) -> String {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return DEFAULT_BASE_PATH.to_string();
    }
    let inner = trimmed.trim_matches('/');
    if inner.is_empty() {
        String::new()
    } else {
        format!("/{inner}")
    }
}

/// Resolves a request path below `{base}/tasks/`.
///
/// Exactly one non-empty segment is a task, two segments ending in
/// `events` are its event stream, and anything else is `None`.
pub fn parse_task_path<'a>(path: &'a str, base: &str) -> Option<TaskRoute<'a>> {
    let rest = path.strip_prefix(base)?.strip_prefix("/tasks/")?;
    let parts: Vec<&str> = rest.split('/').collect();
    match parts.as_slice() {
        [id] if !id.is_empty() => Some(TaskRoute::Task(id)),
        [id, "events"] if !id.is_empty() => Some(TaskRoute::Events(id)),
        _ => None,
    }
}

/// Builds the A2A router mounted at `base_path`.
///
/// | Path | Method |
/// |---|---|
/// | `{base}` | POST JSON-RPC |
/// | `{base}/agent-card` | GET |
/// | `{base}/skills` | GET |
/// | `{base}/tasks` | GET |
/// | `{base}/tasks/{id}` | GET |
/// | `{base}/tasks/{id}/events` | GET, server-sent events |
/// | `{base}/health` | GET |
pub fn build_router(handler: Arc<A2aHandler>, base_path: &str) -> Router {
    let base = normalize_base_path(base_path);
    let rpc_path = if base.is_empty() { "/".to_string() } else { base.clone() };

    Router::new()
        .route(&rpc_path, post(serve_rpc))
        .route(&format!("{base}/agent-card"), get(serve_agent_card))
        .route(&format!("{base}/skills"), get(serve_skills))
        .route(&format!("{base}/tasks"), get(serve_task_list))
        .route(&format!("{base}/health"), get(serve_health))
        .fallback(move |state: State<Arc<A2aHandler>>, uri: Uri| {
            let base = base.clone();
            async move { task_fallback(state, uri, base).await }
        })
        .with_state(handler)
}

async fn task_fallback(State(handler): State<Arc<A2aHandler>>, uri: Uri, base: String) -> Response {
    let result = match parse_task_path(uri.path(), &base) {
        Some(TaskRoute::Task(id)) => serve_task(&handler, id).await.map(IntoResponse::into_response),
        Some(TaskRoute::Events(id)) => serve_task_events(&handler, id).await,
        None => Err(ApiError::not_found()),
    };
    result.unwrap_or_else(IntoResponse::into_response)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_task_path() {
        let base = "/a2a";
        assert_eq!(parse_task_path("/a2a/tasks/42", base), Some(TaskRoute::Task("42")));
        assert_eq!(
            parse_task_path("/a2a/tasks/42/events", base),
            Some(TaskRoute::Events("42"))
        );
    }

    #[test]
    fn test_parse_task_path_malformed() {
        let base = "/a2a";
        for path in [
            "/a2a/tasks/",
            "/a2a/tasks//events",
            "/a2a/tasks/42/extra",
            "/a2a/tasks/42/",
            "/a2a/tasks/42/events/more",
            "/a2a/tasks",
            "/other/tasks/42",
        ] {
            assert_eq!(parse_task_path(path, base), None, "{path}");
        }
    }

    #[test]
    fn test_parse_task_path_root_base() {
        assert_eq!(parse_task_path("/tasks/7", ""), Some(TaskRoute::Task("7")));
    }

    #[test]
    fn test_normalize_base_path() {
        assert_eq!(normalize_base_path(""), "/a2a");
        assert_eq!(normalize_base_path("  "), "/a2a");
        assert_eq!(normalize_base_path("a2a"), "/a2a");
        assert_eq!(normalize_base_path("/api/a2a/"), "/api/a2a");
        assert_eq!(normalize_base_path("/"), "");
    }
}
