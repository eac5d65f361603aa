#![allow(clippy::unwrap_used, clippy::expect_used)]

//! HTTP backend tests against a throwaway axum server on a random port.

use axum::{http::StatusCode, routing::post, Json, Router};
use metatools_core::{MetatoolsError, Tool, ToolBackend};
use metatools_discovery::ToolIndex;
use metatools_exec::{register_builtins, Runner, ToolRunner};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::net::TcpListener;

async fn start_backend() -> String {
    let app = Router::new()
        .route(
            "/sum",
            post(|Json(body): Json<Value>| async move {
                let a = body["a"].as_i64().unwrap_or(0);
                let b = body["b"].as_i64().unwrap_or(0);
                Json(json!({"sum": a + b}))
            }),
        )
        .route("/text", post(|| async { "plain reply" }))
        .route(
            "/headers",
            post(|headers: axum::http::HeaderMap| async move {
                headers
                    .get("x-api-key")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string()
            }),
        )
        .route(
            "/fail",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "backend exploded") }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn http_tool(index: &ToolIndex, name: &str, url: String, headers: BTreeMap<String, String>) {
    index
        .register_tool(
            Tool::new(name, format!("{name} over HTTP")),
            ToolBackend::Http { url, headers },
            None,
        )
        .unwrap();
}

async fn make_runner() -> ToolRunner {
    let base = start_backend().await;
    let index = Arc::new(ToolIndex::new());
    http_tool(&index, "sum", format!("{base}/sum"), BTreeMap::new());
    http_tool(&index, "text", format!("{base}/text"), BTreeMap::new());
    http_tool(
        &index,
        "keyed",
        format!("{base}/headers"),
        BTreeMap::from([("x-api-key".to_string(), "s3cret".to_string())]),
    );
    http_tool(&index, "fail", format!("{base}/fail"), BTreeMap::new());
    index
        .register_tool(Tool::new("echo", "Echo"), ToolBackend::local("echo"), None)
        .unwrap();

    let mut runner = ToolRunner::new(index).unwrap();
    register_builtins(&mut runner);
    runner
}

fn args(v: Value) -> Map<String, Value> {
    v.as_object().cloned().unwrap()
}

#[tokio::test]
async fn http_backend_returns_structured_json() {
    let runner = make_runner().await;
    let result = runner.run("sum", args(json!({"a": 2, "b": 3}))).await.unwrap();
    assert_eq!(result.structured, json!({"sum": 5}));
}

#[tokio::test]
async fn http_backend_non_json_reply_is_string() {
    let runner = make_runner().await;
    let result = runner.run("text", Map::new()).await.unwrap();
    assert_eq!(result.structured, json!("plain reply"));
}

#[tokio::test]
async fn http_backend_sends_configured_headers() {
    let runner = make_runner().await;
    let result = runner.run("keyed", Map::new()).await.unwrap();
    assert_eq!(result.structured, json!("s3cret"));
}

#[tokio::test]
async fn http_backend_error_status_is_upstream_failure() {
    let runner = make_runner().await;
    let err = runner.run("fail", Map::new()).await.unwrap_err();
    assert!(matches!(err, MetatoolsError::Upstream(_)));
    assert!(err.to_string().contains("backend exploded"));
}

#[tokio::test]
async fn builtins_include_echo() {
    let runner = make_runner().await;
    assert_eq!(runner.handler_count(), 1);
    let result = runner.run("echo", args(json!({"x": 1}))).await.unwrap();
    assert_eq!(result.structured, json!({"x": 1}));
}
