//! HTTP JSON-RPC Front End (C5): the single `POST /mcp` surface that
//! demultiplexes JSON-RPC calls to the tool registry and, through it, to
//! child supervisors.

use std::sync::{Arc, OnceLock};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::{Json, Router};
use regex::Regex;
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::{RPC_INTERNAL_ERROR, RPC_METHOD_NOT_FOUND, RPC_PARSE_ERROR};
use crate::error::SupervisorError;
use crate::registry::ToolRegistry;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "hydra-gateway";
const SERVER_VERSION: &str = "1.0.0";

fn origin_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://localhost(:\d+)?$").expect("valid regex"))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| origin_regex().is_match(o))
                .unwrap_or(false)
        }))
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

pub fn build_router(registry: Arc<ToolRegistry>) -> Router {
    Router::new()
        .route("/mcp", any(mcp_handler))
        .fallback(not_found)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(registry)
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": "Not found"}))).into_response()
}

async fn mcp_handler(
    method: Method,
    State(registry): State<Arc<ToolRegistry>>,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return not_found().await;
    }

    let text = String::from_utf8_lossy(&body);
    let parsed: Result<Value, _> = serde_json::from_str(&text);
    let value = match parsed {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(error = %err, "parse error on /mcp body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "jsonrpc": "2.0",
                    "id": 0,
                    "error": { "code": RPC_PARSE_ERROR, "message": "Parse error" }
                })),
            )
                .into_response();
        }
    };

    match value {
        Value::Array(items) => {
            // Dispatched concurrently; reassembled in submission order.
            let tasks: Vec<_> = items
                .into_iter()
                .map(|item| {
                    let registry = Arc::clone(&registry);
                    tokio::spawn(async move { dispatch(&registry, item).await })
                })
                .collect();
            let mut responses = Vec::with_capacity(tasks.len());
            for task in tasks {
                responses.push(task.await.unwrap_or_else(|_| {
                    json!({
                        "jsonrpc": "2.0",
                        "id": Value::Null,
                        "error": { "code": RPC_INTERNAL_ERROR, "message": "Internal error" }
                    })
                }));
            }
            (StatusCode::OK, Json(Value::Array(responses))).into_response()
        }
        single => (StatusCode::OK, Json(dispatch(&registry, single).await)).into_response(),
    }
}

async fn dispatch(registry: &ToolRegistry, request: Value) -> Value {
    let id = request.get("id").cloned().unwrap_or(Value::Null);
    let method = request.get("method").and_then(Value::as_str).unwrap_or("");

    tracing::debug!(method, "dispatching /mcp request");

    match method {
        "initialize" => json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": {
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": { "tools": { "listChanged": true } },
                "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION },
            }
        }),
        "tools/list" => {
            let tools: Vec<Value> = registry
                .list_public()
                .iter()
                .map(|t| t.to_value())
                .collect();
            json!({ "jsonrpc": "2.0", "id": id, "result": { "tools": tools } })
        }
        "tools/call" => {
            let result = handle_tools_call(registry, request.get("params")).await;
            json!({ "jsonrpc": "2.0", "id": id, "result": result })
        }
        "ping" => json!({ "jsonrpc": "2.0", "id": id, "result": {} }),
        other => {
            tracing::warn!(method = %other, "unknown method on /mcp");
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": RPC_METHOD_NOT_FOUND, "message": format!("Method not found: {other}") }
            })
        }
    }
}

async fn handle_tools_call(registry: &ToolRegistry, params: Option<&Value>) -> Value {
    let name = params
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let Some(tool) = registry.get(name) else {
        return error_result(format!("Tool not found: {name}"));
    };
    let Some(supervisor) = registry.resolve_supervisor(name) else {
        return error_result(format!("Tool not found: {name}"));
    };

    let arguments = params
        .and_then(|p| p.get("arguments"))
        .cloned()
        .unwrap_or_else(|| json!({}));

    match supervisor.call_tool(&tool.original_name, arguments).await {
        Ok(result) => result,
        Err(SupervisorError::NotReady) => {
            error_result(format!("Server {} is not ready", tool.child_name))
        }
        Err(err) => error_result(format!("Error calling tool {name}: {err}")),
    }
}

fn error_result(text: String) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "isError": true,
    })
}
