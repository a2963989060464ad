//! Test utilities for tally-core
//!
//! This module provides a mock of the hosted Generative Language REST API
//! that backend and CLI tests can point `GeminiBackend` at.
//!
//! Special model names and keys trigger the provider's failure payloads:
//! - `MISSING_MODEL` answers 404 NOT_FOUND
//! - `RATE_LIMITED_MODEL` answers 429 RESOURCE_EXHAUSTED
//! - `EMPTY_MODEL` answers 200 with no candidates
//! - `BAD_KEY` as the API key answers 400 API_KEY_INVALID
//!
//! Any other model gets the same keyword heuristic as `MockBackend`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::ai::{heuristic_reply, ModelRequest, ToolSchema};

#[derive(Clone)]
struct ServerState {
    requests: Arc<AtomicUsize>,
    /// Fixed status and body for every generateContent call
    scripted: Option<(StatusCode, Value)>,
}

/// Mock Generative Language API server for testing
pub struct MockGeminiServer {
    addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockGeminiServer {
    pub const MISSING_MODEL: &'static str = "missing-model";
    pub const RATE_LIMITED_MODEL: &'static str = "rate-limited-model";
    pub const EMPTY_MODEL: &'static str = "empty-model";
    pub const BAD_KEY: &'static str = "bad-key";

    /// Start the mock server on an available port
    pub async fn start() -> Self {
        Self::spawn(None).await
    }

    /// Start a server that answers every generateContent call with `status` and `body`
    pub async fn start_scripted(status: u16, body: Value) -> Self {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::spawn(Some((status, body))).await
    }

    async fn spawn(scripted: Option<(StatusCode, Value)>) -> Self {
        let requests = Arc::new(AtomicUsize::new(0));
        let state = ServerState {
            requests: requests.clone(),
            scripted,
        };

        let app = Router::new()
            .route("/v1beta/models", get(handle_list_models))
            .route("/v1beta/models/:model_action", post(handle_generate))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            requests,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Requests received so far (all endpoints)
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockGeminiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn api_error(status: StatusCode, message: &str, status_name: &str) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({
            "error": {
                "code": status.as_u16(),
                "message": message,
                "status": status_name,
            }
        })),
    )
}

fn bad_key(headers: &HeaderMap) -> Option<(StatusCode, Json<Value>)> {
    let key = headers
        .get("x-goog-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if key.is_empty() {
        return Some(api_error(
            StatusCode::FORBIDDEN,
            "Method doesn't allow unregistered callers.",
            "PERMISSION_DENIED",
        ));
    }
    if key == MockGeminiServer::BAD_KEY {
        return Some((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT",
                    "details": [{"reason": "API_KEY_INVALID"}]
                }
            })),
        ));
    }
    None
}

/// models.list
async fn handle_list_models(
    State(state): State<ServerState>,
    headers: HeaderMap,
) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if let Some(rejection) = bad_key(&headers) {
        return rejection;
    }
    (
        StatusCode::OK,
        Json(json!({
            "models": [
                {"name": "models/gemini-2.0-flash"},
                {"name": "models/gemini-1.5-flash"},
                {"name": "models/gemini-1.5-pro"}
            ]
        })),
    )
}

/// models.generateContent
async fn handle_generate(
    State(state): State<ServerState>,
    Path(model_action): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.fetch_add(1, Ordering::SeqCst);
    if let Some(rejection) = bad_key(&headers) {
        return rejection;
    }

    let Some(model) = model_action.strip_suffix(":generateContent") else {
        return api_error(StatusCode::NOT_FOUND, "Unknown method", "NOT_FOUND");
    };

    if let Some((status, body)) = &state.scripted {
        return (*status, Json(body.clone()));
    }

    match model {
        MockGeminiServer::MISSING_MODEL => api_error(
            StatusCode::NOT_FOUND,
            &format!("models/{} is not found for API version v1beta", model),
            "NOT_FOUND",
        ),
        MockGeminiServer::RATE_LIMITED_MODEL => api_error(
            StatusCode::TOO_MANY_REQUESTS,
            "Resource has been exhausted (e.g. check quota).",
            "RESOURCE_EXHAUSTED",
        ),
        MockGeminiServer::EMPTY_MODEL => (StatusCode::OK, Json(json!({"candidates": []}))),
        _ => (StatusCode::OK, Json(generate_reply(model, &body))),
    }
}

/// Build a generateContent response from the request body
fn generate_reply(model: &str, body: &Value) -> Value {
    let prompt = body["contents"][0]["parts"][0]["text"]
        .as_str()
        .unwrap_or_default();
    let mut request = ModelRequest::text(prompt);
    if let Some(name) = body["tools"][0]["functionDeclarations"][0]["name"].as_str() {
        request = request.with_tool(ToolSchema::new(name, "", json!({})));
    }

    let reply = heuristic_reply(model, &request);
    let mut parts = Vec::new();
    if let Some(text) = reply.text {
        parts.push(json!({"text": text}));
    }
    if let Some(call) = reply.call {
        parts.push(json!({"functionCall": {"name": call.name, "args": call.args}}));
    }

    json!({
        "candidates": [{
            "content": {"role": "model", "parts": parts},
            "finishReason": "STOP"
        }],
        "modelVersion": model
    })
}
