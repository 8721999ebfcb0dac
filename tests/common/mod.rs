//! Shared test utilities for integration tests.
//!
//! [`MockKernel`] is an in-memory stand-in for the agentkernel service served
//! by axum on a random local port. It keeps sandboxes and files in memory,
//! records every request it receives, and picks streaming behaviour from the
//! first word of the command.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentkernel_rs::client::AgentKernelClient;
use axum::body::{Body, Bytes};
use axum::extract::{Path, Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

/// One request as seen by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// JSON body, if the request had one.
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct KernelState {
    sandboxes: HashMap<String, Value>,
    files: HashMap<(String, String), String>,
    logs: HashMap<String, Vec<Value>>,
    requests: Vec<RecordedRequest>,
}

/// In-memory agentkernel service.
#[derive(Debug, Clone, Default)]
pub struct MockKernel {
    state: Arc<Mutex<KernelState>>,
    api_key: Option<String>,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject requests without `Authorization: Bearer <key>`.
    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    /// The most recent request with this method and path.
    pub fn last(&self, method: Method, path: &str) -> Option<RecordedRequest> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
    }

    /// Number of received requests with this method and path.
    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    pub fn sandbox_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().unwrap().sandboxes.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn file(&self, sandbox: &str, path: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&(sandbox.to_string(), path.to_string()))
            .cloned()
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/run", post(run))
            .route("/run/stream", post(run_stream))
            .route("/sandboxes", get(list_sandboxes).post(create_sandbox))
            .route("/sandboxes/{name}", get(get_sandbox).delete(remove_sandbox))
            .route("/sandboxes/{name}/exec", post(exec))
            .route("/sandboxes/{name}/logs", get(logs))
            .route(
                "/sandboxes/{name}/files/{*path}",
                get(read_file).put(write_file).delete(delete_file),
            )
            .route("/batch/run", post(batch_run))
            .layer(middleware::from_fn_with_state(self.clone(), record_and_authorize))
            .with_state(self.clone())
    }
}

/// Start a mock server on a random port. Returns the base URL and a handle to shut it down.
pub async fn start_mock_server(kernel: MockKernel) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let base_url = format!("http://{}", addr);

    let app = kernel.router();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Brief wait for the server to start accepting connections.
    tokio::time::sleep(Duration::from_millis(50)).await;

    (base_url, handle)
}

/// Start a mock server on its own background runtime, for tests that drive
/// the blocking client from a plain thread.
pub fn start_mock_server_in_background(kernel: MockKernel) -> String {
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(format!("http://{}", listener.local_addr().unwrap()))
                .unwrap();
            axum::serve(listener, kernel.router()).await.unwrap();
        });
    });
    rx.recv().unwrap()
}

/// Async client pointed at `base_url`.
pub fn client_for(base_url: &str) -> AgentKernelClient {
    AgentKernelClient::builder()
        .with_base_url(base_url)
        .with_timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Wait until `check` holds, polling for up to two seconds.
pub async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}

// ---------------------------------------------------------------------------
// Envelope helpers
// ---------------------------------------------------------------------------

fn ok(data: Value) -> Response {
    Json(json!({"success": true, "data": data})).into_response()
}

fn fail(status: StatusCode, error: &str) -> Response {
    (status, Json(json!({"success": false, "error": error}))).into_response()
}

fn command_of(body: &Value) -> Vec<String> {
    body["command"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// Fake command execution: `echo` prints its arguments, `fail` fails,
/// anything else reports what would have run.
fn execute(command: &[String]) -> Result<String, String> {
    match command.first().map(String::as_str) {
        Some("echo") => Ok(format!("{}\n", command[1..].join(" "))),
        Some("fail") => Err(format!("command failed: {}", command[1..].join(" "))),
        Some(_) => Ok(format!("ran: {}\n", command.join(" "))),
        None => Err("command must not be empty".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn record_and_authorize(
    State(kernel): State<MockKernel>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_default();
    kernel.state.lock().unwrap().requests.push(RecordedRequest {
        method: parts.method.clone(),
        path: parts.uri.path().to_string(),
        headers: parts.headers.clone(),
        body: serde_json::from_slice(&bytes).ok(),
    });
    let request = Request::from_parts(parts, Body::from(bytes));

    if let Some(key) = &kernel.api_key {
        let expected = format!("Bearer {key}");
        let presented = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        if presented != Some(expected.as_str()) {
            return fail(StatusCode::UNAUTHORIZED, "Unauthorized");
        }
    }

    next.run(request).await
}

async fn health() -> Response {
    ok(json!("ok"))
}

async fn run(Json(body): Json<Value>) -> Response {
    let command = command_of(&body);
    // `sleep <ms>` answers late.
    if command.first().map(String::as_str) == Some("sleep") {
        let millis = command.get(1).and_then(|ms| ms.parse().ok()).unwrap_or(1000);
        tokio::time::sleep(Duration::from_millis(millis)).await;
    }
    match execute(&command) {
        Ok(output) => ok(json!({"output": output})),
        // Logical failures come back on a success status.
        Err(error) => Json(json!({"success": false, "error": error})).into_response(),
    }
}

async fn list_sandboxes(State(kernel): State<MockKernel>) -> Response {
    let state = kernel.state.lock().unwrap();
    let mut sandboxes: Vec<Value> = state.sandboxes.values().cloned().collect();
    sandboxes.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
    ok(Value::Array(sandboxes))
}

async fn create_sandbox(State(kernel): State<MockKernel>, Json(body): Json<Value>) -> Response {
    let Some(name) = body["name"].as_str().filter(|n| !n.is_empty()) else {
        return fail(StatusCode::BAD_REQUEST, "name is required");
    };
    let mut state = kernel.state.lock().unwrap();
    if state.sandboxes.contains_key(name) {
        return fail(StatusCode::BAD_REQUEST, "Sandbox already exists");
    }
    let info = json!({
        "name": name,
        "status": "running",
        "backend": "docker",
        "image": body.get("image").cloned().unwrap_or_else(|| json!("alpine:3.20")),
        "vcpus": body.get("vcpus").cloned().unwrap_or(json!(1)),
        "memory_mb": body.get("memory_mb").cloned().unwrap_or(json!(512)),
        "created_at": "2026-01-15T10:30:00Z",
    });
    state.sandboxes.insert(name.to_string(), info.clone());
    state
        .logs
        .entry(name.to_string())
        .or_default()
        .push(json!({"event": "created", "sandbox": name}));
    (StatusCode::CREATED, Json(json!({"success": true, "data": info}))).into_response()
}

async fn get_sandbox(State(kernel): State<MockKernel>, Path(name): Path<String>) -> Response {
    match name.as_str() {
        // Non-JSON failure body.
        "teapot" => return (StatusCode::IM_A_TEAPOT, "short and stout").into_response(),
        "broken" => return fail(StatusCode::INTERNAL_SERVER_ERROR, "backend unavailable"),
        "garbled" => return ok(json!({"name": 42})),
        // Failure status whose body is cut off mid-transfer.
        "cutoff" => {
            return Response::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from_stream(async_stream::stream! {
                    yield Ok::<_, std::io::Error>(Bytes::from_static(b"{\"success\":fal"));
                    yield Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset"));
                }))
                .unwrap()
        }
        _ => {}
    }
    let state = kernel.state.lock().unwrap();
    match state.sandboxes.get(&name) {
        Some(info) => ok(info.clone()),
        None => fail(StatusCode::NOT_FOUND, "Not found"),
    }
}

async fn remove_sandbox(State(kernel): State<MockKernel>, Path(name): Path<String>) -> Response {
    let mut state = kernel.state.lock().unwrap();
    if state.sandboxes.remove(&name).is_none() {
        return fail(StatusCode::NOT_FOUND, "Not found");
    }
    state.files.retain(|(sandbox, _), _| sandbox != &name);
    ok(json!("removed"))
}

async fn exec(
    State(kernel): State<MockKernel>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    let command = command_of(&body);
    let mut state = kernel.state.lock().unwrap();
    if !state.sandboxes.contains_key(&name) {
        return fail(StatusCode::NOT_FOUND, "Not found");
    }
    state
        .logs
        .entry(name.clone())
        .or_default()
        .push(json!({"event": "exec", "command": command}));
    match execute(&command) {
        Ok(output) => ok(json!({"output": output})),
        Err(error) => Json(json!({"success": false, "error": error})).into_response(),
    }
}

async fn logs(State(kernel): State<MockKernel>, Path(name): Path<String>) -> Response {
    let state = kernel.state.lock().unwrap();
    if !state.sandboxes.contains_key(&name) {
        return fail(StatusCode::NOT_FOUND, "Not found");
    }
    ok(Value::Array(state.logs.get(&name).cloned().unwrap_or_default()))
}

async fn read_file(
    State(kernel): State<MockKernel>,
    Path((name, path)): Path<(String, String)>,
) -> Response {
    let state = kernel.state.lock().unwrap();
    match state.files.get(&(name, path)) {
        Some(content) => ok(json!({
            "content": content,
            "encoding": "utf8",
            "size": content.len(),
        })),
        None => fail(StatusCode::NOT_FOUND, "File not found"),
    }
}

async fn write_file(
    State(kernel): State<MockKernel>,
    Path((name, path)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Response {
    let Some(content) = body["content"].as_str() else {
        return fail(StatusCode::BAD_REQUEST, "content is required");
    };
    if !matches!(body["encoding"].as_str(), Some("utf8") | Some("base64")) {
        return fail(StatusCode::BAD_REQUEST, "unsupported encoding");
    }
    let mut state = kernel.state.lock().unwrap();
    if !state.sandboxes.contains_key(&name) {
        return fail(StatusCode::NOT_FOUND, "Not found");
    }
    let message = format!("Wrote {} bytes to {}", content.len(), path);
    state.files.insert((name, path), content.to_string());
    ok(json!(message))
}

async fn delete_file(
    State(kernel): State<MockKernel>,
    Path((name, path)): Path<(String, String)>,
) -> Response {
    let mut state = kernel.state.lock().unwrap();
    match state.files.remove(&(name, path.clone())) {
        Some(_) => ok(json!(format!("Deleted {path}"))),
        None => fail(StatusCode::NOT_FOUND, "File not found"),
    }
}

async fn batch_run(Json(body): Json<Value>) -> Response {
    let commands = body["commands"].as_array().cloned().unwrap_or_default();
    let results: Vec<Value> = commands
        .iter()
        .map(|entry| match execute(&command_of(entry)) {
            Ok(output) => json!({"output": output}),
            Err(error) => json!({"error": error}),
        })
        .collect();
    ok(json!({"results": results}))
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

fn sse(event: &str, data: Value) -> String {
    format!("event: {event}\ndata: {data}\n\n")
}

fn event_stream_response<S>(body: S) -> Response
where
    S: futures::Stream<Item = Result<Bytes, Infallible>> + Send + 'static,
{
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body))
        .unwrap()
}

/// `/run/stream`. The first word of the command selects the scenario:
///
/// - `echo`: started, one output, done
/// - `noisy`: keep-alive comments and unknown event names around the real events
/// - `chatty`: more events after `done`
/// - `rawdata`: an output frame whose payload is not JSON
/// - `chunked`: frames split across many small body chunks
/// - `crash`: an `error` event
/// - `truncated`: body ends before any terminal event
/// - `hang`: started, then nothing until the client goes away
/// - `slow <n> <ms>`: `n` output events `ms` apart, then done
/// - `reject`: `400` before any event
/// - `jsonreply`: a JSON envelope on a success status
async fn run_stream(Json(body): Json<Value>) -> Response {
    let command = command_of(&body);
    let rest = command.get(1..).unwrap_or_default().join(" ");

    match command.first().map(String::as_str).unwrap_or_default() {
        "reject" => fail(StatusCode::BAD_REQUEST, "invalid command"),
        "jsonreply" => ok(json!({"output": "not a stream"})),
        "hang" => event_stream_response(async_stream::stream! {
            yield Ok(Bytes::from(sse("started", json!({"sandbox": "hang-1"}))));
            std::future::pending::<()>().await;
        }),
        "slow" => {
            let count: u32 = command.get(1).and_then(|n| n.parse().ok()).unwrap_or(8);
            let gap: u64 = command.get(2).and_then(|ms| ms.parse().ok()).unwrap_or(300);
            event_stream_response(async_stream::stream! {
                for i in 0..count {
                    yield Ok(Bytes::from(sse("output", json!({"data": format!("tick {i}\n")}))));
                    tokio::time::sleep(Duration::from_millis(gap)).await;
                }
                yield Ok(Bytes::from(sse("done", json!({"exit_code": 0}))));
            })
        }
        "chunked" => {
            let text = format!(
                "{}{}{}",
                sse("started", json!({})),
                sse("output", json!({"data": "héllo wörld\n"})),
                sse("done", json!({"exit_code": 0})),
            );
            event_stream_response(async_stream::stream! {
                for chunk in text.as_bytes().chunks(3) {
                    yield Ok(Bytes::copy_from_slice(chunk));
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            })
        }
        scenario => {
            let frames: Vec<String> = match scenario {
                "noisy" => vec![
                    ": keep-alive\n\n".to_string(),
                    sse("started", json!({})),
                    sse("heartbeat", json!({"ts": 1})),
                    "data: {\"orphan\":true}\n\n".to_string(),
                    sse("output", json!({"data": "line\n"})),
                    sse("done", json!({"exit_code": 0})),
                ],
                "chatty" => vec![
                    sse("output", json!({"data": "one\n"})),
                    sse("done", json!({"exit_code": 3})),
                    sse("output", json!({"data": "late\n"})),
                ],
                "rawdata" => vec![
                    "event: output\ndata: plain text, not json\n\n".to_string(),
                    sse("done", json!({"exit_code": 0})),
                ],
                "crash" => vec![
                    sse("started", json!({})),
                    sse("output", json!({"data": "partial\n"})),
                    sse("error", json!({"message": "sandbox crashed"})),
                ],
                "truncated" => vec![
                    sse("started", json!({})),
                    sse("output", json!({"data": "partial\n"})),
                ],
                _ => vec![
                    sse("started", json!({"sandbox": "run-1"})),
                    sse("progress", json!({"stage": "booting"})),
                    sse(
                        "output",
                        json!({"data": format!("{rest}\n"), "stream": "stdout"}),
                    ),
                    sse("done", json!({"exit_code": 0})),
                ],
            };
            event_stream_response(async_stream::stream! {
                for frame in frames {
                    yield Ok(Bytes::from(frame));
                }
            })
        }
    }
}
