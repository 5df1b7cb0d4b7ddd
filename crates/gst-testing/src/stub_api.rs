//! In-process stub of the government e-invoice HTTP API.
//!
//! Responses are scripted per path: queued responses are served first, in
//! order, then the path's default. Every request is recorded so tests can
//! assert on call counts, headers and bodies.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
};
use serde_json::{Value, json};
use tokio::task::JoinHandle;

pub const AUTH_PATH: &str = "/eivital/v1.04/auth";
pub const GENERATE_IRN_PATH: &str = "/eicore/v1.03/Invoice";
pub const CANCEL_IRN_PATH: &str = "/eicore/v1.03/Invoice/Cancel";

/// Path of the GSTIN master lookup used as the connection check.
pub fn gstin_lookup_path(gstin: &str) -> String {
    format!("/eivital/v1.04/Master/gstin/{gstin}")
}

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl StubResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        Self { status, body }
    }

    /// `200 {Status: 1, Data: data}`.
    pub fn accepted(data: Value) -> Self {
        Self::new(StatusCode::OK, json!({ "Status": 1, "Data": data }))
    }

    /// `200 {Status: 0, ErrorDetails: [{code, message}]}`.
    pub fn refused(code: &str, message: &str) -> Self {
        Self::new(
            StatusCode::OK,
            json!({
                "Status": 0,
                "ErrorDetails": [{ "ErrorCode": code, "ErrorMessage": message }],
            }),
        )
    }

    /// Successful auth exchange issuing `token`, valid far into the future.
    pub fn auth_token(token: &str) -> Self {
        Self::accepted(json!({
            "AuthToken": token,
            "TokenExpiry": "2099-12-31 23:59:59",
        }))
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            json!({
                "Status": 0,
                "ErrorDetails": [{ "ErrorCode": "1005", "ErrorMessage": "Invalid Token" }],
            }),
        )
    }
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<StubResponse>>,
    defaults: HashMap<String, StubResponse>,
    requests: Vec<RecordedRequest>,
}

type Shared = Arc<Mutex<Script>>;

/// Running stub server bound to an ephemeral localhost port.
///
/// The server task is aborted when the stub is dropped.
pub struct StubEinvoiceApi {
    base_url: String,
    script: Shared,
    server: JoinHandle<()>,
}

impl StubEinvoiceApi {
    pub async fn start() -> Self {
        let script: Shared = Arc::default();
        let app = Router::new()
            .fallback(respond)
            .with_state(Arc::clone(&script));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind stub e-invoice API");
        let addr = listener.local_addr().expect("stub has no local address");
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("stub server error");
        });
        Self {
            base_url: format!("http://{addr}"),
            script,
            server,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Serve `response` for the next unanswered request to `path`.
    pub fn enqueue(&self, path: &str, response: StubResponse) {
        self.lock()
            .queued
            .entry(path.to_owned())
            .or_default()
            .push_back(response);
    }

    /// Serve `response` for `path` whenever nothing is queued.
    pub fn set_default(&self, path: &str, response: StubResponse) {
        self.lock().defaults.insert(path.to_owned(), response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.path == path)
            .cloned()
            .collect()
    }

    pub fn calls(&self, path: &str) -> usize {
        self.lock().requests.iter().filter(|r| r.path == path).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().expect("stub script lock poisoned")
    }
}

impl Drop for StubEinvoiceApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn respond(
    State(script): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let path = uri.path().to_owned();
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let mut script = script.lock().expect("stub script lock poisoned");
    script.requests.push(RecordedRequest {
        method,
        path: path.clone(),
        headers,
        body,
    });

    let queued = script.queued.get_mut(&path).and_then(VecDeque::pop_front);
    match queued.or_else(|| script.defaults.get(&path).cloned()) {
        Some(r) => (r.status, Json(r.body)),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "Status": 0,
                "ErrorDetails": [{
                    "ErrorCode": "404",
                    "ErrorMessage": format!("no stub for {path}"),
                }],
            })),
        ),
    }
}
