//! Scripted in-process mock of the gait-analysis backend.
//!
//! Binds a real axum server on an ephemeral port so the client under
//! test exercises its actual HTTP stack. The status endpoint replays a
//! scripted sequence of replies, then repeats a fallback; counters and
//! timestamps allow asserting what the client did (or never did).

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

/// One scripted reply from `GET /api/v1/analysis/{id}`.
#[derive(Debug, Clone)]
pub enum StatusReply {
    /// HTTP 404, the record is not visible.
    NotFound,
    /// An arbitrary non-success HTTP status.
    Error(u16),
    /// HTTP 200 with the given JSON body.
    Ok(serde_json::Value),
}

impl StatusReply {
    pub fn processing(step: &str, progress: u8, message: Option<&str>) -> Self {
        StatusReply::Ok(serde_json::json!({
            "status": "processing",
            "current_step": step,
            "step_progress": progress,
            "step_message": message,
        }))
    }

    pub fn completed(step_progress: Option<u8>, metrics: Option<serde_json::Value>) -> Self {
        let mut body = serde_json::json!({ "status": "completed" });
        if let Some(progress) = step_progress {
            body["step_progress"] = progress.into();
        }
        if let Some(metrics) = metrics {
            body["metrics"] = metrics;
        }
        StatusReply::Ok(body)
    }

    pub fn failed(error: &str) -> Self {
        StatusReply::Ok(serde_json::json!({
            "status": "failed",
            "error": error,
        }))
    }

    fn into_response(self) -> Response {
        match self {
            StatusReply::NotFound => (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({"detail": "Analysis not found"})),
            )
                .into_response(),
            StatusReply::Error(code) => (
                StatusCode::from_u16(code).unwrap(),
                Json(serde_json::json!({"detail": "backend error"})),
            )
                .into_response(),
            StatusReply::Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        }
    }
}

struct BackendState {
    healthy: AtomicBool,
    upload_calls: AtomicUsize,
    status_calls: AtomicUsize,
    upload_reply: Mutex<(u16, serde_json::Value)>,
    script: Mutex<VecDeque<StatusReply>>,
    fallback: Mutex<StatusReply>,
    upload_finished_at: Mutex<Option<Instant>>,
    first_status_at: Mutex<Option<Instant>>,
    list_body: Mutex<serde_json::Value>,
    report_body: Mutex<serde_json::Value>,
    last_report_audience: Mutex<Option<String>>,
}

/// Handle to a running mock backend.
pub struct MockBackend {
    pub base_url: String,
    state: Arc<BackendState>,
}

impl MockBackend {
    /// Start a mock backend on an ephemeral local port.
    ///
    /// Defaults: healthy, uploads accepted with id `abc123`, no status
    /// script, fallback 404.
    pub async fn spawn() -> Self {
        let state = Arc::new(BackendState {
            healthy: AtomicBool::new(true),
            upload_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            upload_reply: Mutex::new((200, serde_json::json!({"analysis_id": "abc123"}))),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(StatusReply::NotFound),
            upload_finished_at: Mutex::new(None),
            first_status_at: Mutex::new(None),
            list_body: Mutex::new(serde_json::json!({"analyses": []})),
            report_body: Mutex::new(serde_json::json!({"sections": []})),
            last_report_audience: Mutex::new(None),
        });

        let app = Router::new()
            .route("/api/v1/health", get(health))
            .route("/api/v1/analysis/upload", post(upload))
            .route("/api/v1/analysis/list", get(list))
            .route("/api/v1/analysis/{id}", get(status))
            .route("/api/v1/reports/{id}", get(report))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.state.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn set_upload_reply(&self, status: u16, body: serde_json::Value) {
        *self.state.upload_reply.lock().unwrap() = (status, body);
    }

    /// Queue the next status reply; the script is consumed in order.
    pub fn push_status(&self, reply: StatusReply) {
        self.state.script.lock().unwrap().push_back(reply);
    }

    /// Reply repeated once the script is exhausted.
    pub fn set_fallback(&self, reply: StatusReply) {
        *self.state.fallback.lock().unwrap() = reply;
    }

    pub fn upload_calls(&self) -> usize {
        self.state.upload_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.state.status_calls.load(Ordering::SeqCst)
    }

    /// Time between the upload response and the first status poll.
    pub fn poll_gap(&self) -> Option<Duration> {
        let uploaded = (*self.state.upload_finished_at.lock().unwrap())?;
        let first_poll = (*self.state.first_status_at.lock().unwrap())?;
        Some(first_poll.duration_since(uploaded))
    }

    pub fn set_list_body(&self, body: serde_json::Value) {
        *self.state.list_body.lock().unwrap() = body;
    }

    pub fn set_report_body(&self, body: serde_json::Value) {
        *self.state.report_body.lock().unwrap() = body;
    }

    /// The `audience` query parameter of the most recent report fetch.
    pub fn last_report_audience(&self) -> Option<String> {
        self.state.last_report_audience.lock().unwrap().clone()
    }
}

async fn health(State(state): State<Arc<BackendState>>) -> StatusCode {
    if state.healthy.load(Ordering::SeqCst) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn upload(State(state): State<Arc<BackendState>>, mut multipart: Multipart) -> Response {
    state.upload_calls.fetch_add(1, Ordering::SeqCst);

    // Drain the whole body so the client's progress stream runs to
    // completion before we answer.
    while let Some(field) = multipart.next_field().await.unwrap() {
        let _ = field.bytes().await.unwrap();
    }

    let (code, body) = state.upload_reply.lock().unwrap().clone();
    *state.upload_finished_at.lock().unwrap() = Some(Instant::now());
    (StatusCode::from_u16(code).unwrap(), Json(body)).into_response()
}

async fn list(State(state): State<Arc<BackendState>>) -> Response {
    let body = state.list_body.lock().unwrap().clone();
    (StatusCode::OK, Json(body)).into_response()
}

async fn report(
    State(state): State<Arc<BackendState>>,
    Path(_id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    *state.last_report_audience.lock().unwrap() = params.get("audience").cloned();
    let body = state.report_body.lock().unwrap().clone();
    (StatusCode::OK, Json(body)).into_response()
}

async fn status(State(state): State<Arc<BackendState>>, Path(_id): Path<String>) -> Response {
    state.status_calls.fetch_add(1, Ordering::SeqCst);
    state
        .first_status_at
        .lock()
        .unwrap()
        .get_or_insert_with(Instant::now);

    let scripted = state.script.lock().unwrap().pop_front();
    let reply = scripted.unwrap_or_else(|| state.fallback.lock().unwrap().clone());
    reply.into_response()
}
