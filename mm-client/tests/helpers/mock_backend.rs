//! In-process stand-in for the mastering service
//!
//! Serves the four endpoints of the HTTP contract on an ephemeral port and
//! records what the client sent. Poll responses are scripted per job.

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::task::JoinHandle;

/// Bytes served for every download
pub const DOWNLOAD_BODY: &[u8] = b"RIFF-mastered-audio";

/// Size of each chunk of a paced download
pub const PACED_CHUNK_SIZE: usize = 1024;

/// A multipart upload as received
#[derive(Debug, Clone)]
pub struct ReceivedUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub size: usize,
}

#[derive(Default)]
pub struct MockState {
    pub uploads: Mutex<Vec<ReceivedUpload>>,
    pub master_requests: Mutex<Vec<Value>>,
    pub polls: Mutex<HashMap<String, usize>>,
    pub downloads: Mutex<Vec<(String, String)>>,
    scripts: Mutex<HashMap<String, VecDeque<Value>>>,
    /// `(status, detail)` returned by every upload when set
    upload_failure: Mutex<Option<(u16, String)>>,
    /// `(status, detail)` returned by job creation when set
    master_failure: Mutex<Option<(u16, String)>>,
    /// `(chunks, delay)`: downloads send `chunks` chunks with `delay` before
    /// every chunk after the first
    download_pacing: Mutex<Option<(usize, Duration)>>,
}

/// Running mock server; stops when dropped
pub struct MockBackend {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockBackend {
    pub async fn start() -> Self {
        let state = Arc::new(MockState::default());

        let router = Router::new()
            .route("/api/upload", post(upload))
            .route("/api/master", post(create_job))
            .route("/api/jobs/:job_id", get(job_status))
            .route("/api/download/:job_id/:filename", get(download))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock backend");
        let addr = listener.local_addr().expect("local addr");

        let task = tokio::spawn(async move {
            axum::serve(listener, router).await.expect("mock backend");
        });

        Self { addr, state, task }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Responses returned, in order, by `GET /api/jobs/{job_id}`
    pub fn script(&self, job_id: &str, responses: Vec<Value>) {
        self.state
            .scripts
            .lock()
            .unwrap()
            .insert(job_id.to_string(), responses.into());
    }

    pub fn fail_uploads(&self, status: u16, detail: &str) {
        *self.state.upload_failure.lock().unwrap() = Some((status, detail.to_string()));
    }

    pub fn fail_job_creation(&self, status: u16, detail: &str) {
        *self.state.master_failure.lock().unwrap() = Some((status, detail.to_string()));
    }

    /// Serve downloads as `chunks` chunks of [`PACED_CHUNK_SIZE`] bytes,
    /// sleeping `delay` between chunks
    pub fn pace_downloads(&self, chunks: usize, delay: Duration) {
        *self.state.download_pacing.lock().unwrap() = Some((chunks, delay));
    }

    pub fn polls_for(&self, job_id: &str) -> usize {
        self.state.polls.lock().unwrap().get(job_id).copied().unwrap_or(0)
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn error_response(status: u16, detail: &str) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "detail": detail }))).into_response()
}

async fn upload(State(state): State<Arc<MockState>>, mut multipart: Multipart) -> Response {
    if let Some((status, detail)) = state.upload_failure.lock().unwrap().clone() {
        return error_response(status, &detail);
    }

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.unwrap_or_default();

        if bytes.is_empty() {
            return error_response(400, "Empty file");
        }

        let mut uploads = state.uploads.lock().unwrap();
        uploads.push(ReceivedUpload {
            file_name: file_name.clone(),
            content_type,
            size: bytes.len(),
        });

        return Json(json!({
            "filename": format!("upload{}_{}", uploads.len(), file_name),
            "file_id": format!("file-{}", uploads.len()),
            "original_name": file_name,
            "size": bytes.len(),
        }))
        .into_response();
    }

    error_response(400, "Missing file field")
}

async fn create_job(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    if let Some((status, detail)) = state.master_failure.lock().unwrap().clone() {
        return error_response(status, &detail);
    }

    let mut requests = state.master_requests.lock().unwrap();
    requests.push(body);

    Json(json!({
        "job_id": format!("job-{}", requests.len()),
        "status": "pending",
    }))
    .into_response()
}

async fn job_status(State(state): State<Arc<MockState>>, Path(job_id): Path<String>) -> Response {
    let created = state.master_requests.lock().unwrap().len();
    if !(1..=created).any(|n| format!("job-{}", n) == job_id) {
        return error_response(404, "Job not found");
    }

    *state.polls.lock().unwrap().entry(job_id.clone()).or_default() += 1;

    let next = state
        .scripts
        .lock()
        .unwrap()
        .get_mut(&job_id)
        .and_then(|script| script.pop_front());

    let mut body = next.unwrap_or_else(|| {
        json!({ "status": "processing", "progress": 50, "message": "Processing" })
    });
    body["job_id"] = json!(job_id);
    Json(body).into_response()
}

async fn download(
    State(state): State<Arc<MockState>>,
    Path((job_id, filename)): Path<(String, String)>,
) -> Response {
    if filename.contains('/') || filename.contains("..") {
        return error_response(400, "Invalid filename");
    }

    state
        .downloads
        .lock()
        .unwrap()
        .push((job_id, filename));

    let pacing = *state.download_pacing.lock().unwrap();
    match pacing {
        Some((chunks, delay)) => {
            let body = futures::stream::unfold(0usize, move |sent| async move {
                if sent == chunks {
                    return None;
                }
                if sent > 0 {
                    tokio::time::sleep(delay).await;
                }
                let chunk = Bytes::from(vec![b'x'; PACED_CHUNK_SIZE]);
                Some((Ok::<_, std::io::Error>(chunk), sent + 1))
            });
            (StatusCode::OK, Body::from_stream(body)).into_response()
        }
        None => (StatusCode::OK, DOWNLOAD_BODY).into_response(),
    }
}
