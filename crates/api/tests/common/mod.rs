#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use analytics_api::config::ServerConfig;
use analytics_api::router::build_app_router;
use analytics_api::state::AppState;
use analytics_core::blob::LocalBlobStore;
use analytics_core::catalog::{Job, JobSummary};
use analytics_core::scheduling::QueueConfig;
use analytics_core::submission::{
    NewStepResult, NewSubmission, StepResult, Submission, SubmissionStatus,
};
use analytics_core::types::{DbId, SubmissionId};
use analytics_db::{JobCatalog, MemoryStore, ResultStore, Store, StoreError, SubmissionStore};
use analytics_events::EventBus;
use analytics_pipeline::{
    AdmissionQueue, BackendRunner, PipelineConfig, PipelineExecutor, StatusTracker, StepOutcome,
    StepRequest, WorkerPool,
};

/// `job1`: one task requiring `this`.
/// `job2`: three tasks, `task2` requires an integer `threads`.
/// `job3`: three parameterless tasks, `failing` in the middle.
const CATALOG: &str = r#"[
  {
    "id": 1,
    "name": "job1",
    "steps": [
      {"id": 1, "ordering": 0, "task": {
        "id": 1, "name": "task1", "executable": "analyse $INPUT",
        "backend": {"id": 1, "name": "local", "root_path": "__ROOT__"},
        "parameters": [{"id": 1, "rest_alias": "this", "flag": "-t"}]
      }}
    ]
  },
  {
    "id": 2,
    "name": "job2",
    "steps": [
      {"id": 2, "ordering": 0, "task": {
        "id": 2, "name": "align", "executable": "align $INPUT",
        "backend": {"id": 1, "name": "local", "root_path": "__ROOT__"}
      }},
      {"id": 3, "ordering": 1, "task": {
        "id": 3, "name": "count", "executable": "count",
        "backend": {"id": 1, "name": "local", "root_path": "__ROOT__"},
        "parameters": [{"id": 2, "rest_alias": "threads", "flag": "-p", "rule": {"type": "integer"}}]
      }},
      {"id": 4, "ordering": 2, "task": {
        "id": 4, "name": "report", "executable": "report",
        "backend": {"id": 1, "name": "local", "root_path": "__ROOT__"}
      }}
    ]
  },
  {
    "id": 3,
    "name": "job3",
    "steps": [
      {"id": 5, "ordering": 0, "task": {
        "id": 5, "name": "prepare", "executable": "prepare",
        "backend": {"id": 1, "name": "local", "root_path": "__ROOT__"}
      }},
      {"id": 6, "ordering": 1, "task": {
        "id": 6, "name": "failing", "executable": "failing",
        "backend": {"id": 1, "name": "local", "root_path": "__ROOT__"}
      }},
      {"id": 7, "ordering": 2, "task": {
        "id": 7, "name": "never", "executable": "never",
        "backend": {"id": 1, "name": "local", "root_path": "__ROOT__"}
      }}
    ]
  }
]"#;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(media_root: &std::path::Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        public_base_url: "http://testserver".to_string(),
        media_root: media_root.to_path_buf(),
        worker_count: 1,
        max_upload_bytes: 1024 * 1024,
        database_url: None,
        catalog_path: None,
        elevated_tokens: vec!["elevated-token".to_string()],
        trust_forwarded_for: false,
    }
}

/// Everything a test needs to drive and inspect the service.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub queue: AdmissionQueue,
    pub blobs: LocalBlobStore,
    pub event_bus: Arc<EventBus>,
    _dirs: (tempfile::TempDir, tempfile::TempDir),
}

impl TestApp {
    /// App with the default queue limits and no workers, so admitted
    /// submissions stay `Submitted`.
    pub fn new() -> Self {
        Self::with_queue(QueueConfig::default())
    }

    pub fn with_queue(queue_config: QueueConfig) -> Self {
        Self::build(queue_config, |store| store as Arc<dyn Store>)
    }

    /// App whose storage refuses to persist new submissions.
    pub fn with_failing_writes() -> Self {
        Self::build(QueueConfig::default(), |store| {
            Arc::new(RejectingWrites(store)) as Arc<dyn Store>
        })
    }

    fn build(
        queue_config: QueueConfig,
        wrap: impl FnOnce(Arc<MemoryStore>) -> Arc<dyn Store>,
    ) -> Self {
        let media = tempfile::tempdir().expect("create media dir");
        let backend_root = tempfile::tempdir().expect("create backend dir");
        let catalog = CATALOG.replace("__ROOT__", &backend_root.path().to_string_lossy());
        let store = Arc::new(MemoryStore::from_json(&catalog).expect("valid catalog"));

        let config = test_config(media.path());
        let blobs = LocalBlobStore::new(media.path(), &config.public_base_url);
        let queue = AdmissionQueue::new(queue_config);
        let event_bus = Arc::new(EventBus::default());

        let state = AppState {
            store: wrap(store.clone()),
            blobs: blobs.clone(),
            queue: queue.clone(),
            config: Arc::new(config.clone()),
        };

        Self {
            router: build_app_router(state, &config),
            store,
            queue,
            blobs,
            event_bus,
            _dirs: (media, backend_root),
        }
    }

    /// Start a worker pool running steps through [`StubRunner`].
    pub fn start_workers(&self) -> WorkerPool {
        let store: Arc<dyn Store> = self.store.clone();
        let executor = PipelineExecutor::new(
            store.clone(),
            Arc::new(StubRunner {
                blobs: self.blobs.clone(),
            }),
            self.blobs.clone(),
            StatusTracker::new(store, self.event_bus.clone()),
            PipelineConfig::default(),
        );
        WorkerPool::start(1, self.queue.clone(), Arc::new(executor))
    }

    /// Poll until `id` reaches a terminal state.
    pub async fn wait_terminal(&self, id: SubmissionId) -> Submission {
        for _ in 0..200 {
            let s = self
                .store
                .find_submission(id)
                .await
                .unwrap()
                .expect("submission exists");
            if s.status.is_terminal() {
                return s;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("submission {id} did not finish");
    }

    pub async fn status_of(&self, id: SubmissionId) -> SubmissionStatus {
        self.store
            .find_submission(id)
            .await
            .unwrap()
            .expect("submission exists")
            .status
    }
}

/// Succeeds with a stored `<task>.out` blob, except for the task named
/// `failing`, which reports an execution error.
pub struct StubRunner {
    blobs: LocalBlobStore,
}

#[async_trait]
impl BackendRunner for StubRunner {
    async fn execute(&self, request: StepRequest) -> StepOutcome {
        if request.task.name == "failing" {
            return StepOutcome::ExecutionError {
                message: "failing exited with status 1".into(),
            };
        }
        let blob = self
            .blobs
            .put(
                &format!("results/{}/{}", request.submission_id, request.step),
                &format!("{}.out", request.task.name),
                format!("output of {}", request.task.name).as_bytes(),
            )
            .await
            .expect("store stub output");
        StepOutcome::Success {
            message: format!("{} done", request.task.name),
            result_data: Some(blob),
        }
    }
}

/// Delegates to a [`MemoryStore`] but fails every `create_submission`.
struct RejectingWrites(Arc<MemoryStore>);

#[async_trait]
impl JobCatalog for RejectingWrites {
    async fn list_jobs(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<JobSummary>, i64), StoreError> {
        self.0.list_jobs(limit, offset).await
    }

    async fn find_job_by_name(&self, name: &str) -> Result<Option<Job>, StoreError> {
        self.0.find_job_by_name(name).await
    }

    async fn find_job(&self, id: DbId) -> Result<Option<Job>, StoreError> {
        self.0.find_job(id).await
    }
}

#[async_trait]
impl SubmissionStore for RejectingWrites {
    async fn create_submission(&self, _new: NewSubmission) -> Result<Submission, StoreError> {
        Err(StoreError::Corrupt("write refused".into()))
    }

    async fn find_submission(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError> {
        self.0.find_submission(id).await
    }

    async fn list_submissions_by_status(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError> {
        self.0.list_submissions_by_status(status).await
    }

    async fn transition_status(
        &self,
        id: SubmissionId,
        from: SubmissionStatus,
        to: SubmissionStatus,
        message: Option<&str>,
    ) -> Result<bool, StoreError> {
        self.0.transition_status(id, from, to, message).await
    }

    async fn update_progress(
        &self,
        id: SubmissionId,
        current_step: u32,
        message: &str,
    ) -> Result<(), StoreError> {
        self.0.update_progress(id, current_step, message).await
    }
}

#[async_trait]
impl ResultStore for RejectingWrites {
    async fn insert_result(&self, new: NewStepResult) -> Result<StepResult, StoreError> {
        self.0.insert_result(new).await
    }

    async fn list_results(
        &self,
        submission_id: SubmissionId,
    ) -> Result<Vec<StepResult>, StoreError> {
        self.0.list_results(submission_id).await
    }
}

#[async_trait]
impl Store for RejectingWrites {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

/// Multipart body builder.
pub struct MultipartForm {
    boundary: &'static str,
    body: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self {
            boundary: "analytics-test-boundary",
            body: Vec::new(),
        }
    }
}

impl MultipartForm {
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, contents: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(contents);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

/// A complete, valid form for `job1`.
pub fn job1_form() -> MultipartForm {
    MultipartForm::default()
        .file("input_data", "file1.txt", b"these are the file contents!")
        .text("job", "job1")
        .text("submission_name", "test")
        .text("email", "a@b.com")
        .text("task1_this", "Value1")
}

pub async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response {
    send(
        app,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).expect("response body is JSON")
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

/// Submit `form` and return the new submission's id, asserting 201.
pub async fn create(app: &Router, form: MultipartForm) -> SubmissionId {
    let response = send(app, form.into_request("/api/v1/submissions")).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["data"]["uuid"]
        .as_str()
        .expect("uuid in response")
        .parse()
        .expect("uuid parses")
}
