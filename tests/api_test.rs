//! Integration tests for API endpoints.
//!
//! These tests use stub services to exercise the router without a database,
//! broker, or Redis connection.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use nta_eval_svc::api::{create_router, ApiSettings, AppState, HealthCheck};
use nta_eval_svc::domain::{EvaluationCriteria, EvaluationJob, JobStatus};
use nta_eval_svc::errors::{AppError, AppResult};
use nta_eval_svc::infra::{RateLimiter, ResultStore};
use nta_eval_svc::jobs::JobQueue;
use nta_eval_svc::services::{EvaluationService, PollResponse, PollingService};

const VALID_YAML: &str = "criteria:\n  - name: accuracy\n    method: score\n    rules: r\n";

// =============================================================================
// Stub services
// =============================================================================

/// Evaluation service stub backed by canned fixtures.
#[derive(Default)]
struct StubEvaluations {
    criteria: Option<EvaluationCriteria>,
    job: Option<EvaluationJob>,
}

#[async_trait]
impl EvaluationService for StubEvaluations {
    async fn create_criteria(
        &self,
        agent_name: String,
        version: i32,
        criteria_yaml: String,
    ) -> AppResult<EvaluationCriteria> {
        match &self.criteria {
            Some(fixture) => {
                assert_eq!(fixture.agent_name, agent_name);
                assert_eq!(fixture.version, version);
                assert_eq!(fixture.criteria_yaml, criteria_yaml);
                Ok(fixture.clone())
            }
            None => Err(AppError::conflict(format!(
                "criteria for agent '{}' version {}",
                agent_name, version
            ))),
        }
    }

    async fn create_job(
        &self,
        _criteria_id: Uuid,
        _prompt: String,
        _output: Option<String>,
    ) -> AppResult<EvaluationJob> {
        self.job.clone().ok_or(AppError::NotFound)
    }

    async fn get_job(&self, _id: Uuid) -> AppResult<EvaluationJob> {
        self.job.clone().ok_or(AppError::NotFound)
    }
}

/// Polling stub that records the budget and client it was invoked with.
struct StubPolling {
    response: Option<PollResponse>,
    calls: Mutex<Vec<(Duration, String)>>,
}

impl StubPolling {
    fn timeout() -> Self {
        Self {
            response: Some(PollResponse::Timeout { status: "timeout" }),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn not_found() -> Self {
        Self {
            response: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PollingService for StubPolling {
    async fn poll_for_results(
        &self,
        _job_id: Uuid,
        timeout: Duration,
        client: &str,
    ) -> AppResult<PollResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((timeout, client.to_string()));
        self.response.clone().ok_or(AppError::NotFound)
    }
}

/// Queue stub that records every enqueued job id.
#[derive(Default)]
struct RecordingQueue {
    enqueued: Mutex<Vec<Uuid>>,
    fail: bool,
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job_id: Uuid) -> AppResult<()> {
        if self.fail {
            return Err(AppError::queue("broker down"));
        }
        self.enqueued.lock().unwrap().push(job_id);
        Ok(())
    }
}

/// Result backend stub with a single canned value.
#[derive(Default)]
struct StubResults {
    value: Option<Value>,
}

#[async_trait]
impl ResultStore for StubResults {
    async fn store_result(&self, _job_id: Uuid, _result: &Value) -> AppResult<()> {
        Ok(())
    }

    async fn fetch_result(&self, _job_id: Uuid) -> AppResult<Option<Value>> {
        Ok(self.value.clone())
    }
}

/// Rate limiter stub.
struct StubLimiter {
    allowed: bool,
    fail: bool,
}

impl Default for StubLimiter {
    fn default() -> Self {
        Self {
            allowed: true,
            fail: false,
        }
    }
}

#[async_trait]
impl RateLimiter for StubLimiter {
    async fn check_rate_limit(
        &self,
        _identifier: &str,
        _max_requests: u64,
        _window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        if self.fail {
            return Err(AppError::backend("redis down"));
        }
        Ok((1, self.allowed))
    }
}

/// Health check stub.
struct StubChecks {
    db_ok: bool,
    redis_ok: bool,
}

impl Default for StubChecks {
    fn default() -> Self {
        Self {
            db_ok: true,
            redis_ok: true,
        }
    }
}

#[async_trait]
impl HealthCheck for StubChecks {
    async fn database(&self) -> AppResult<()> {
        if self.db_ok {
            Ok(())
        } else {
            Err(AppError::internal("db unreachable"))
        }
    }

    async fn backend(&self) -> AppResult<()> {
        if self.redis_ok {
            Ok(())
        } else {
            Err(AppError::backend("redis unreachable"))
        }
    }
}

// =============================================================================
// Fixtures and helpers
// =============================================================================

fn criteria_fixture() -> EvaluationCriteria {
    EvaluationCriteria {
        id: Uuid::new_v4(),
        agent_name: "support-bot".to_string(),
        version: 1,
        criteria_yaml: VALID_YAML.to_string(),
        created_at: Utc::now(),
    }
}

fn job_fixture() -> EvaluationJob {
    let now = Utc::now();
    EvaluationJob {
        id: Uuid::new_v4(),
        criteria_id: Uuid::new_v4(),
        agent_name: "support-bot".to_string(),
        version: 1,
        prompt: "What is 2+2?".to_string(),
        output: Some("4".to_string()),
        status: JobStatus::Pending,
        results: None,
        error_message: None,
        created_at: now,
        updated_at: now,
        completed_at: None,
    }
}

struct StateBuilder {
    evaluations: StubEvaluations,
    polling: Arc<StubPolling>,
    queue: Arc<RecordingQueue>,
    results: StubResults,
    limiter: StubLimiter,
    checks: StubChecks,
}

impl Default for StateBuilder {
    fn default() -> Self {
        Self {
            evaluations: StubEvaluations::default(),
            polling: Arc::new(StubPolling::timeout()),
            queue: Arc::new(RecordingQueue::default()),
            results: StubResults::default(),
            limiter: StubLimiter::default(),
            checks: StubChecks::default(),
        }
    }
}

impl StateBuilder {
    fn build(self) -> AppState {
        AppState::new(
            Arc::new(self.evaluations),
            self.polling,
            self.queue,
            Arc::new(self.results),
            Arc::new(self.limiter),
            Arc::new(self.checks),
            ApiSettings {
                default_poll_timeout: Duration::from_secs(30),
                rate_limit_requests: 100,
                rate_limit_window_secs: 60,
            },
        )
    }

    fn router(self) -> axum::Router {
        let socket: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        create_router(self.build()).layer(MockConnectInfo(socket))
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_reports_healthy_when_dependencies_are_up() {
    let app = StateBuilder::default().router();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["services"]["database"]["status"], "healthy");
    assert_eq!(body["services"]["redis"]["status"], "healthy");
}

#[tokio::test]
async fn health_degrades_when_redis_is_down() {
    let mut builder = StateBuilder::default();
    builder.checks = StubChecks {
        db_ok: true,
        redis_ok: false,
    };
    let app = builder.router();

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = body_json(response).await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["services"]["redis"]["status"], "unhealthy");
}

// =============================================================================
// Criteria
// =============================================================================

#[tokio::test]
async fn create_criteria_returns_created_document() {
    let fixture = criteria_fixture();
    let expected_id = fixture.id;

    let mut builder = StateBuilder::default();
    builder.evaluations.criteria = Some(fixture);
    let app = builder.router();

    let request = post_json(
        "/api/criteria",
        json!({
            "agent_name": "support-bot",
            "version": 1,
            "criteria_yaml": VALID_YAML,
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["id"], expected_id.to_string());
    assert_eq!(body["agent_name"], "support-bot");
}

#[tokio::test]
async fn create_criteria_rejects_blank_agent_name() {
    let app = StateBuilder::default().router();

    let request = post_json(
        "/api/criteria",
        json!({
            "agent_name": "",
            "version": 1,
            "criteria_yaml": VALID_YAML,
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn duplicate_criteria_conflict() {
    // No fixture configured: the stub reports a duplicate
    let app = StateBuilder::default().router();

    let request = post_json(
        "/api/criteria",
        json!({
            "agent_name": "support-bot",
            "version": 1,
            "criteria_yaml": VALID_YAML,
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// =============================================================================
// Jobs
// =============================================================================

#[tokio::test]
async fn create_job_returns_pending_job() {
    let job = job_fixture();
    let expected_id = job.id;
    let criteria_id = job.criteria_id;

    let mut builder = StateBuilder::default();
    builder.evaluations.job = Some(job);
    let app = builder.router();

    let request = post_json(
        "/api/jobs",
        json!({
            "criteria_id": criteria_id,
            "prompt": "What is 2+2?",
            "output": "4",
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["id"], expected_id.to_string());
    assert_eq!(body["status"], "pending");
}

#[tokio::test]
async fn create_job_against_missing_criteria_is_404() {
    let app = StateBuilder::default().router();

    let request = post_json(
        "/api/jobs",
        json!({
            "criteria_id": Uuid::new_v4(),
            "prompt": "What is 2+2?",
        }),
    );
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_job_reads_results_through_the_backend() {
    let job = job_fixture();
    let job_id = job.id;
    let cached = json!({ "accuracy": { "result": { "score": 88.0 } } });

    let mut builder = StateBuilder::default();
    builder.evaluations.job = Some(job);
    builder.results.value = Some(cached.clone());
    let app = builder.router();

    let response = app
        .oneshot(get(&format!("/api/jobs/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["results"], cached);
}

#[tokio::test]
async fn get_unknown_job_is_404() {
    let app = StateBuilder::default().router();

    let response = app
        .oneshot(get(&format!("/api/jobs/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Dispatch
// =============================================================================

#[tokio::test]
async fn dispatch_enqueues_the_job() {
    let job = job_fixture();
    let job_id = job.id;

    let mut builder = StateBuilder::default();
    builder.evaluations.job = Some(job);
    let queue = builder.queue.clone();
    let app = builder.router();

    let response = app
        .oneshot(post(&format!("/api/tasks/dispatch/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["enqueued"], true);
    assert_eq!(body["job_id"], job_id.to_string());

    assert_eq!(*queue.enqueued.lock().unwrap(), vec![job_id]);
}

#[tokio::test]
async fn dispatch_of_unknown_job_never_touches_the_broker() {
    let builder = StateBuilder::default();
    let queue = builder.queue.clone();
    let app = builder.router();

    let response = app
        .oneshot(post(&format!("/api/tasks/dispatch/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(queue.enqueued.lock().unwrap().is_empty());
}

#[tokio::test]
async fn dispatch_failure_hides_broker_details() {
    let job = job_fixture();
    let job_id = job.id;

    let mut builder = StateBuilder::default();
    builder.evaluations.job = Some(job);
    builder.queue = Arc::new(RecordingQueue {
        enqueued: Mutex::new(Vec::new()),
        fail: true,
    });
    let app = builder.router();

    let response = app
        .oneshot(post(&format!("/api/tasks/dispatch/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_json(response).await;
    assert_eq!(body["error"]["message"], "failed to enqueue task");
    assert!(!body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("broker down"));
}

// =============================================================================
// Long polling
// =============================================================================

#[tokio::test]
async fn long_poll_returns_timeout_payload() {
    let builder = StateBuilder::default();
    let polling = builder.polling.clone();
    let app = builder.router();

    let response = app
        .oneshot(post(&format!("/api/long-poll/{}?timeout=5", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body, json!({ "status": "timeout" }));

    let calls = polling.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, Duration::from_secs(5));
}

#[tokio::test]
async fn long_poll_applies_the_default_timeout() {
    let builder = StateBuilder::default();
    let polling = builder.polling.clone();
    let app = builder.router();

    let response = app
        .oneshot(post(&format!("/api/long-poll/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let calls = polling.calls.lock().unwrap();
    assert_eq!(calls[0].0, Duration::from_secs(30));
}

#[tokio::test]
async fn long_poll_identifies_the_client_from_forwarded_header() {
    let builder = StateBuilder::default();
    let polling = builder.polling.clone();
    let app = builder.router();

    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/long-poll/{}", Uuid::new_v4()))
        .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap();

    let calls = polling.calls.lock().unwrap();
    assert_eq!(calls[0].1, "203.0.113.7");
}

#[tokio::test]
async fn long_poll_rejects_zero_timeout() {
    let app = StateBuilder::default().router();

    let response = app
        .oneshot(post(&format!("/api/long-poll/{}?timeout=0", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn long_poll_unknown_job_is_404() {
    let mut builder = StateBuilder::default();
    builder.polling = Arc::new(StubPolling::not_found());
    let app = builder.router();

    let response = app
        .oneshot(post(&format!("/api/long-poll/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn long_poll_is_rate_limited() {
    let mut builder = StateBuilder::default();
    builder.limiter = StubLimiter {
        allowed: false,
        fail: false,
    };
    let app = builder.router();

    let response = app
        .oneshot(post(&format!("/api/long-poll/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("Retry-After"));
}

#[tokio::test]
async fn rate_limiting_fails_closed_when_redis_is_down() {
    let mut builder = StateBuilder::default();
    builder.limiter = StubLimiter {
        allowed: true,
        fail: true,
    };
    let app = builder.router();

    let response = app
        .oneshot(post(&format!("/api/long-poll/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn rate_limit_headers_are_set_on_allowed_requests() {
    let app = StateBuilder::default().router();

    let response = app
        .oneshot(post(&format!("/api/long-poll/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("X-RateLimit-Limit").unwrap(),
        "100"
    );
    assert_eq!(
        response.headers().get("X-RateLimit-Remaining").unwrap(),
        "99"
    );
}

// =============================================================================
// Root
// =============================================================================

#[tokio::test]
async fn root_serves_a_banner() {
    let app = StateBuilder::default().router();

    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
