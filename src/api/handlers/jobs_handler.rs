//! Evaluation job handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::domain::{EvaluationJob, JobStatus};
use crate::errors::AppResult;

/// Job creation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateJobRequest {
    /// Criteria document to evaluate against
    pub criteria_id: Uuid,
    /// Prompt the agent was given
    #[validate(length(min = 1, message = "prompt is required"))]
    pub prompt: String,
    /// Output the agent produced
    pub output: Option<String>,
}

/// Evaluation job representation
#[derive(Debug, Serialize, ToSchema)]
pub struct JobResponse {
    pub id: Uuid,
    pub criteria_id: Uuid,
    pub agent_name: String,
    pub version: i32,
    pub prompt: String,
    pub output: Option<String>,
    pub status: JobStatus,
    #[schema(value_type = Option<Object>)]
    pub results: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<EvaluationJob> for JobResponse {
    fn from(job: EvaluationJob) -> Self {
        Self {
            id: job.id,
            criteria_id: job.criteria_id,
            agent_name: job.agent_name,
            version: job.version,
            prompt: job.prompt,
            output: job.output,
            status: job.status,
            results: job.results,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}

/// Create job routes
pub fn jobs_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_job))
        .route("/:job_id", get(get_job))
}

/// Create a new evaluation job
#[utoipa::path(
    post,
    path = "/api/jobs",
    tag = "Jobs",
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job created", body = JobResponse),
        (status = 400, description = "Validation error"),
        (status = 404, description = "Criteria not found")
    )
)]
pub async fn create_job(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateJobRequest>,
) -> AppResult<(StatusCode, Json<JobResponse>)> {
    let job = state
        .evaluations
        .create_job(payload.criteria_id, payload.prompt, payload.output)
        .await?;

    Ok((StatusCode::CREATED, Json(JobResponse::from(job))))
}

/// Fetch a job's status and results
#[utoipa::path(
    get,
    path = "/api/jobs/{job_id}",
    tag = "Jobs",
    params(("job_id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "Job found", body = JobResponse),
        (status = 404, description = "Job not found")
    )
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<JobResponse>> {
    let mut job = state.evaluations.get_job(job_id).await?;

    // Read-through: the worker publishes to the result backend before the
    // database row may be visible to this replica.
    if job.results.is_none() {
        match state.results.fetch_result(job_id).await {
            Ok(Some(results)) => job.results = Some(results),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Result backend read failed");
            }
        }
    }

    Ok(Json(JobResponse::from(job)))
}
