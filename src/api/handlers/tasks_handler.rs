//! Task dispatch handlers.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::post,
    Router,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::AppState;
use crate::errors::AppResult;

/// Dispatch acknowledgement
#[derive(Debug, Serialize, ToSchema)]
pub struct DispatchResponse {
    pub enqueued: bool,
    pub job_id: Uuid,
}

/// Create task routes
pub fn tasks_routes() -> Router<AppState> {
    Router::new().route("/dispatch/:job_id", post(dispatch))
}

/// Enqueue an evaluation job for the worker
#[utoipa::path(
    post,
    path = "/api/tasks/dispatch/{job_id}",
    tag = "Tasks",
    params(("job_id" = Uuid, Path, description = "Job id to enqueue")),
    responses(
        (status = 200, description = "Job enqueued", body = DispatchResponse),
        (status = 404, description = "Job not found"),
        (status = 500, description = "Broker unavailable")
    )
)]
pub async fn dispatch(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> AppResult<Json<DispatchResponse>> {
    // Only known jobs are dispatched; unknown ids 404 before touching the broker.
    state.evaluations.get_job(job_id).await?;
    state.queue.enqueue(job_id).await?;

    Ok(Json(DispatchResponse {
        enqueued: true,
        job_id,
    }))
}
