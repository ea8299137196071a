//! Evaluation criteria handlers.

use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::api::extractors::ValidatedJson;
use crate::api::AppState;
use crate::domain::EvaluationCriteria;
use crate::errors::AppResult;

/// Criteria creation request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCriteriaRequest {
    /// Agent the criteria apply to
    #[validate(length(min = 1, message = "agent_name is required"))]
    #[schema(example = "support-bot")]
    pub agent_name: String,
    /// Criteria document version
    #[validate(range(min = 1, message = "version must be at least 1"))]
    #[schema(example = 1)]
    pub version: i32,
    /// YAML criteria document
    #[validate(length(min = 1, message = "criteria_yaml is required"))]
    pub criteria_yaml: String,
}

/// Stored criteria document
#[derive(Debug, Serialize, ToSchema)]
pub struct CriteriaResponse {
    pub id: Uuid,
    pub agent_name: String,
    pub version: i32,
    pub created_at: DateTime<Utc>,
}

impl From<EvaluationCriteria> for CriteriaResponse {
    fn from(criteria: EvaluationCriteria) -> Self {
        Self {
            id: criteria.id,
            agent_name: criteria.agent_name,
            version: criteria.version,
            created_at: criteria.created_at,
        }
    }
}

/// Create criteria routes
pub fn criteria_routes() -> Router<AppState> {
    Router::new().route("/", post(create_criteria))
}

/// Store a new evaluation criteria document
#[utoipa::path(
    post,
    path = "/api/criteria",
    tag = "Criteria",
    request_body = CreateCriteriaRequest,
    responses(
        (status = 201, description = "Criteria stored", body = CriteriaResponse),
        (status = 400, description = "Validation error or malformed YAML"),
        (status = 409, description = "Criteria already exist for this agent/version")
    )
)]
pub async fn create_criteria(
    State(state): State<AppState>,
    ValidatedJson(payload): ValidatedJson<CreateCriteriaRequest>,
) -> AppResult<(StatusCode, Json<CriteriaResponse>)> {
    let criteria = state
        .evaluations
        .create_criteria(payload.agent_name, payload.version, payload.criteria_yaml)
        .await?;

    Ok((StatusCode::CREATED, Json(CriteriaResponse::from(criteria))))
}
