//! OpenAPI documentation configuration.
//!
//! Provides Swagger UI for API exploration and testing.

use utoipa::OpenApi;

use crate::api::handlers::{criteria_handler, jobs_handler, polling_handler, tasks_handler};
use crate::domain::{EvaluationMethod, JobStatus};

/// OpenAPI documentation for the agent evaluation service
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Agent Evaluation Service",
        version = "0.1.0",
        description = "Evaluates agent outputs against versioned criteria documents \
                       using model-judged scoring"
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        criteria_handler::create_criteria,
        jobs_handler::create_job,
        jobs_handler::get_job,
        tasks_handler::dispatch,
        polling_handler::long_poll,
    ),
    components(
        schemas(
            JobStatus,
            EvaluationMethod,
            criteria_handler::CreateCriteriaRequest,
            criteria_handler::CriteriaResponse,
            jobs_handler::CreateJobRequest,
            jobs_handler::JobResponse,
            tasks_handler::DispatchResponse,
        )
    ),
    tags(
        (name = "Criteria", description = "Evaluation criteria management"),
        (name = "Jobs", description = "Evaluation job lifecycle"),
        (name = "Tasks", description = "Background task dispatch"),
        (name = "Polling", description = "Long polling for results")
    )
)]
pub struct ApiDoc;
