//! Evaluation background job.
//!
//! The worker pulls `ProcessEvaluation` payloads off the broker, runs every
//! criterion in the job's criteria document against the stored agent output,
//! and writes the aggregated results back to the job row. Failed runs are
//! retried a few times before the job is marked failed.

use apalis::prelude::Data;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::{EVAL_RETRY_DELAY_SECONDS, MAX_ERROR_MESSAGE_CHARS, MAX_EVAL_ATTEMPTS};
use crate::domain::{CriteriaSpec, EvaluationJob};
use crate::errors::{AppError, AppResult};
use crate::infra::{EvaluationRepository, ResultStore};
use crate::services::Evaluator;

/// Queue payload: everything else is loaded from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEvaluation {
    pub job_id: Uuid,
}

/// Shared dependencies injected into the worker.
#[derive(Clone)]
pub struct WorkerContext {
    pub repo: Arc<dyn EvaluationRepository>,
    pub evaluator: Arc<Evaluator>,
    pub results: Arc<dyn ResultStore>,
}

/// Evaluation job handler - processes one evaluation end to end.
pub async fn process_evaluation_handler(
    payload: ProcessEvaluation,
    ctx: Data<WorkerContext>,
) -> Result<(), AppError> {
    let job_id = payload.job_id;

    let job = match ctx.repo.find_job(job_id).await? {
        Some(job) => job,
        None => {
            // Job rows can vanish when criteria are deleted; drop the payload
            // rather than poisoning the queue.
            tracing::warn!(job_id = %job_id, "Evaluation job not found, skipping");
            return Ok(());
        }
    };

    tracing::info!(
        job_id = %job_id,
        agent_name = %job.agent_name,
        version = job.version,
        "Processing evaluation job"
    );

    ctx.repo.mark_in_progress(job_id).await?;

    let spec = match load_spec(&ctx, &job).await {
        Ok(spec) => spec,
        Err(e) => {
            record_failure(&ctx, job_id, &e).await;
            return Ok(());
        }
    };

    let mut attempt = 1;
    loop {
        match run_evaluation(&ctx, &job, &spec).await {
            Ok(results) => {
                ctx.repo.complete_job(job_id, results.clone()).await?;
                // The result cache is an optimization; the database row is
                // the source of truth.
                if let Err(e) = ctx.results.store_result(job_id, &results).await {
                    tracing::warn!(job_id = %job_id, error = %e, "Result cache write failed");
                }
                tracing::info!(job_id = %job_id, "Evaluation job completed");
                return Ok(());
            }
            Err(e) if attempt < MAX_EVAL_ATTEMPTS => {
                tracing::warn!(
                    job_id = %job_id,
                    attempt,
                    error = %e,
                    "Evaluation attempt failed, retrying"
                );
                tokio::time::sleep(Duration::from_secs(EVAL_RETRY_DELAY_SECONDS)).await;
                attempt += 1;
            }
            Err(e) => {
                record_failure(&ctx, job_id, &e).await;
                return Ok(());
            }
        }
    }
}

/// Load and parse the criteria document the job references.
async fn load_spec(ctx: &WorkerContext, job: &EvaluationJob) -> AppResult<CriteriaSpec> {
    let criteria = ctx
        .repo
        .find_criteria(job.criteria_id)
        .await?
        .ok_or_else(|| {
            AppError::internal(format!("criteria {} no longer exists", job.criteria_id))
        })?;
    criteria.spec()
}

/// Run every criterion and assemble the results document.
async fn run_evaluation(
    ctx: &WorkerContext,
    job: &EvaluationJob,
    spec: &CriteriaSpec,
) -> AppResult<serde_json::Value> {
    let mut results = serde_json::Map::new();

    for criterion in &spec.criteria {
        let (samples, aggregate) = ctx
            .evaluator
            .evaluate_criterion(
                job.output.as_deref(),
                criterion.method,
                &criterion.rules,
                criterion.samples,
            )
            .await?;

        results.insert(
            criterion.name.clone(),
            json!({
                "method": criterion.method,
                "samples": samples,
                "result": aggregate,
            }),
        );
    }

    Ok(serde_json::Value::Object(results))
}

/// Mark the job failed, truncating oversized error messages.
async fn record_failure(ctx: &WorkerContext, job_id: Uuid, error: &AppError) {
    let message: String = error.to_string().chars().take(MAX_ERROR_MESSAGE_CHARS).collect();
    tracing::error!(job_id = %job_id, error = %message, "Evaluation job failed");

    if let Err(e) = ctx.repo.fail_job(job_id, &message).await {
        tracing::error!(job_id = %job_id, error = %e, "Could not record job failure");
    }
}
