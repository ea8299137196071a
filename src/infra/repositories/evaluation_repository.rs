//! Evaluation repository implementation.

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use super::entities::criteria::{self, Entity as CriteriaEntity};
use super::entities::evaluation_job::{self, Entity as JobEntity};
use crate::domain::{EvaluationCriteria, EvaluationJob, JobStatus};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Evaluation repository trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait EvaluationRepository: Send + Sync {
    /// Store a new criteria document
    async fn create_criteria(
        &self,
        agent_name: String,
        version: i32,
        criteria_yaml: String,
    ) -> AppResult<EvaluationCriteria>;

    /// Find criteria by id
    async fn find_criteria(&self, id: Uuid) -> AppResult<Option<EvaluationCriteria>>;

    /// Find criteria for an agent/version pair
    async fn find_criteria_by_agent(
        &self,
        agent_name: &str,
        version: i32,
    ) -> AppResult<Option<EvaluationCriteria>>;

    /// Create a pending job against existing criteria
    async fn create_job(
        &self,
        criteria: &EvaluationCriteria,
        prompt: String,
        output: Option<String>,
    ) -> AppResult<EvaluationJob>;

    /// Find a job by id
    async fn find_job(&self, id: Uuid) -> AppResult<Option<EvaluationJob>>;

    /// Transition a job to in_progress
    async fn mark_in_progress(&self, id: Uuid) -> AppResult<EvaluationJob>;

    /// Record results and transition a job to completed
    async fn complete_job(&self, id: Uuid, results: serde_json::Value)
        -> AppResult<EvaluationJob>;

    /// Record an error and transition a job to failed
    async fn fail_job(&self, id: Uuid, error_message: &str) -> AppResult<EvaluationJob>;
}

/// Concrete implementation of EvaluationRepository
pub struct EvaluationStore {
    db: DatabaseConnection,
}

impl EvaluationStore {
    /// Create new repository instance
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn fetch_job_model(&self, id: Uuid) -> AppResult<evaluation_job::Model> {
        JobEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(AppError::from)?
            .ok_or(AppError::NotFound)
    }
}

/// Translate a criteria insert failure, turning unique index violations
/// into conflicts.
fn criteria_insert_error(e: sea_orm::DbErr, agent_name: &str, version: i32) -> AppError {
    match e.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => AppError::conflict(format!(
            "criteria for agent '{}' version {}",
            agent_name, version
        )),
        _ => AppError::from(e),
    }
}

#[async_trait]
impl EvaluationRepository for EvaluationStore {
    async fn create_criteria(
        &self,
        agent_name: String,
        version: i32,
        criteria_yaml: String,
    ) -> AppResult<EvaluationCriteria> {
        // The unique index still guards against races; this check just gives
        // callers a clean 409 in the common case.
        if self
            .find_criteria_by_agent(&agent_name, version)
            .await?
            .is_some()
        {
            return Err(AppError::conflict(format!(
                "criteria for agent '{}' version {}",
                agent_name, version
            )));
        }

        let active_model = criteria::ActiveModel {
            id: Set(Uuid::new_v4()),
            agent_name: Set(agent_name.clone()),
            version: Set(version),
            criteria_yaml: Set(criteria_yaml),
            created_at: Set(chrono::Utc::now()),
        };

        // A concurrent writer can slip past the pre-check; the unique index
        // rejects it here and still surfaces as a 409.
        let model = active_model
            .insert(&self.db)
            .await
            .map_err(|e| criteria_insert_error(e, &agent_name, version))?;
        Ok(EvaluationCriteria::from(model))
    }

    async fn find_criteria(&self, id: Uuid) -> AppResult<Option<EvaluationCriteria>> {
        let result = CriteriaEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(EvaluationCriteria::from))
    }

    async fn find_criteria_by_agent(
        &self,
        agent_name: &str,
        version: i32,
    ) -> AppResult<Option<EvaluationCriteria>> {
        let result = CriteriaEntity::find()
            .filter(criteria::Column::AgentName.eq(agent_name))
            .filter(criteria::Column::Version.eq(version))
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(EvaluationCriteria::from))
    }

    async fn create_job(
        &self,
        criteria: &EvaluationCriteria,
        prompt: String,
        output: Option<String>,
    ) -> AppResult<EvaluationJob> {
        let now = chrono::Utc::now();
        let active_model = evaluation_job::ActiveModel {
            id: Set(Uuid::new_v4()),
            criteria_id: Set(criteria.id),
            agent_name: Set(criteria.agent_name.clone()),
            version: Set(criteria.version),
            prompt: Set(prompt),
            output: Set(output),
            status: Set(JobStatus::Pending.as_str().to_string()),
            results: Set(None),
            error_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            completed_at: Set(None),
        };

        let model = active_model.insert(&self.db).await.map_err(AppError::from)?;
        Ok(EvaluationJob::from(model))
    }

    async fn find_job(&self, id: Uuid) -> AppResult<Option<EvaluationJob>> {
        let result = JobEntity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(AppError::from)?;

        Ok(result.map(EvaluationJob::from))
    }

    async fn mark_in_progress(&self, id: Uuid) -> AppResult<EvaluationJob> {
        let job = self.fetch_job_model(id).await?;

        let mut active: evaluation_job::ActiveModel = job.into();
        active.status = Set(JobStatus::InProgress.as_str().to_string());
        active.updated_at = Set(chrono::Utc::now());

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(EvaluationJob::from(model))
    }

    async fn complete_job(
        &self,
        id: Uuid,
        results: serde_json::Value,
    ) -> AppResult<EvaluationJob> {
        let job = self.fetch_job_model(id).await?;

        let now = chrono::Utc::now();
        let mut active: evaluation_job::ActiveModel = job.into();
        active.status = Set(JobStatus::Completed.as_str().to_string());
        active.results = Set(Some(results));
        active.error_message = Set(None);
        active.updated_at = Set(now);
        active.completed_at = Set(Some(now));

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(EvaluationJob::from(model))
    }

    async fn fail_job(&self, id: Uuid, error_message: &str) -> AppResult<EvaluationJob> {
        let job = self.fetch_job_model(id).await?;

        let now = chrono::Utc::now();
        let mut active: evaluation_job::ActiveModel = job.into();
        active.status = Set(JobStatus::Failed.as_str().to_string());
        active.error_message = Set(Some(error_message.to_string()));
        active.updated_at = Set(now);
        active.completed_at = Set(Some(now));

        let model = active.update(&self.db).await.map_err(AppError::from)?;
        Ok(EvaluationJob::from(model))
    }
}
