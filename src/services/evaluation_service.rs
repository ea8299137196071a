//! Evaluation criteria and job management.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::{CriteriaSpec, EvaluationCriteria, EvaluationJob};
use crate::errors::{AppError, AppResult};
use crate::infra::EvaluationRepository;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Evaluation service trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait EvaluationService: Send + Sync {
    /// Validate and store a new criteria document
    async fn create_criteria(
        &self,
        agent_name: String,
        version: i32,
        criteria_yaml: String,
    ) -> AppResult<EvaluationCriteria>;

    /// Create a pending job referencing an existing criteria document
    async fn create_job(
        &self,
        criteria_id: Uuid,
        prompt: String,
        output: Option<String>,
    ) -> AppResult<EvaluationJob>;

    /// Fetch a job by id
    async fn get_job(&self, id: Uuid) -> AppResult<EvaluationJob>;
}

/// Concrete implementation of EvaluationService
pub struct EvaluationManager {
    repo: Arc<dyn EvaluationRepository>,
}

impl EvaluationManager {
    /// Create new service instance
    pub fn new(repo: Arc<dyn EvaluationRepository>) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl EvaluationService for EvaluationManager {
    async fn create_criteria(
        &self,
        agent_name: String,
        version: i32,
        criteria_yaml: String,
    ) -> AppResult<EvaluationCriteria> {
        // Reject malformed documents up front so nothing unparseable ever
        // reaches the worker.
        CriteriaSpec::parse(&criteria_yaml)?;

        let criteria = self
            .repo
            .create_criteria(agent_name, version, criteria_yaml)
            .await?;

        tracing::info!(
            criteria_id = %criteria.id,
            agent_name = %criteria.agent_name,
            version = criteria.version,
            "Criteria created"
        );
        Ok(criteria)
    }

    async fn create_job(
        &self,
        criteria_id: Uuid,
        prompt: String,
        output: Option<String>,
    ) -> AppResult<EvaluationJob> {
        let criteria = self
            .repo
            .find_criteria(criteria_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let job = self.repo.create_job(&criteria, prompt, output).await?;

        tracing::info!(
            job_id = %job.id,
            agent_name = %job.agent_name,
            version = job.version,
            "Evaluation job created"
        );
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> AppResult<EvaluationJob> {
        self.repo.find_job(id).await?.ok_or(AppError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobStatus;
    use crate::infra::MockEvaluationRepository;
    use chrono::Utc;

    const VALID_YAML: &str = "criteria:\n  - name: accuracy\n    method: score\n    rules: r\n";

    fn criteria_fixture() -> EvaluationCriteria {
        EvaluationCriteria {
            id: Uuid::new_v4(),
            agent_name: "support-bot".to_string(),
            version: 1,
            criteria_yaml: VALID_YAML.to_string(),
            created_at: Utc::now(),
        }
    }

    fn job_fixture(criteria: &EvaluationCriteria) -> EvaluationJob {
        let now = Utc::now();
        EvaluationJob {
            id: Uuid::new_v4(),
            criteria_id: criteria.id,
            agent_name: criteria.agent_name.clone(),
            version: criteria.version,
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

    #[tokio::test]
    async fn create_criteria_rejects_invalid_yaml_without_touching_the_store() {
        let mut repo = MockEvaluationRepository::new();
        repo.expect_create_criteria().never();

        let service = EvaluationManager::new(Arc::new(repo));
        let err = service
            .create_criteria("support-bot".to_string(), 1, "criteria: []".to_string())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn create_criteria_stores_valid_documents() {
        let fixture = criteria_fixture();
        let expected_id = fixture.id;

        let mut repo = MockEvaluationRepository::new();
        repo.expect_create_criteria()
            .withf(|agent, version, _| agent == "support-bot" && *version == 1)
            .return_once(move |_, _, _| Ok(fixture));

        let service = EvaluationManager::new(Arc::new(repo));
        let created = service
            .create_criteria("support-bot".to_string(), 1, VALID_YAML.to_string())
            .await
            .unwrap();

        assert_eq!(created.id, expected_id);
    }

    #[tokio::test]
    async fn create_job_requires_existing_criteria() {
        let mut repo = MockEvaluationRepository::new();
        repo.expect_find_criteria().returning(|_| Ok(None));
        repo.expect_create_job().never();

        let service = EvaluationManager::new(Arc::new(repo));
        let err = service
            .create_job(Uuid::new_v4(), "prompt".to_string(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::NotFound));
    }

    #[tokio::test]
    async fn create_job_links_job_to_criteria() {
        let fixture = criteria_fixture();
        let job = job_fixture(&fixture);
        let criteria_id = fixture.id;

        let mut repo = MockEvaluationRepository::new();
        repo.expect_find_criteria()
            .return_once(move |_| Ok(Some(fixture)));
        repo.expect_create_job()
            .withf(move |criteria, prompt, _| {
                criteria.id == criteria_id && prompt == "What is 2+2?"
            })
            .return_once(move |_, _, _| Ok(job));

        let service = EvaluationManager::new(Arc::new(repo));
        let created = service
            .create_job(
                criteria_id,
                "What is 2+2?".to_string(),
                Some("4".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(created.criteria_id, criteria_id);
        assert_eq!(created.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn get_job_maps_missing_to_not_found() {
        let mut repo = MockEvaluationRepository::new();
        repo.expect_find_job().returning(|_| Ok(None));

        let service = EvaluationManager::new(Arc::new(repo));
        let err = service.get_job(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
