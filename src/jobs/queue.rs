//! Job queue abstraction over the Redis broker.

use apalis::prelude::Storage;
use apalis_redis::RedisStorage;
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::process_evaluation::ProcessEvaluation;
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Queue trait for dependency injection.
///
/// The API enqueues through this trait so handlers can be exercised without
/// a live broker.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Enqueue an evaluation job for the worker
    async fn enqueue(&self, job_id: Uuid) -> AppResult<()>;
}

/// Redis-backed queue shared between the API and the worker command.
pub struct RedisQueue {
    // Storage::push takes &mut self
    storage: Mutex<RedisStorage<ProcessEvaluation>>,
}

impl RedisQueue {
    pub fn new(storage: RedisStorage<ProcessEvaluation>) -> Self {
        Self {
            storage: Mutex::new(storage),
        }
    }

    /// Connect to the broker at `broker_url`.
    pub async fn connect(broker_url: &str) -> AppResult<Self> {
        let storage = Self::connect_storage(broker_url).await?;
        Ok(Self::new(storage))
    }

    /// Raw storage handle for the worker command.
    pub async fn connect_storage(
        broker_url: &str,
    ) -> AppResult<RedisStorage<ProcessEvaluation>> {
        let conn = apalis_redis::connect(broker_url)
            .await
            .map_err(|e| AppError::queue(format!("broker connection failed: {}", e)))?;
        Ok(RedisStorage::new(conn))
    }
}

#[async_trait]
impl JobQueue for RedisQueue {
    async fn enqueue(&self, job_id: Uuid) -> AppResult<()> {
        let mut storage = self.storage.lock().await;
        storage
            .push(ProcessEvaluation { job_id })
            .await
            .map_err(|e| AppError::queue(format!("push failed: {}", e)))?;

        tracing::info!(job_id = %job_id, "Evaluation job enqueued");
        Ok(())
    }
}
