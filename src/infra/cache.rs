//! Redis result backend and rate limiting.
//!
//! The worker writes finished evaluation results here so clients can fetch
//! them without touching the database, and the API uses the same connection
//! for rate limit counters and health checks.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisError};
use serde_json::Value;

use crate::config::{
    Config, BACKEND_PREFIX_RATE_LIMIT, BACKEND_PREFIX_RESULT, DEFAULT_RESULT_TTL_SECONDS,
};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Stores and fetches evaluation results keyed by job id.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Write a finished result with the default TTL.
    async fn store_result(&self, job_id: uuid::Uuid, result: &Value) -> AppResult<()>;

    /// Fetch a result, if the worker has published one.
    async fn fetch_result(&self, job_id: uuid::Uuid) -> AppResult<Option<Value>>;
}

/// Sliding-window request counting.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count a request against `identifier` and report `(count, allowed)`.
    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)>;
}

/// Redis-backed result backend shared by the API and the worker.
#[derive(Clone)]
pub struct RedisBackend {
    connection: ConnectionManager,
    result_ttl: u64,
}

impl RedisBackend {
    /// Connect to the result backend.
    ///
    /// # Panics
    /// Panics if the connection fails; `serve` treats a missing backend as fatal.
    pub async fn connect(config: &Config) -> Self {
        Self::try_connect(config)
            .await
            .expect("Failed to connect to Redis result backend")
    }

    /// Try to connect, returning an error instead of panicking.
    pub async fn try_connect(config: &Config) -> Result<Self, RedisError> {
        let client = Client::open(config.result_backend_url.as_str())?;
        let connection = ConnectionManager::new(client).await?;

        tracing::info!("Result backend connected");

        Ok(Self {
            connection,
            result_ttl: DEFAULT_RESULT_TTL_SECONDS,
        })
    }

    /// Round-trip a PING to verify the connection is alive.
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(backend_error)?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(AppError::backend(format!("unexpected PING reply: {}", pong)))
        }
    }

    fn result_key(job_id: uuid::Uuid) -> String {
        format!("{}{}", BACKEND_PREFIX_RESULT, job_id)
    }
}

#[async_trait]
impl ResultStore for RedisBackend {
    async fn store_result(&self, job_id: uuid::Uuid, result: &Value) -> AppResult<()> {
        let mut conn = self.connection.clone();
        let payload = serde_json::to_string(result)
            .map_err(|e| AppError::backend(format!("result serialization failed: {}", e)))?;

        conn.set_ex::<_, _, ()>(Self::result_key(job_id), payload, self.result_ttl)
            .await
            .map_err(backend_error)?;

        tracing::debug!(job_id = %job_id, "Result published to backend");
        Ok(())
    }

    async fn fetch_result(&self, job_id: uuid::Uuid) -> AppResult<Option<Value>> {
        let mut conn = self.connection.clone();
        let payload: Option<String> = conn
            .get(Self::result_key(job_id))
            .await
            .map_err(backend_error)?;

        match payload {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .map_err(|e| AppError::backend(format!("stored result is corrupt: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RateLimiter for RedisBackend {
    async fn check_rate_limit(
        &self,
        identifier: &str,
        max_requests: u64,
        window_seconds: u64,
    ) -> AppResult<(u64, bool)> {
        let key = format!("{}{}", BACKEND_PREFIX_RATE_LIMIT, identifier);
        let mut conn = self.connection.clone();

        let count: i64 = conn.incr(&key, 1).await.map_err(backend_error)?;
        if count == 1 {
            // First request opens the window
            let _: () = conn
                .expire(&key, window_seconds as i64)
                .await
                .map_err(backend_error)?;
        }

        let count = count as u64;
        Ok((count, count <= max_requests))
    }
}

/// Convert a Redis error to an AppError.
fn backend_error(e: RedisError) -> AppError {
    tracing::error!("Redis error: {}", e);
    AppError::backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_keys_are_prefixed_by_job_id() {
        let id = uuid::Uuid::new_v4();
        let key = RedisBackend::result_key(id);
        assert!(key.starts_with(BACKEND_PREFIX_RESULT));
        assert!(key.ends_with(&id.to_string()));
    }
}
