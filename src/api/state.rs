//! Application state - Dependency injection container.
//!
//! All handlers reach infrastructure through trait objects so the router can
//! be built against mocks in tests.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::errors::AppResult;
use crate::infra::{Database, RateLimiter, RedisBackend, ResultStore};
use crate::jobs::{JobQueue, RedisQueue};
use crate::services::{
    ConnectionManager, EvaluationManager, EvaluationService, LongPoller, PollingService,
};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Connectivity checks backing `GET /health`.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait HealthCheck: Send + Sync {
    /// Database reachability
    async fn database(&self) -> AppResult<()>;
    /// Result backend reachability
    async fn backend(&self) -> AppResult<()>;
}

/// Health checks against the live database and Redis backend.
pub struct InfraHealth {
    database: Arc<Database>,
    backend: RedisBackend,
}

impl InfraHealth {
    pub fn new(database: Arc<Database>, backend: RedisBackend) -> Self {
        Self { database, backend }
    }
}

#[async_trait]
impl HealthCheck for InfraHealth {
    async fn database(&self) -> AppResult<()> {
        self.database.ping().await?;
        Ok(())
    }

    async fn backend(&self) -> AppResult<()> {
        self.backend.ping().await
    }
}

/// Request-handling knobs copied out of `Config` at startup.
#[derive(Clone)]
pub struct ApiSettings {
    /// Poll budget applied when the request does not specify one
    pub default_poll_timeout: Duration,
    /// Requests allowed per rate limit window
    pub rate_limit_requests: u64,
    /// Rate limit window length in seconds
    pub rate_limit_window_secs: u64,
}

/// Application state containing all services (DI container).
#[derive(Clone)]
pub struct AppState {
    /// Criteria and job management
    pub evaluations: Arc<dyn EvaluationService>,
    /// Long polling
    pub polling: Arc<dyn PollingService>,
    /// Broker queue the dispatch endpoint pushes to
    pub queue: Arc<dyn JobQueue>,
    /// Result backend read-through for finished jobs
    pub results: Arc<dyn ResultStore>,
    /// Redis-backed request counting
    pub limiter: Arc<dyn RateLimiter>,
    /// Health checks for `/health`
    pub checks: Arc<dyn HealthCheck>,
    /// Handler tuning knobs
    pub settings: ApiSettings,
}

impl AppState {
    /// Wire up production state from live infrastructure.
    pub fn from_config(
        config: &Config,
        database: Arc<Database>,
        backend: RedisBackend,
        queue: Arc<RedisQueue>,
    ) -> Self {
        let repo = Arc::new(crate::infra::EvaluationStore::new(database.get_connection()));
        let connections = Arc::new(ConnectionManager::from_config(&config.long_polling));
        let poller = LongPoller::new(
            repo.clone(),
            connections,
            Duration::from_millis(config.long_polling.poll_interval_ms),
        );

        Self {
            evaluations: Arc::new(EvaluationManager::new(repo)),
            polling: Arc::new(poller),
            queue,
            results: Arc::new(backend.clone()),
            limiter: Arc::new(backend.clone()),
            checks: Arc::new(InfraHealth::new(database, backend)),
            settings: ApiSettings {
                default_poll_timeout: Duration::from_secs(
                    config.long_polling.default_timeout_secs,
                ),
                rate_limit_requests: config.long_polling.rate_limit_requests,
                rate_limit_window_secs: config.long_polling.rate_limit_window_secs,
            },
        }
    }

    /// Create application state with manually injected services (tests).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        evaluations: Arc<dyn EvaluationService>,
        polling: Arc<dyn PollingService>,
        queue: Arc<dyn JobQueue>,
        results: Arc<dyn ResultStore>,
        limiter: Arc<dyn RateLimiter>,
        checks: Arc<dyn HealthCheck>,
        settings: ApiSettings,
    ) -> Self {
        Self {
            evaluations,
            polling,
            queue,
            results,
            limiter,
            checks,
            settings,
        }
    }
}
