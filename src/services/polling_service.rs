//! Long polling for evaluation results.
//!
//! A long-poll holds the request open until the job reaches a terminal
//! status or the timeout budget runs out. `ConnectionManager` caps how many
//! polls a single client, and the process as a whole, may hold open.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::config::{LongPollingConfig, MIN_POLL_SLEEP_MS};
use crate::domain::JobStatus;
use crate::errors::{AppError, AppResult};
use crate::infra::EvaluationRepository;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Tracks active long-poll connections per client and globally.
pub struct ConnectionManager {
    max_client_connections: usize,
    global_max_connections: usize,
    inner: Mutex<Connections>,
}

#[derive(Default)]
struct Connections {
    per_client: HashMap<String, HashSet<Uuid>>,
    total: usize,
}

impl ConnectionManager {
    pub fn new(max_client_connections: usize, global_max_connections: usize) -> Self {
        Self {
            max_client_connections,
            global_max_connections,
            inner: Mutex::new(Connections::default()),
        }
    }

    pub fn from_config(config: &LongPollingConfig) -> Self {
        Self::new(config.max_client_connections, config.global_max_connections)
    }

    /// Register a poll for `(client, job_id)`, enforcing both limits.
    pub fn connect(&self, client: &str, job_id: Uuid) -> AppResult<()> {
        let mut conns = self.inner.lock().expect("connection lock poisoned");

        if conns.total >= self.global_max_connections {
            tracing::warn!(total = conns.total, "Global connection limit exceeded");
            return Err(AppError::TooManyRequests(
                "Connection limit exceeded".to_string(),
            ));
        }

        let client_polls = conns.per_client.entry(client.to_string()).or_default();
        if client_polls.len() >= self.max_client_connections {
            tracing::warn!(client = %client, "Per-client connection limit exceeded");
            return Err(AppError::TooManyRequests(
                "Connection limit exceeded".to_string(),
            ));
        }

        // The same client polling the same job twice only counts once.
        if client_polls.insert(job_id) {
            conns.total += 1;
        }
        tracing::debug!(client = %client, job_id = %job_id, "Long-poll connected");
        Ok(())
    }

    /// Unregister a poll. Best-effort: unknown pairs are ignored.
    pub fn disconnect(&self, client: &str, job_id: Uuid) {
        let mut conns = self.inner.lock().expect("connection lock poisoned");
        // Split the guard into field borrows
        let conns = &mut *conns;

        if let Some(client_polls) = conns.per_client.get_mut(client) {
            if client_polls.remove(&job_id) {
                conns.total = conns.total.saturating_sub(1);
            }
            if client_polls.is_empty() {
                conns.per_client.remove(client);
            }
        }
        tracing::debug!(client = %client, job_id = %job_id, "Long-poll disconnected");
    }

    /// Number of currently registered polls.
    pub fn active(&self) -> usize {
        self.inner.lock().expect("connection lock poisoned").total
    }
}

/// RAII registration so disconnect always runs, even on early returns.
struct ConnectionGuard<'a> {
    manager: &'a ConnectionManager,
    client: &'a str,
    job_id: Uuid,
}

impl Drop for ConnectionGuard<'_> {
    fn drop(&mut self) {
        self.manager.disconnect(self.client, self.job_id);
    }
}

/// Long-poll outcome serialized straight to the client
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum PollResponse {
    /// The job reached a terminal status within the budget
    Finished {
        id: Uuid,
        status: JobStatus,
        results: Option<serde_json::Value>,
        error_message: Option<String>,
        completed_at: Option<DateTime<Utc>>,
    },
    /// The budget ran out first
    Timeout { status: &'static str },
}

impl PollResponse {
    fn timeout() -> Self {
        PollResponse::Timeout { status: "timeout" }
    }
}

/// Polling service trait for dependency injection.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait PollingService: Send + Sync {
    /// Poll until the job finishes or `timeout` elapses.
    async fn poll_for_results(
        &self,
        job_id: Uuid,
        timeout: Duration,
        client: &str,
    ) -> AppResult<PollResponse>;
}

/// Concrete implementation of PollingService backed by the repository.
pub struct LongPoller {
    repo: Arc<dyn EvaluationRepository>,
    connections: Arc<ConnectionManager>,
    poll_interval: Duration,
}

impl LongPoller {
    pub fn new(
        repo: Arc<dyn EvaluationRepository>,
        connections: Arc<ConnectionManager>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            repo,
            connections,
            poll_interval,
        }
    }
}

#[async_trait]
impl PollingService for LongPoller {
    async fn poll_for_results(
        &self,
        job_id: Uuid,
        timeout: Duration,
        client: &str,
    ) -> AppResult<PollResponse> {
        self.connections.connect(client, job_id)?;
        let _guard = ConnectionGuard {
            manager: &self.connections,
            client,
            job_id,
        };

        // The initial read both validates existence and anchors the budget
        // to the job's creation time.
        let job = self.repo.find_job(job_id).await?.ok_or(AppError::NotFound)?;
        let created_at = job.created_at;
        let loop_started = Utc::now();
        let timeout_secs = timeout.as_secs_f64();

        loop {
            let now = Utc::now();
            let since_creation = (now - created_at).num_milliseconds() as f64 / 1000.0;
            let since_loop_start = (now - loop_started).num_milliseconds() as f64 / 1000.0;
            let remaining = timeout_secs - since_creation;

            // The budget counts from job creation, but a fresh poll against
            // an old job still gets at most `timeout` of wall-clock time.
            if remaining <= 0.0 || since_loop_start > timeout_secs {
                tracing::debug!(job_id = %job_id, remaining, "Long-poll timed out");
                return Ok(PollResponse::timeout());
            }

            let job = match self.repo.find_job(job_id).await {
                Ok(Some(job)) => job,
                Ok(None) => return Err(AppError::NotFound),
                Err(e) => {
                    // Degrade DB errors mid-poll to a timeout rather than
                    // surfacing internals to a waiting client.
                    tracing::error!(job_id = %job_id, error = %e, "Poll read failed");
                    return Ok(PollResponse::timeout());
                }
            };

            if job.status.is_terminal() {
                return Ok(PollResponse::Finished {
                    id: job.id,
                    status: job.status,
                    results: job.results,
                    error_message: job.error_message,
                    completed_at: job.completed_at,
                });
            }

            // Shrink the sleep as the deadline approaches.
            let quarter_remaining = Duration::from_secs_f64((remaining / 4.0).max(0.0))
                .max(Duration::from_millis(MIN_POLL_SLEEP_MS));
            let sleep_for = self.poll_interval.min(quarter_remaining);
            tokio::time::sleep(sleep_for).await;
        }
    }
}
