//! Application settings loaded from environment variables.
//!
//! Unparseable numeric values fall back to their defaults rather than
//! aborting startup, so a stray value in the environment degrades
//! gracefully instead of taking the service down.

use std::env;

use crate::errors::{AppError, AppResult};

use super::constants::{
    DEFAULT_APP_ENV, DEFAULT_DATABASE_URL, DEFAULT_GLOBAL_MAX_CONNECTIONS,
    DEFAULT_LONG_POLLING_POLL_INTERVAL_MS, DEFAULT_LONG_POLLING_TIMEOUT_SECONDS,
    DEFAULT_MAX_CLIENT_CONNECTIONS, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
    DEFAULT_RATE_LIMIT_REQUESTS, DEFAULT_RATE_LIMIT_WINDOW_SECONDS, DEFAULT_REDIS_HOST,
    DEFAULT_REDIS_PORT, DEFAULT_SERVICE_HOST, DEFAULT_SERVICE_PORT, DEFAULT_WORKER_CONCURRENCY,
};

/// Long polling tuning knobs
#[derive(Clone, Debug)]
pub struct LongPollingConfig {
    /// Timeout applied when a request does not specify one, in seconds
    pub default_timeout_secs: u64,
    /// Interval between job status re-reads, in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum simultaneous polls per client
    pub max_client_connections: usize,
    /// Maximum simultaneous polls across all clients
    pub global_max_connections: usize,
    /// Rate limit window in seconds
    pub rate_limit_window_secs: u64,
    /// Requests allowed per rate limit window
    pub rate_limit_requests: u64,
}

impl Default for LongPollingConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: DEFAULT_LONG_POLLING_TIMEOUT_SECONDS,
            poll_interval_ms: DEFAULT_LONG_POLLING_POLL_INTERVAL_MS,
            max_client_connections: DEFAULT_MAX_CLIENT_CONNECTIONS,
            global_max_connections: DEFAULT_GLOBAL_MAX_CONNECTIONS,
            rate_limit_window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
            rate_limit_requests: DEFAULT_RATE_LIMIT_REQUESTS,
        }
    }
}

/// Application configuration
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub app_env: String,
    pub service_host: String,
    pub service_port: u16,
    pub redis_host: String,
    pub redis_port: u16,
    /// Broker URL the job queue connects to
    pub broker_url: String,
    /// Result backend URL evaluation results are written to
    pub result_backend_url: String,
    openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: String,
    /// Bound on concurrent model calls per worker
    pub worker_concurrency: usize,
    pub long_polling: LongPollingConfig,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("database_url", &"[REDACTED]")
            .field("app_env", &self.app_env)
            .field("service_host", &self.service_host)
            .field("service_port", &self.service_port)
            .field("broker_url", &"[REDACTED]")
            .field("result_backend_url", &"[REDACTED]")
            .field("openai_api_key", &"[REDACTED]")
            .field("openai_model", &self.openai_model)
            .field("worker_concurrency", &self.worker_concurrency)
            .field("long_polling", &self.long_polling)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let redis_host = env::var("REDIS_HOST").unwrap_or_else(|_| DEFAULT_REDIS_HOST.to_string());
        let redis_port = env_parse("REDIS_PORT", DEFAULT_REDIS_PORT);

        // Explicit URLs take precedence, then the legacy CELERY_* names
        // still found in older deployments, then a URL derived from REDIS_*.
        let derived_redis_url = format!("redis://{}:{}/0", redis_host, redis_port);
        let broker_url = env::var("BROKER_URL")
            .or_else(|_| env::var("CELERY_BROKER_URL"))
            .unwrap_or_else(|_| derived_redis_url.clone());
        let result_backend_url = env::var("RESULT_BACKEND_URL")
            .or_else(|_| env::var("CELERY_RESULT_BACKEND"))
            .unwrap_or_else(|_| derived_redis_url);

        // Blank model values fall back to the default.
        let openai_model = env::var("OPENAI_MODEL")
            .ok()
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string());

        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
            app_env: env::var("APP_ENV").unwrap_or_else(|_| DEFAULT_APP_ENV.to_string()),
            service_host: env::var("SERVICE_HOST")
                .unwrap_or_else(|_| DEFAULT_SERVICE_HOST.to_string()),
            service_port: env_parse("SERVICE_PORT", DEFAULT_SERVICE_PORT),
            redis_host,
            redis_port,
            broker_url,
            result_backend_url,
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            openai_model,
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string()),
            worker_concurrency: env_parse("EVAL_WORKER_CONCURRENCY", DEFAULT_WORKER_CONCURRENCY),
            long_polling: LongPollingConfig {
                default_timeout_secs: env_parse(
                    "LONG_POLLING_DEFAULT_TIMEOUT",
                    DEFAULT_LONG_POLLING_TIMEOUT_SECONDS,
                ),
                poll_interval_ms: env_parse(
                    "LONG_POLLING_POLL_INTERVAL_MS",
                    DEFAULT_LONG_POLLING_POLL_INTERVAL_MS,
                ),
                max_client_connections: env_parse(
                    "LONG_POLLING_MAX_CLIENT_CONNECTIONS",
                    DEFAULT_MAX_CLIENT_CONNECTIONS,
                ),
                global_max_connections: env_parse(
                    "LONG_POLLING_GLOBAL_MAX_CONNECTIONS",
                    DEFAULT_GLOBAL_MAX_CONNECTIONS,
                ),
                rate_limit_window_secs: env_parse(
                    "LONG_POLLING_RATE_LIMIT_INTERVAL",
                    DEFAULT_RATE_LIMIT_WINDOW_SECONDS,
                ),
                rate_limit_requests: env_parse(
                    "LONG_POLLING_RATE_LIMIT_REQUESTS",
                    DEFAULT_RATE_LIMIT_REQUESTS,
                ),
            },
        }
    }

    /// Validated API key for the completion client.
    ///
    /// Errors if the key is not configured or blank, so call sites fail at
    /// the point of use rather than at startup.
    pub fn openai_api_key(&self) -> AppResult<&str> {
        self.openai_api_key.as_deref().ok_or_else(|| {
            AppError::internal(
                "OPENAI_API_KEY is not configured. Set the OPENAI_API_KEY environment variable.",
            )
        })
    }

    /// Whether a completion API key is configured at all.
    pub fn has_openai_api_key(&self) -> bool {
        self.openai_api_key.is_some()
    }

    /// Get the full server address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.service_host, self.service_port)
    }
}

/// Read an environment variable, falling back to `default` when the
/// variable is unset or does not parse.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied_when_env_is_empty() {
        let config = LongPollingConfig::default();
        assert_eq!(config.default_timeout_secs, 30);
        assert_eq!(config.poll_interval_ms, 500);
        assert_eq!(config.max_client_connections, 5);
        assert_eq!(config.global_max_connections, 1000);
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("ENV_PARSE_TEST_GARBAGE", "not-a-number");
        let parsed: u16 = env_parse("ENV_PARSE_TEST_GARBAGE", 42);
        assert_eq!(parsed, 42);
        std::env::remove_var("ENV_PARSE_TEST_GARBAGE");
    }

    #[test]
    fn legacy_celery_urls_are_honored_as_fallbacks() {
        std::env::set_var("CELERY_BROKER_URL", "redis://legacy-broker:6379/0");
        std::env::set_var("CELERY_RESULT_BACKEND", "redis://legacy-backend:6379/1");

        let config = Config::from_env();
        assert_eq!(config.broker_url, "redis://legacy-broker:6379/0");
        assert_eq!(config.result_backend_url, "redis://legacy-backend:6379/1");

        std::env::remove_var("CELERY_BROKER_URL");
        std::env::remove_var("CELERY_RESULT_BACKEND");
    }

    #[test]
    fn missing_api_key_is_an_error() {
        let config = Config {
            database_url: "sqlite::memory:".into(),
            app_env: "test".into(),
            service_host: "0.0.0.0".into(),
            service_port: 8000,
            redis_host: "localhost".into(),
            redis_port: 6379,
            broker_url: "redis://localhost:6379/0".into(),
            result_backend_url: "redis://localhost:6379/0".into(),
            openai_api_key: None,
            openai_model: "gpt-3.5-turbo".into(),
            openai_base_url: "https://api.openai.com/v1".into(),
            worker_concurrency: 4,
            long_polling: LongPollingConfig::default(),
        };

        assert!(config.openai_api_key().is_err());
        assert!(!config.has_openai_api_key());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let config = Config {
            database_url: "postgres://user:hunter2@db/eval".into(),
            app_env: "test".into(),
            service_host: "0.0.0.0".into(),
            service_port: 8000,
            redis_host: "localhost".into(),
            redis_port: 6379,
            broker_url: "redis://:hunter2@localhost:6379/0".into(),
            result_backend_url: "redis://localhost:6379/0".into(),
            openai_api_key: Some("sk-secret".into()),
            openai_model: "gpt-3.5-turbo".into(),
            openai_base_url: "https://api.openai.com/v1".into(),
            worker_concurrency: 4,
            long_polling: LongPollingConfig::default(),
        };

        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("sk-secret"));
    }
}
