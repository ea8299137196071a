//! Application-wide constants
//!
//! Centralized location for magic values to improve maintainability.

// =============================================================================
// Server Configuration
// =============================================================================

/// Default bind address for the HTTP service
pub const DEFAULT_SERVICE_HOST: &str = "0.0.0.0";

/// Default HTTP service port
pub const DEFAULT_SERVICE_PORT: u16 = 8000;

/// Default application environment
pub const DEFAULT_APP_ENV: &str = "development";

// =============================================================================
// Database
// =============================================================================

/// Default database URL (in-memory SQLite for development and tests)
pub const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

// =============================================================================
// Broker / Result Backend (Redis)
// =============================================================================

/// Default Redis host used to derive the broker and result backend URLs
pub const DEFAULT_REDIS_HOST: &str = "localhost";

/// Default Redis port
pub const DEFAULT_REDIS_PORT: u16 = 6379;

/// Key prefix for evaluation results stored in the result backend
pub const BACKEND_PREFIX_RESULT: &str = "eval:result:";

/// Key prefix for rate limiting counters
pub const BACKEND_PREFIX_RATE_LIMIT: &str = "rate_limit:";

/// How long evaluation results live in the result backend (24 hours)
pub const DEFAULT_RESULT_TTL_SECONDS: u64 = 86_400;

// =============================================================================
// Model Evaluation
// =============================================================================

/// Default chat completion model
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Default OpenAI-compatible API base URL
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Default number of model samples collected per criterion
pub const DEFAULT_EVAL_SAMPLES: usize = 5;

/// Default bound on concurrent model calls per worker
pub const DEFAULT_WORKER_CONCURRENCY: usize = 4;

/// Evaluation attempts before a job is marked failed (1 initial + 3 retries)
pub const MAX_EVAL_ATTEMPTS: u32 = 4;

/// Delay between evaluation attempts, in seconds
pub const EVAL_RETRY_DELAY_SECONDS: u64 = 5;

/// Stored error messages are truncated to this many characters
pub const MAX_ERROR_MESSAGE_CHARS: usize = 4000;

// =============================================================================
// Long Polling
// =============================================================================

/// Default timeout for a long-poll request, in seconds
pub const DEFAULT_LONG_POLLING_TIMEOUT_SECONDS: u64 = 30;

/// Default interval between status re-reads, in milliseconds
pub const DEFAULT_LONG_POLLING_POLL_INTERVAL_MS: u64 = 500;

/// Smallest adaptive sleep when a poll deadline is near, in milliseconds
pub const MIN_POLL_SLEEP_MS: u64 = 10;

/// Default maximum simultaneous long-poll connections per client
pub const DEFAULT_MAX_CLIENT_CONNECTIONS: usize = 5;

/// Default maximum simultaneous long-poll connections across all clients
pub const DEFAULT_GLOBAL_MAX_CONNECTIONS: usize = 1000;

/// Default rate limit window for long-poll endpoints, in seconds
pub const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 60;

/// Default requests allowed per rate limit window
pub const DEFAULT_RATE_LIMIT_REQUESTS: u64 = 100;
