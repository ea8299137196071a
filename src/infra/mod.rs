//! Infrastructure layer - External systems integration
//!
//! This module handles all external system concerns:
//! - Database connections and repositories
//! - The Redis result backend and rate limiting
//! - Schema migrations

pub mod cache;
pub mod db;
pub mod repositories;

pub use cache::{RateLimiter, RedisBackend, ResultStore};
pub use db::{Database, Migrator};
pub use repositories::{EvaluationRepository, EvaluationStore};

#[cfg(any(test, feature = "test-utils"))]
pub use cache::{MockRateLimiter, MockResultStore};
#[cfg(any(test, feature = "test-utils"))]
pub use repositories::MockEvaluationRepository;
