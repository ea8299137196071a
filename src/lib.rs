//! Agent evaluation service.
//!
//! Stores versioned evaluation criteria for agents, accepts evaluation jobs
//! over HTTP, judges agent outputs with an OpenAI-compatible model through a
//! Redis-brokered background worker, and serves results via long polling.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Core business entities and logic
//! - **services**: Application use cases and business logic
//! - **infra**: Infrastructure concerns (database, Redis backend)
//! - **jobs**: Queue abstraction and the evaluation worker job
//! - **api**: HTTP handlers, middleware, and routes
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! cargo run -- serve
//!
//! # Run migrations
//! cargo run -- migrate up
//!
//! # Start the evaluation worker
//! cargo run -- jobs work
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod services;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{EvaluationCriteria, EvaluationJob, JobStatus};
pub use errors::{AppError, AppResult};
