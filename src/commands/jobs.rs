//! Jobs command - Evaluation worker management.
//!
//! Provides CLI commands to manage the evaluation queue:
//! - `work`: Start the evaluation worker process
//! - `list`: Show queue depth
//! - `clear`: Vacuum finished jobs from the queue
//!
//! ## Usage
//!
//! ```bash
//! # Start the worker
//! cargo run -- jobs work
//!
//! # Show queue depth
//! cargo run -- jobs list
//!
//! # Vacuum finished jobs
//! cargo run -- jobs clear
//! ```

use std::sync::Arc;

use crate::cli::args::{JobsAction, JobsArgs};
use crate::config::Config;
use crate::errors::{AppError, AppResult};

/// Execute the jobs command
pub async fn execute(args: JobsArgs, config: Config) -> AppResult<()> {
    match args.action {
        JobsAction::Work => run_worker(&config).await,
        JobsAction::List => list_jobs(&config).await,
        JobsAction::Clear => clear_jobs(&config).await,
    }
}

/// Start the evaluation worker
///
/// Connects to the database and the broker, then processes evaluation jobs
/// until interrupted.
async fn run_worker(config: &Config) -> AppResult<()> {
    use apalis::prelude::*;

    use crate::infra::{Database, EvaluationStore, RedisBackend};
    use crate::jobs::{process_evaluation_handler, RedisQueue, WorkerContext};
    use crate::services::Evaluator;

    tracing::info!("Connecting worker infrastructure...");

    let db = Database::connect(config).await;
    let backend = RedisBackend::connect(config).await;
    let storage = RedisQueue::connect_storage(&config.broker_url).await?;

    let context = WorkerContext {
        repo: Arc::new(EvaluationStore::new(db.get_connection())),
        evaluator: Arc::new(Evaluator::from_config(config)),
        results: Arc::new(backend),
    };

    tracing::info!("Evaluation worker started. Press Ctrl+C to stop.");

    let worker = WorkerBuilder::new("evaluation-worker")
        .data(context)
        .backend(storage)
        .build_fn(process_evaluation_handler);

    // Run with graceful shutdown on Ctrl+C
    let monitor = Monitor::new().register(worker);

    tokio::select! {
        result = monitor.run() => {
            if let Err(e) = result {
                tracing::error!("Worker error: {}", e);
                return Err(AppError::internal(format!("Worker failed: {}", e)));
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping worker...");
        }
    }

    tracing::info!("Evaluation worker stopped.");
    Ok(())
}

/// Show how many evaluation jobs are waiting on the broker
async fn list_jobs(config: &Config) -> AppResult<()> {
    use apalis::prelude::Storage;

    use crate::jobs::RedisQueue;

    let mut storage = RedisQueue::connect_storage(&config.broker_url).await?;
    let depth = storage
        .len()
        .await
        .map_err(|e| AppError::queue(format!("queue length query failed: {}", e)))?;

    println!("\n=== Evaluation Queue ===");
    println!("Queued jobs: {}", depth);
    println!("========================\n");

    Ok(())
}

/// Vacuum finished jobs from the broker
async fn clear_jobs(config: &Config) -> AppResult<()> {
    use apalis::prelude::Storage;

    use crate::jobs::RedisQueue;

    let mut storage = RedisQueue::connect_storage(&config.broker_url).await?;
    let removed = storage
        .vacuum()
        .await
        .map_err(|e| AppError::queue(format!("queue vacuum failed: {}", e)))?;

    println!("Cleared {} finished job(s) from the queue.", removed);

    Ok(())
}
