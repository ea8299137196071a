//! Background jobs - queue abstraction and evaluation processing.

mod process_evaluation;
mod queue;

pub use process_evaluation::{process_evaluation_handler, ProcessEvaluation, WorkerContext};
pub use queue::{JobQueue, RedisQueue};

#[cfg(any(test, feature = "test-utils"))]
pub use queue::MockJobQueue;
