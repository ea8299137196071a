//! Repository layer - Data access abstraction
//!
//! Repositories provide an abstraction over data persistence,
//! following the Repository pattern for clean separation of concerns.

pub(crate) mod entities;
mod evaluation_repository;

pub use evaluation_repository::{EvaluationRepository, EvaluationStore};

// Export mock for tests (both unit and integration)
#[cfg(any(test, feature = "test-utils"))]
pub use evaluation_repository::MockEvaluationRepository;
