//! Application services layer - Use cases and business logic.
//!
//! Services orchestrate domain logic and infrastructure to fulfill
//! application use cases. They depend on abstractions (traits) for
//! dependency inversion.

mod evaluation_service;
mod openai_service;
mod polling_service;

pub use evaluation_service::{EvaluationManager, EvaluationService};
pub use openai_service::{CompletionClient, Evaluator, OpenAiClient, SimulatedClient};
pub use polling_service::{ConnectionManager, LongPoller, PollResponse, PollingService};

#[cfg(any(test, feature = "test-utils"))]
pub use evaluation_service::MockEvaluationService;
#[cfg(any(test, feature = "test-utils"))]
pub use openai_service::MockCompletionClient;
#[cfg(any(test, feature = "test-utils"))]
pub use polling_service::MockPollingService;
