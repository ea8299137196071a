//! HTTP request handlers.

pub mod criteria_handler;
pub mod jobs_handler;
pub mod polling_handler;
pub mod tasks_handler;

pub use criteria_handler::criteria_routes;
pub use jobs_handler::jobs_routes;
pub use polling_handler::polling_routes;
pub use tasks_handler::tasks_routes;
