//! SeaORM entity definitions
//!
//! These are database-specific entities separate from domain models.

pub mod criteria;
pub mod evaluation_job;
