//! Domain layer - Core business entities.
//!
//! Pure business objects, independent of persistence and transport.

mod evaluation;

pub use evaluation::{
    AggregateResult, CriteriaSpec, CriterionSpec, EvaluationCriteria, EvaluationJob,
    EvaluationMethod, JobStatus, SampleResult, Verdict,
};
