//! Evaluation domain entities.
//!
//! An `EvaluationCriteria` row is a versioned YAML document describing how an
//! agent's output should be judged. An `EvaluationJob` is one request to apply
//! that document to a concrete prompt/output pair; the worker fills in
//! `results` once the model calls complete.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::config::DEFAULT_EVAL_SAMPLES;
use crate::errors::{AppError, AppResult};

/// Lifecycle state of an evaluation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    /// Database representation
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Whether the job has finished, successfully or not
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl From<&str> for JobStatus {
    fn from(value: &str) -> Self {
        match value {
            "in_progress" => JobStatus::InProgress,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            // Unknown values are treated as pending
            _ => JobStatus::Pending,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a criterion is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationMethod {
    /// Numeric score between 0 and 100
    Score,
    /// Binary success/failure verdict
    SuccessFailure,
}

impl std::fmt::Display for EvaluationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvaluationMethod::Score => f.write_str("score"),
            EvaluationMethod::SuccessFailure => f.write_str("success-failure"),
        }
    }
}

/// Versioned evaluation criteria for an agent
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationCriteria {
    pub id: Uuid,
    pub agent_name: String,
    pub version: i32,
    pub criteria_yaml: String,
    pub created_at: DateTime<Utc>,
}

impl EvaluationCriteria {
    /// Parse the stored YAML document into its structured form.
    pub fn spec(&self) -> AppResult<CriteriaSpec> {
        CriteriaSpec::parse(&self.criteria_yaml)
    }
}

/// One evaluation request against a criteria document
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationJob {
    pub id: Uuid,
    pub criteria_id: Uuid,
    pub agent_name: String,
    pub version: i32,
    pub prompt: String,
    pub output: Option<String>,
    pub status: JobStatus,
    pub results: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Parsed criteria document
#[derive(Debug, Clone, Deserialize)]
pub struct CriteriaSpec {
    pub criteria: Vec<CriterionSpec>,
}

/// One criterion inside a criteria document
#[derive(Debug, Clone, Deserialize)]
pub struct CriterionSpec {
    pub name: String,
    pub method: EvaluationMethod,
    pub rules: serde_yaml::Value,
    /// Model samples collected for this criterion
    #[serde(default = "default_samples")]
    pub samples: usize,
}

fn default_samples() -> usize {
    DEFAULT_EVAL_SAMPLES
}

impl CriteriaSpec {
    /// Parse and validate a criteria YAML document.
    pub fn parse(yaml: &str) -> AppResult<Self> {
        let spec: CriteriaSpec = serde_yaml::from_str(yaml)
            .map_err(|e| AppError::validation(format!("invalid criteria YAML: {}", e)))?;

        if spec.criteria.is_empty() {
            return Err(AppError::validation(
                "criteria document must define at least one criterion",
            ));
        }
        for criterion in &spec.criteria {
            if criterion.name.trim().is_empty() {
                return Err(AppError::validation("criterion name must not be empty"));
            }
            if criterion.samples == 0 {
                return Err(AppError::validation(format!(
                    "criterion '{}' must request at least one sample",
                    criterion.name
                )));
            }
        }

        Ok(spec)
    }
}

/// One raw model reply with its parsed value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleResult {
    pub raw: String,
    pub parsed: serde_json::Value,
}

/// Success/failure verdict for a single sample or an aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Success,
    Failure,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Success => f.write_str("success"),
            Verdict::Failure => f.write_str("failure"),
        }
    }
}

/// Aggregated outcome of all samples for one criterion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AggregateResult {
    /// Mean score rounded to one decimal
    Score { score: f64 },
    /// Majority vote over sample verdicts; ties resolve to failure
    Vote {
        verdict: Verdict,
        success_count: usize,
        failure_count: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::from(status.as_str()), status);
        }
        // Unknown values default to pending
        assert_eq!(JobStatus::from("garbage"), JobStatus::Pending);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn criteria_spec_parses_both_methods() {
        let yaml = r#"
criteria:
  - name: accuracy
    method: score
    rules: "Answer must match the reference"
    samples: 3
  - name: tone
    method: success-failure
    rules:
      - no profanity
      - polite register
"#;
        let spec = CriteriaSpec::parse(yaml).unwrap();
        assert_eq!(spec.criteria.len(), 2);
        assert_eq!(spec.criteria[0].method, EvaluationMethod::Score);
        assert_eq!(spec.criteria[0].samples, 3);
        assert_eq!(spec.criteria[1].method, EvaluationMethod::SuccessFailure);
        assert_eq!(spec.criteria[1].samples, DEFAULT_EVAL_SAMPLES);
    }

    #[test]
    fn criteria_spec_rejects_bad_documents() {
        assert!(CriteriaSpec::parse("criteria: []").is_err());
        assert!(CriteriaSpec::parse("not yaml at all: [").is_err());
        assert!(CriteriaSpec::parse(
            "criteria:\n  - name: ''\n    method: score\n    rules: r\n"
        )
        .is_err());
        assert!(CriteriaSpec::parse(
            "criteria:\n  - name: a\n    method: score\n    rules: r\n    samples: 0\n"
        )
        .is_err());
    }
}
