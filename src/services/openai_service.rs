//! Model-backed criterion evaluation.
//!
//! The `Evaluator` builds a judging prompt, collects several model samples
//! concurrently, parses each reply according to the evaluation method, and
//! aggregates them into a single result per criterion.
//!
//! Without an API key the evaluator falls back to a deterministic simulated
//! client so offline runs and tests stay stable.

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::domain::{AggregateResult, EvaluationMethod, SampleResult, Verdict};
use crate::errors::{AppError, AppResult};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// First number in a model reply, e.g. "87.5 - mostly correct"
static SCORE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").expect("valid regex"));

/// One chat-completion call: prompt in, raw reply text out.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> AppResult<String>;
}

// =============================================================================
// OpenAI-compatible client
// =============================================================================

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

/// Production client talking to an OpenAI-compatible chat completion API.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> AppResult<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Completion(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::Completion(format!(
                "API returned {}: {}",
                status, detail
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Completion(format!("malformed response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| AppError::Completion("response contained no choices".to_string()))
    }
}

/// Deterministic fallback used when no API key is configured.
///
/// Score prompts get "50", everything else gets "failure".
pub struct SimulatedClient;

#[async_trait]
impl CompletionClient for SimulatedClient {
    async fn complete(&self, prompt: &str) -> AppResult<String> {
        if prompt.to_lowercase().contains("method: score") {
            Ok("50".to_string())
        } else {
            Ok("failure".to_string())
        }
    }
}

// =============================================================================
// Evaluator
// =============================================================================

/// Evaluates a criterion by sampling the model several times and aggregating.
pub struct Evaluator {
    client: Arc<dyn CompletionClient>,
    max_concurrency: usize,
}

impl Evaluator {
    /// Create an evaluator with an injected client (tests, custom backends).
    pub fn new(client: Arc<dyn CompletionClient>, max_concurrency: usize) -> Self {
        Self {
            client,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Build an evaluator from configuration.
    ///
    /// Falls back to the simulated client when no API key is set, so local
    /// runs do not require network access.
    pub fn from_config(config: &Config) -> Self {
        let client: Arc<dyn CompletionClient> = match config.openai_api_key() {
            Ok(api_key) => Arc::new(OpenAiClient::new(
                api_key.to_string(),
                config.openai_model.clone(),
                config.openai_base_url.clone(),
            )),
            Err(_) => {
                tracing::warn!("OPENAI_API_KEY not set, using simulated completion client");
                Arc::new(SimulatedClient)
            }
        };

        Self::new(client, config.worker_concurrency)
    }

    /// Construct the judging prompt for one criterion.
    pub fn build_prompt(
        method: EvaluationMethod,
        rules: &serde_yaml::Value,
        agent_output: Option<&str>,
    ) -> String {
        let rules_text = match rules {
            serde_yaml::Value::String(s) => s.clone(),
            other => serde_yaml::to_string(other).unwrap_or_else(|_| format!("{:?}", other)),
        };
        let agent_output = agent_output.unwrap_or("").trim();

        format!(
            "You are an objective evaluator.\n\
             Evaluate the following agent output using the rules below.\n\n\
             Method: {}\n\n\
             Rules:\n{}\n\n\
             Agent Output:\n{}\n\n\
             Instructions: Provide your response in plain text. For method 'score', \
             return a single numeric score between 0 and 100 optionally followed by a brief rationale. \
             For method 'success-failure', return either 'success' or 'failure' and an optional brief rationale.",
            method, rules_text, agent_output
        )
    }

    /// Collect `samples` model replies concurrently and aggregate them.
    pub async fn evaluate_criterion(
        &self,
        agent_output: Option<&str>,
        method: EvaluationMethod,
        rules: &serde_yaml::Value,
        samples: usize,
    ) -> AppResult<(Vec<SampleResult>, AggregateResult)> {
        let prompt = Self::build_prompt(method, rules, agent_output);

        let raw_replies: Vec<String> = stream::iter((0..samples).map(|_| {
            let prompt = prompt.clone();
            async move { self.client.complete(&prompt).await }
        }))
        .buffered(self.max_concurrency)
        .try_collect()
        .await?;

        let parsed_samples: Vec<SampleResult> = raw_replies
            .into_iter()
            .map(|raw| {
                let parsed = match method {
                    EvaluationMethod::Score => {
                        serde_json::json!(parse_score(&raw))
                    }
                    EvaluationMethod::SuccessFailure => {
                        serde_json::json!(parse_verdict(&raw))
                    }
                };
                SampleResult { raw, parsed }
            })
            .collect();

        let aggregate = aggregate(method, &parsed_samples);
        Ok((parsed_samples, aggregate))
    }
}

/// Extract a numeric score from a reply, clamped to [0, 100] and rounded to
/// two decimals. Replies with no number score 0.
fn parse_score(raw: &str) -> f64 {
    SCORE_RE
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(|v| (v.clamp(0.0, 100.0) * 100.0).round() / 100.0)
        .unwrap_or(0.0)
}

/// Extract a verdict from a reply. Ambiguous replies (both keywords or
/// neither) resolve to failure.
fn parse_verdict(raw: &str) -> Verdict {
    let lowered = raw.to_lowercase();
    let success = lowered.contains("success");
    let failure = lowered.contains("failure");
    if success && !failure {
        Verdict::Success
    } else {
        Verdict::Failure
    }
}

fn aggregate(method: EvaluationMethod, samples: &[SampleResult]) -> AggregateResult {
    match method {
        EvaluationMethod::Score => {
            let scores: Vec<f64> = samples
                .iter()
                .filter_map(|s| s.parsed.as_f64())
                .collect();
            let mean = if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            };
            AggregateResult::Score {
                score: (mean * 10.0).round() / 10.0,
            }
        }
        EvaluationMethod::SuccessFailure => {
            let success_count = samples
                .iter()
                .filter(|s| s.parsed.as_str() == Some("success"))
                .count();
            let failure_count = samples.len() - success_count;
            AggregateResult::Vote {
                // Majority vote; a tie counts as failure
                verdict: if success_count > failure_count {
                    Verdict::Success
                } else {
                    Verdict::Failure
                },
                success_count,
                failure_count,
            }
        }
    }
}
