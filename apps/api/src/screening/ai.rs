//! AI capability behind the screener: keyword generation and candidate evaluation.
//!
//! `ScreeningModel` is the seam. `LlmScreeningModel` is the production backend
//! over `LlmClient`; tests substitute a scripted double. The evaluator holds an
//! `Arc<dyn ScreeningModel>`, so backends swap without touching callers.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::llm_client::prompts::json_system;
use crate::llm_client::{LlmClient, LlmError};
use crate::screening::models::{AiVerdict, Decision, MatchResult};
use crate::screening::prompts::{
    EVALUATION_PROMPT_TEMPLATE, EVALUATION_ROLE, KEYWORD_PROMPT_TEMPLATE, KEYWORD_ROLE,
};

const KEYWORD_TEMPERATURE: f32 = 0.1;
const EVALUATION_TEMPERATURE: f32 = 0.4;

#[derive(Debug, Clone, Error)]
pub enum AiServiceError {
    /// Network failure, timeout or 5xx. Worth one more attempt.
    #[error("AI service unavailable: {0}")]
    Transient(String),

    /// The model answered, but not with a usable verdict.
    #[error("AI response malformed: {0}")]
    Malformed(String),

    /// Auth, quota or request errors that a retry will not fix.
    #[error("AI service rejected the request: {0}")]
    Rejected(String),
}

impl AiServiceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AiServiceError::Transient(_))
    }
}

impl From<LlmError> for AiServiceError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Parse(_) | LlmError::EmptyContent => AiServiceError::Malformed(err.to_string()),
            e if e.is_transient() => AiServiceError::Transient(e.to_string()),
            e => AiServiceError::Rejected(e.to_string()),
        }
    }
}

/// The AI capability trait. Implement this to swap providers or to script
/// responses in tests.
#[async_trait]
pub trait ScreeningModel: Send + Sync {
    /// Keywords that define the core requirements of a job description.
    async fn generate_keywords(&self, jd_text: &str) -> Result<Vec<String>, AiServiceError>;

    /// Qualitative verdict for one resume, given the keyword match as context.
    async fn evaluate(
        &self,
        resume_text: &str,
        jd_text: &str,
        matches: &MatchResult,
    ) -> Result<AiVerdict, AiServiceError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LlmScreeningModel
// ────────────────────────────────────────────────────────────────────────────

/// Production backend: prompts the configured provider through `LlmClient`.
pub struct LlmScreeningModel {
    llm: LlmClient,
}

impl LlmScreeningModel {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[derive(Debug, Deserialize)]
struct KeywordResponse {
    keywords: Vec<String>,
}

#[async_trait]
impl ScreeningModel for LlmScreeningModel {
    async fn generate_keywords(&self, jd_text: &str) -> Result<Vec<String>, AiServiceError> {
        let prompt = KEYWORD_PROMPT_TEMPLATE.replace("{jd_text}", jd_text);
        let response: KeywordResponse = self
            .llm
            .call_json(&prompt, &json_system(KEYWORD_ROLE), KEYWORD_TEMPERATURE)
            .await?;
        Ok(response.keywords)
    }

    async fn evaluate(
        &self,
        resume_text: &str,
        jd_text: &str,
        matches: &MatchResult,
    ) -> Result<AiVerdict, AiServiceError> {
        let prompt = build_evaluation_prompt(resume_text, jd_text, matches);
        let raw: Value = self
            .llm
            .call_json(&prompt, &json_system(EVALUATION_ROLE), EVALUATION_TEMPERATURE)
            .await?;
        validate_verdict(raw)
    }
}

fn build_evaluation_prompt(resume_text: &str, jd_text: &str, matches: &MatchResult) -> String {
    let list = |items: &[String]| {
        if items.is_empty() {
            "none".to_string()
        } else {
            items.join(", ")
        }
    };

    EVALUATION_PROMPT_TEMPLATE
        .replace("{total_keywords}", &matches.total_keywords().to_string())
        .replace("{matched_count}", &matches.matched.len().to_string())
        .replace("{matched_keywords}", &list(&matches.matched))
        .replace("{missing_keywords}", &list(&matches.missing))
        .replace("{initial_decision}", matches.strength.describe())
        // Free text last so placeholders inside a resume are left alone.
        .replace("{jd_text}", jd_text)
        .replace("{resume_text}", resume_text)
}

// ────────────────────────────────────────────────────────────────────────────
// Verdict validation
// ────────────────────────────────────────────────────────────────────────────

/// Checks an untrusted model response against the verdict shape.
///
/// Required: `decision` ∈ {Shortlisted, Not Shortlisted}, a non-empty
/// `evaluation_summary`, and `overall_score` as a number (or numeric string)
/// within 0–100. `criteria_breakdown` lists default to empty.
pub fn validate_verdict(raw: Value) -> Result<AiVerdict, AiServiceError> {
    let object = raw
        .as_object()
        .ok_or_else(|| AiServiceError::Malformed("response is not a JSON object".to_string()))?;

    let decision_raw = object
        .get("decision")
        .and_then(Value::as_str)
        .ok_or_else(|| AiServiceError::Malformed("missing 'decision'".to_string()))?;
    let decision = Decision::parse(decision_raw).ok_or_else(|| {
        AiServiceError::Malformed(format!("unknown decision '{decision_raw}'"))
    })?;

    let summary = object
        .get("evaluation_summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AiServiceError::Malformed("missing 'evaluation_summary'".to_string()))?
        .to_string();

    let overall_score = object
        .get("overall_score")
        .ok_or_else(|| AiServiceError::Malformed("missing 'overall_score'".to_string()))
        .and_then(parse_score)?;

    let breakdown = object.get("criteria_breakdown");
    let satisfied = string_list(breakdown.and_then(|b| b.get("requirements_met")));
    let gaps = string_list(breakdown.and_then(|b| b.get("requirements_missing")));

    Ok(AiVerdict {
        decision,
        overall_score,
        summary,
        satisfied,
        gaps,
    })
}

fn parse_score(value: &Value) -> Result<f64, AiServiceError> {
    let score = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|s| s.is_finite())
    .ok_or_else(|| AiServiceError::Malformed(format!("overall_score is not numeric: {value}")))?;

    if !(0.0..=100.0).contains(&score) {
        return Err(AiServiceError::Malformed(format!(
            "overall_score {score} outside 0-100"
        )));
    }
    Ok(score)
}

/// Accepts a list of strings or a single string; anything else is treated as empty.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}
