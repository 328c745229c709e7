//! Screening data model: job description, candidates, match results, verdicts, records.

use serde::{Deserialize, Serialize};

use crate::extraction::ExtractionError;

/// A job description plus the keyword set every candidate is matched against.
#[derive(Debug, Clone, Serialize)]
pub struct JobDescription {
    pub text: String,
    keywords: Vec<String>,
}

impl JobDescription {
    /// Builds a job description from custom and AI keywords.
    /// Custom keywords come first; duplicates (case-insensitive) and blanks are dropped.
    pub fn new(text: impl Into<String>, custom: &[String], generated: &[String]) -> Self {
        Self {
            text: text.into(),
            keywords: crate::screening::keywords::merge_keywords(custom, generated),
        }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// An uploaded resume whose text has been extracted.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Position in the upload; results are ordered by it.
    pub index: usize,
    pub filename: String,
    pub text: String,
}

/// One uploaded file as handed to a batch.
#[derive(Debug, Clone)]
pub enum Submission {
    Extracted(Candidate),
    Unreadable {
        index: usize,
        filename: String,
        error: ExtractionError,
    },
}

impl Submission {
    pub fn index(&self) -> usize {
        match self {
            Submission::Extracted(c) => c.index,
            Submission::Unreadable { index, .. } => *index,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            Submission::Extracted(c) => &c.filename,
            Submission::Unreadable { filename, .. } => filename,
        }
    }
}

/// Preliminary keyword-only tier handed to the AI as context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrength {
    None,
    Weak,
    Moderate,
    Strong,
}

impl MatchStrength {
    pub fn describe(&self) -> &'static str {
        match self {
            MatchStrength::None => "FAIL - No keywords matched",
            MatchStrength::Weak => "WEAK - Low keyword match rate",
            MatchStrength::Moderate => "MODERATE - Moderate keyword match rate",
            MatchStrength::Strong => "STRONG - High keyword match rate",
        }
    }
}

/// Deterministic keyword match of one resume against the job keywords.
/// `matched` and `missing` partition the keyword set and keep its order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub matched: Vec<String>,
    pub missing: Vec<String>,
    /// 100 * |matched| / |keywords|, rounded to two decimals.
    pub match_score: f64,
    pub strength: MatchStrength,
}

impl MatchResult {
    pub fn total_keywords(&self) -> usize {
        self.matched.len() + self.missing.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Shortlisted,
    NotShortlisted,
}

impl Decision {
    /// Label used in exports and prompts.
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Shortlisted => "Shortlisted",
            Decision::NotShortlisted => "Not Shortlisted",
        }
    }

    /// Accepts the labels the model is asked for, tolerating case and spacing.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "shortlisted" => Some(Decision::Shortlisted),
            "notshortlisted" => Some(Decision::NotShortlisted),
            _ => None,
        }
    }
}

/// Validated AI verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiVerdict {
    pub decision: Decision,
    pub overall_score: f64,
    pub summary: String,
    pub satisfied: Vec<String>,
    pub gaps: Vec<String>,
}

/// Lifecycle of a single evaluation. `AiScored` and `AiDegraded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationStage {
    Pending,
    Matched,
    AiScored,
    AiDegraded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScreeningOutcome {
    Scored {
        matches: MatchResult,
        verdict: AiVerdict,
    },
    /// AI evaluation failed; `verdict` is the keyword-only substitute.
    Degraded {
        matches: MatchResult,
        verdict: AiVerdict,
        warning: String,
    },
    /// The file could not be screened at all.
    Failed { error: String },
    /// The batch was cancelled before this file was dispatched.
    Skipped { reason: String },
}

/// One row of screening output. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningRecord {
    pub index: usize,
    pub filename: String,
    #[serde(flatten)]
    pub outcome: ScreeningOutcome,
}

impl ScreeningRecord {
    pub fn verdict(&self) -> Option<&AiVerdict> {
        match &self.outcome {
            ScreeningOutcome::Scored { verdict, .. } | ScreeningOutcome::Degraded { verdict, .. } => {
                Some(verdict)
            }
            _ => None,
        }
    }

    pub fn matches(&self) -> Option<&MatchResult> {
        match &self.outcome {
            ScreeningOutcome::Scored { matches, .. } | ScreeningOutcome::Degraded { matches, .. } => {
                Some(matches)
            }
            _ => None,
        }
    }

    pub fn decision(&self) -> Option<Decision> {
        self.verdict().map(|v| v.decision)
    }

    pub fn overall_score(&self) -> Option<f64> {
        self.verdict().map(|v| v.overall_score)
    }

    pub fn is_shortlisted(&self) -> bool {
        self.decision() == Some(Decision::Shortlisted)
    }

    /// Terminal stage for evaluated records; `None` for failed or skipped rows.
    pub fn stage(&self) -> Option<EvaluationStage> {
        match &self.outcome {
            ScreeningOutcome::Scored { .. } => Some(EvaluationStage::AiScored),
            ScreeningOutcome::Degraded { .. } => Some(EvaluationStage::AiDegraded),
            ScreeningOutcome::Failed { .. } | ScreeningOutcome::Skipped { .. } => None,
        }
    }

    pub fn status_label(&self) -> &'static str {
        match &self.outcome {
            ScreeningOutcome::Scored { .. } => "scored",
            ScreeningOutcome::Degraded { .. } => "degraded",
            ScreeningOutcome::Failed { .. } => "failed",
            ScreeningOutcome::Skipped { .. } => "skipped",
        }
    }

    /// Warning or error annotation attached to the row, if any.
    pub fn note(&self) -> Option<&str> {
        match &self.outcome {
            ScreeningOutcome::Scored { .. } => None,
            ScreeningOutcome::Degraded { warning, .. } => Some(warning),
            ScreeningOutcome::Failed { error } => Some(error),
            ScreeningOutcome::Skipped { reason } => Some(reason),
        }
    }
}
