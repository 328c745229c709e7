//! Screening Evaluator: combines the keyword match with the AI verdict into
//! one record per candidate, and runs batches on a bounded worker pool.
//!
//! Per candidate: Pending → Matched → (AiScored | AiDegraded).
//! AI failures never escape a batch; the candidate degrades to the keyword-only
//! result (`NotShortlisted`, overall score = match score). Only a batch with no
//! keywords at all is rejected, before any AI call.

use std::sync::Arc;
use std::time::Duration;

use futures::{pin_mut, stream, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ScreeningSettings;
use crate::screening::ai::{AiServiceError, ScreeningModel};
use crate::screening::matcher::match_keywords;
use crate::screening::models::{
    AiVerdict, Candidate, Decision, EvaluationStage, JobDescription, MatchResult, ScreeningOutcome,
    ScreeningRecord, Submission,
};
use crate::screening::results::ResultsAccumulator;

/// Retries after the first transient AI failure.
const MAX_AI_RETRIES: u32 = 1;

#[derive(Debug, Clone, Error)]
pub enum EvaluationError {
    #[error("Configuration error: no keywords available to screen against")]
    Configuration,

    #[error("Resume '{0}' has no text to screen")]
    EmptyResume(String),
}

pub struct ScreeningEvaluator {
    model: Arc<dyn ScreeningModel>,
    workers: usize,
    ai_timeout: Duration,
    retry_backoff: Duration,
}

impl ScreeningEvaluator {
    pub fn new(model: Arc<dyn ScreeningModel>, settings: &ScreeningSettings) -> Self {
        Self {
            model,
            workers: settings.workers.max(1),
            ai_timeout: settings.ai_timeout,
            retry_backoff: settings.retry_backoff,
        }
    }

    /// Screens one candidate. Fails only when there is nothing to match against
    /// or nothing to read; AI trouble yields a degraded record instead.
    pub async fn evaluate(
        &self,
        candidate: &Candidate,
        jd: &JobDescription,
    ) -> Result<ScreeningRecord, EvaluationError> {
        if candidate.text.trim().is_empty() {
            return Err(EvaluationError::EmptyResume(candidate.filename.clone()));
        }
        let matches =
            match_keywords(jd.keywords(), &candidate.text).ok_or(EvaluationError::Configuration)?;
        debug!(
            "{}: {:?} -> {:?} ({} of {} keywords, score {})",
            candidate.filename,
            EvaluationStage::Pending,
            EvaluationStage::Matched,
            matches.matched.len(),
            matches.total_keywords(),
            matches.match_score
        );

        let outcome = match self.call_with_retry(candidate, jd, &matches).await {
            Ok(verdict) => ScreeningOutcome::Scored { matches, verdict },
            Err(e) => {
                warn!(
                    "{}: AI evaluation failed, using keyword-only result: {e}",
                    candidate.filename
                );
                ScreeningOutcome::Degraded {
                    verdict: keyword_only_verdict(&matches),
                    matches,
                    warning: e.to_string(),
                }
            }
        };

        let record = ScreeningRecord {
            index: candidate.index,
            filename: candidate.filename.clone(),
            outcome,
        };
        debug!(
            "{}: {:?} -> {:?} ({}, {:?})",
            record.filename,
            EvaluationStage::Matched,
            record.stage(),
            record.decision().map_or("none", |d| d.label()),
            record.overall_score()
        );
        Ok(record)
    }

    /// Screens every submission and returns `results` in upload order.
    ///
    /// At most `workers` AI calls are in flight. `on_record` sees each record
    /// as it completes (completion order). Once `cancel` fires no further
    /// submissions are dispatched; they come back as `Skipped` rows.
    pub async fn run_batch<F>(
        &self,
        submissions: Vec<Submission>,
        jd: &JobDescription,
        mut results: ResultsAccumulator,
        cancel: &CancellationToken,
        mut on_record: F,
    ) -> Result<ResultsAccumulator, EvaluationError>
    where
        F: FnMut(&ScreeningRecord) + Send,
    {
        if jd.keywords().is_empty() {
            return Err(EvaluationError::Configuration);
        }

        info!(
            "Screening batch of {} resumes against {} keywords ({} workers)",
            submissions.len(),
            jd.keywords().len(),
            self.workers
        );

        let records = stream::iter(submissions)
            .map(move |submission| self.screen_submission(submission, jd, cancel))
            .buffer_unordered(self.workers);
        pin_mut!(records);

        while let Some(record) = records.next().await {
            on_record(&record);
            results.push(record);
        }

        results.sort_by_upload_order();
        let stats = results.stats();
        info!(
            "Batch finished: {} records, {} shortlisted, {} degraded, {} failed, {} skipped",
            stats.total, stats.shortlisted, stats.degraded, stats.failed, stats.skipped
        );
        Ok(results)
    }

    async fn screen_submission(
        &self,
        submission: Submission,
        jd: &JobDescription,
        cancel: &CancellationToken,
    ) -> ScreeningRecord {
        let index = submission.index();
        let filename = submission.filename().to_string();

        if cancel.is_cancelled() {
            return ScreeningRecord {
                index,
                filename,
                outcome: ScreeningOutcome::Skipped {
                    reason: "Batch cancelled before this resume was screened".to_string(),
                },
            };
        }

        let candidate = match submission {
            Submission::Extracted(candidate) => candidate,
            Submission::Unreadable { error, .. } => {
                warn!("{filename}: skipped, {error}");
                return ScreeningRecord {
                    index,
                    filename,
                    outcome: ScreeningOutcome::Failed {
                        error: error.to_string(),
                    },
                };
            }
        };

        match self.evaluate(&candidate, jd).await {
            Ok(record) => record,
            Err(e) => ScreeningRecord {
                index,
                filename,
                outcome: ScreeningOutcome::Failed {
                    error: e.to_string(),
                },
            },
        }
    }

    async fn call_with_retry(
        &self,
        candidate: &Candidate,
        jd: &JobDescription,
        matches: &MatchResult,
    ) -> Result<AiVerdict, AiServiceError> {
        let mut attempt = 0;
        loop {
            match self.call_once(candidate, jd, matches).await {
                Err(e) if e.is_transient() && attempt < MAX_AI_RETRIES => {
                    attempt += 1;
                    warn!(
                        "{}: transient AI failure ({e}), retrying after {}ms",
                        candidate.filename,
                        self.retry_backoff.as_millis()
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                }
                result => return result,
            }
        }
    }

    async fn call_once(
        &self,
        candidate: &Candidate,
        jd: &JobDescription,
        matches: &MatchResult,
    ) -> Result<AiVerdict, AiServiceError> {
        tokio::time::timeout(
            self.ai_timeout,
            self.model.evaluate(&candidate.text, &jd.text, matches),
        )
        .await
        .map_err(|_| {
            AiServiceError::Transient(format!(
                "timed out after {}s",
                self.ai_timeout.as_secs_f64()
            ))
        })?
    }
}

/// Substitute verdict when the AI could not be used.
fn keyword_only_verdict(matches: &MatchResult) -> AiVerdict {
    AiVerdict {
        decision: Decision::NotShortlisted,
        overall_score: matches.match_score,
        summary: format!(
            "AI evaluation unavailable; keyword-only result: {} ({} of {} keywords).",
            matches.strength.describe(),
            matches.matched.len(),
            matches.total_keywords()
        ),
        satisfied: matches.matched.clone(),
        gaps: matches.missing.clone(),
    }
}
