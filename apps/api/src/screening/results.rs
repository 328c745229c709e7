//! Results Accumulator: the session-scoped collection of screening records.

use std::cmp::Ordering;

use serde::Serialize;

use crate::screening::matcher::round_score;
use crate::screening::models::{ScreeningOutcome, ScreeningRecord};

#[derive(Debug, Clone, Default)]
pub struct ResultsAccumulator {
    records: Vec<ScreeningRecord>,
}

/// Aggregate numbers for a batch. Averages cover evaluated records only.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchStats {
    pub total: usize,
    pub shortlisted: usize,
    pub not_shortlisted: usize,
    pub degraded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub average_score: Option<f64>,
    /// Percentage of evaluated records that were shortlisted.
    pub shortlist_rate: f64,
}

impl ResultsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ScreeningRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in their current order. After a batch that is upload order.
    pub fn records(&self) -> &[ScreeningRecord] {
        &self.records
    }

    pub fn sort_by_upload_order(&mut self) {
        self.records.sort_by_key(|r| r.index);
    }

    /// Shortlisted first, then by overall score (highest first), then upload order.
    /// Failed and skipped rows go last.
    pub fn ranked(&self) -> Vec<ScreeningRecord> {
        let mut ranked = self.records.clone();
        ranked.sort_by(|a, b| {
            b.is_shortlisted()
                .cmp(&a.is_shortlisted())
                .then_with(|| {
                    let a_score = a.overall_score().unwrap_or(f64::NEG_INFINITY);
                    let b_score = b.overall_score().unwrap_or(f64::NEG_INFINITY);
                    b_score.partial_cmp(&a_score).unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.index.cmp(&b.index))
        });
        ranked
    }

    pub fn stats(&self) -> BatchStats {
        let mut stats = BatchStats {
            total: self.records.len(),
            ..BatchStats::default()
        };
        let mut score_sum = 0.0;
        let mut evaluated = 0usize;

        for record in &self.records {
            match &record.outcome {
                ScreeningOutcome::Failed { .. } => stats.failed += 1,
                ScreeningOutcome::Skipped { .. } => stats.skipped += 1,
                ScreeningOutcome::Scored { verdict, .. } | ScreeningOutcome::Degraded { verdict, .. } => {
                    if matches!(record.outcome, ScreeningOutcome::Degraded { .. }) {
                        stats.degraded += 1;
                    }
                    if record.is_shortlisted() {
                        stats.shortlisted += 1;
                    } else {
                        stats.not_shortlisted += 1;
                    }
                    evaluated += 1;
                    score_sum += verdict.overall_score;
                }
            }
        }

        if evaluated > 0 {
            stats.average_score = Some(round_score(score_sum / evaluated as f64));
            stats.shortlist_rate = round_score(100.0 * stats.shortlisted as f64 / evaluated as f64);
        }
        stats
    }
}
