//! CSV export of screening records, one row per uploaded file in upload order.

use std::io::Write;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::screening::models::{ScreeningOutcome, ScreeningRecord};

pub const EXPORT_FILENAME: &str = "resume_screening_results.csv";

const KEYWORD_SEPARATOR: &str = "; ";

/// Column names of [`ExportRow`], written explicitly when there are no rows.
const EXPORT_HEADER: [&str; 9] = [
    "filename",
    "decision",
    "overall_score",
    "match_score",
    "matched_keywords",
    "missing_keywords",
    "summary",
    "status",
    "warning",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV export failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV export failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub filename: String,
    pub decision: String,
    pub overall_score: Option<f64>,
    pub match_score: Option<f64>,
    pub matched_keywords: String,
    pub missing_keywords: String,
    pub summary: String,
    pub status: String,
    pub warning: String,
}

impl From<&ScreeningRecord> for ExportRow {
    fn from(record: &ScreeningRecord) -> Self {
        let (decision, summary) = match (&record.outcome, record.verdict()) {
            (_, Some(verdict)) => (verdict.decision.label().to_string(), verdict.summary.clone()),
            (ScreeningOutcome::Skipped { .. }, None) => ("Skipped".to_string(), String::new()),
            _ => ("Error".to_string(), String::new()),
        };
        let matches = record.matches();

        ExportRow {
            filename: record.filename.clone(),
            decision,
            overall_score: record.overall_score(),
            match_score: matches.map(|m| m.match_score),
            matched_keywords: matches
                .map(|m| m.matched.join(KEYWORD_SEPARATOR))
                .unwrap_or_default(),
            missing_keywords: matches
                .map(|m| m.missing.join(KEYWORD_SEPARATOR))
                .unwrap_or_default(),
            summary,
            status: record.status_label().to_string(),
            warning: record.note().unwrap_or_default().to_string(),
        }
    }
}

/// Writes `records` as CSV with a header row. Callers pass records in upload order.
pub fn write_csv<W: Write>(records: &[ScreeningRecord], writer: W) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    if records.is_empty() {
        csv_writer.write_record(EXPORT_HEADER)?;
    }
    for record in records {
        csv_writer.serialize(ExportRow::from(record))?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn to_csv_bytes(records: &[ScreeningRecord]) -> Result<Vec<u8>, ExportError> {
    let mut buffer = Vec::new();
    write_csv(records, &mut buffer)?;
    Ok(buffer)
}
