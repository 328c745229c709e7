//! Two-stage resume screening.
//!
//! Stage 1 is deterministic keyword matching ([`matcher`]). Stage 2 delegates a
//! qualitative verdict to the AI ([`ai`]). [`evaluator`] merges both into one
//! [`models::ScreeningRecord`] per uploaded file and runs batches concurrently.

pub mod ai;
pub mod evaluator;
pub mod export;
pub mod handlers;
pub mod keywords;
pub mod matcher;
pub mod models;
pub mod prompts;
pub mod results;
pub mod sessions;

#[cfg(test)]
pub mod testing;
