//! Keyword Matcher: pure-Rust, deterministic, no LLM call.
//!
//! Algorithm:
//! 1. Lowercase the resume once and collapse whitespace runs to single spaces,
//!    so phrases split across extracted lines still match.
//! 2. For each keyword (normalized the same way), look for an occurrence whose
//!    neighbouring characters are not word characters ("Go" does not match
//!    "Google", "Java" does not match "JavaScript").
//! 3. match_score = 100 × |matched| / |keywords|, rounded half away from zero
//!    to two decimals (2 of 3 → 66.67).
//! 4. Classify: none (0), weak (< 30%), moderate (30–60%), strong (≥ 60%).

use crate::screening::models::{MatchResult, MatchStrength};

const WEAK_RATIO: f64 = 0.3;
const STRONG_RATIO: f64 = 0.6;

/// Partitions `keywords` into matched and missing against `resume_text`.
/// Returns `None` when there is nothing to match against.
pub fn match_keywords(keywords: &[String], resume_text: &str) -> Option<MatchResult> {
    if keywords.is_empty() {
        return None;
    }

    let haystack = normalize(resume_text);
    let (matched, missing): (Vec<String>, Vec<String>) = keywords
        .iter()
        .cloned()
        .partition(|keyword| contains_word(&haystack, &normalize(keyword)));

    let ratio = matched.len() as f64 / keywords.len() as f64;

    Some(MatchResult {
        strength: classify(matched.len(), ratio),
        match_score: round_score(ratio * 100.0),
        matched,
        missing,
    })
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// True when `needle` occurs in `haystack` with no word character directly
/// before or after it.
fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

/// Rounds a 0–100 score to two decimals, half away from zero.
pub fn round_score(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

fn classify(matched: usize, ratio: f64) -> MatchStrength {
    if matched == 0 {
        MatchStrength::None
    } else if ratio < WEAK_RATIO {
        MatchStrength::Weak
    } else if ratio >= STRONG_RATIO {
        MatchStrength::Strong
    } else {
        MatchStrength::Moderate
    }
}
