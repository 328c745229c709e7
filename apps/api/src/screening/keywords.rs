//! Keyword Generator: AI keywords per job description, merged with custom keywords.
//!
//! AI keywords are cached by the SHA-256 of the job description text so a
//! second batch against the same JD does not pay for another model call.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::time::Duration;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::screening::ai::{AiServiceError, ScreeningModel};

/// Splits a comma-separated custom keyword string, dropping blanks.
pub fn parse_custom_keywords(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .collect()
}

/// Merges keyword lists in order, keeping the first spelling of each
/// case-insensitive duplicate and dropping blank entries.
pub fn merge_keywords(custom: &[String], generated: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    custom
        .iter()
        .chain(generated)
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .filter(|k| seen.insert(k.to_lowercase()))
        .map(String::from)
        .collect()
}

/// Cache key for a job description.
pub fn jd_fingerprint(jd_text: &str) -> String {
    format!("{:x}", Sha256::digest(jd_text.trim().as_bytes()))
}

/// Process-lifetime cache of AI keywords per job description.
#[derive(Default)]
pub struct KeywordCache {
    entries: RwLock<HashMap<String, Vec<String>>>,
}

/// AI keywords for a JD and whether they came from the cache.
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedKeywords {
    pub keywords: Vec<String>,
    pub cached: bool,
}

impl KeywordCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, jd_text: &str) -> Option<Vec<String>> {
        let key = jd_fingerprint(jd_text);
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&key)
            .cloned()
    }

    pub fn insert(&self, jd_text: &str, keywords: Vec<String>) {
        let key = jd_fingerprint(jd_text);
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key, keywords);
    }

    /// Returns cached AI keywords for the JD, generating (and caching) them on a miss.
    /// Generation is bounded by `timeout`; failed or timed-out generations are not cached.
    pub async fn get_or_generate(
        &self,
        jd_text: &str,
        model: &dyn ScreeningModel,
        timeout: Duration,
    ) -> Result<GeneratedKeywords, AiServiceError> {
        if let Some(keywords) = self.get(jd_text) {
            return Ok(GeneratedKeywords {
                keywords,
                cached: true,
            });
        }

        let generated = tokio::time::timeout(timeout, model.generate_keywords(jd_text))
            .await
            .map_err(|_| {
                AiServiceError::Transient(format!(
                    "keyword generation timed out after {}s",
                    timeout.as_secs()
                ))
            })??;
        let keywords = merge_keywords(&[], &generated);
        info!("Generated {} AI keywords for job description", keywords.len());
        self.insert(jd_text, keywords.clone());

        Ok(GeneratedKeywords {
            keywords,
            cached: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::testing::ScriptedModel;

    const TIMEOUT: Duration = Duration::from_secs(60);

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_custom_keywords() {
        assert_eq!(
            parse_custom_keywords(" Rust, , Kubernetes ,SQL,"),
            strings(&["Rust", "Kubernetes", "SQL"])
        );
        assert!(parse_custom_keywords("  ").is_empty());
    }

    #[test]
    fn test_merge_keeps_custom_first_and_dedupes_case_insensitively() {
        let merged = merge_keywords(
            &strings(&["AWS", "python"]),
            &strings(&["Python", "Docker", "aws", "  "]),
        );
        assert_eq!(merged, strings(&["AWS", "python", "Docker"]));
    }

    #[test]
    fn test_fingerprint_ignores_surrounding_whitespace() {
        assert_eq!(jd_fingerprint("Rust engineer"), jd_fingerprint("  Rust engineer\n"));
        assert_ne!(jd_fingerprint("Rust engineer"), jd_fingerprint("Go engineer"));
        assert_eq!(jd_fingerprint("x").len(), 64);
    }

    #[tokio::test]
    async fn test_get_or_generate_caches_per_job_description() {
        let model = ScriptedModel::new().with_keywords(strings(&["Rust", "Tokio", "rust"]));
        let cache = KeywordCache::new();

        let first = cache.get_or_generate("Rust engineer", &model, TIMEOUT).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.keywords, strings(&["Rust", "Tokio"]));

        let second = cache.get_or_generate("Rust engineer", &model, TIMEOUT).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.keywords, first.keywords);
        assert_eq!(model.keyword_calls(), 1);
    }

    #[tokio::test]
    async fn test_failed_generation_is_not_cached() {
        let model = ScriptedModel::new().failing_keywords();
        let cache = KeywordCache::new();

        assert!(cache.get_or_generate("Data role", &model, TIMEOUT).await.is_err());
        assert!(cache.get("Data role").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_generation_times_out_and_is_not_cached() {
        let model = ScriptedModel::new()
            .with_keywords(strings(&["Rust"]))
            .with_keyword_delay(Duration::from_secs(120));
        let cache = KeywordCache::new();

        let err = cache
            .get_or_generate("Rust engineer", &model, TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, AiServiceError::Transient(ref msg) if msg.contains("timed out")));
        assert!(cache.get("Rust engineer").is_none());
        assert_eq!(model.keyword_calls(), 1);
    }
}
