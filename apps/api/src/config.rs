use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::llm_client::Provider;

/// Application configuration loaded from environment variables.
/// Fails at startup if the API key for the selected provider is missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub provider: Provider,
    pub api_key: String,
    pub port: u16,
    pub rust_log: String,
    pub screening: ScreeningSettings,
    pub max_upload_bytes: usize,
}

/// Knobs for the batch evaluator.
#[derive(Debug, Clone)]
pub struct ScreeningSettings {
    /// Concurrent AI evaluations per batch. Bounded by the provider's rate limit, not CPUs.
    pub workers: usize,
    pub ai_timeout: Duration,
    pub retry_backoff: Duration,
    /// How long a finished batch stays queryable before it is evicted.
    pub batch_retention: Duration,
}

impl Default for ScreeningSettings {
    fn default() -> Self {
        Self {
            workers: 4,
            ai_timeout: Duration::from_secs(60),
            retry_backoff: Duration::from_millis(1000),
            batch_retention: Duration::from_secs(60 * 60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let provider = match std::env::var("LLM_PROVIDER") {
            Ok(raw) => parse_provider(&raw)?,
            Err(_) => Provider::Anthropic,
        };
        let api_key = match provider {
            Provider::Anthropic => require_env("ANTHROPIC_API_KEY")?,
            Provider::Gemini => require_env("GEMINI_API_KEY")?,
        };

        let defaults = ScreeningSettings::default();
        let screening = ScreeningSettings {
            workers: parse_env("SCREENING_WORKERS", defaults.workers)?.max(1),
            ai_timeout: Duration::from_secs(parse_env(
                "AI_TIMEOUT_SECS",
                defaults.ai_timeout.as_secs(),
            )?),
            retry_backoff: Duration::from_millis(parse_env(
                "AI_RETRY_BACKOFF_MS",
                defaults.retry_backoff.as_millis() as u64,
            )?),
            batch_retention: Duration::from_secs(
                60 * parse_env("BATCH_RETENTION_MINS", defaults.batch_retention.as_secs() / 60)?,
            ),
        };

        Ok(Config {
            provider,
            api_key,
            port: parse_env("PORT", 8080u16).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            screening,
            max_upload_bytes: parse_env("MAX_UPLOAD_MB", 25usize)? * 1024 * 1024,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

fn parse_provider(raw: &str) -> Result<Provider> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "anthropic" | "claude" => Ok(Provider::Anthropic),
        "gemini" | "google" => Ok(Provider::Gemini),
        other => bail!("Unknown LLM_PROVIDER '{other}' (expected 'anthropic' or 'gemini')"),
    }
}
