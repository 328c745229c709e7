//! LLM Client: the single point of entry for all model API calls in the screener.
//!
//! ARCHITECTURAL RULE: No other module may call a provider API directly.
//! All LLM interactions MUST go through this module.
//!
//! Models are hardcoded per provider (see `Provider::model`) to prevent drift
//! between keyword generation and evaluation.

use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MODEL: &str = "claude-sonnet-4-5";
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const GEMINI_MODEL: &str = "gemini-2.5-pro";
const MAX_TOKENS: u32 = 4096;
/// Attempts made when the provider answers 429. Other failures are returned
/// immediately and retried (once) by the screening evaluator.
const MAX_RATE_LIMIT_ATTEMPTS: u32 = 3;

/// Hosted model provider backing the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Gemini,
}

impl Provider {
    pub fn model(&self) -> &'static str {
        match self {
            Provider::Anthropic => ANTHROPIC_MODEL,
            Provider::Gemini => GEMINI_MODEL,
        }
    }
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,
}

impl LlmError {
    /// Whether a second attempt has a reasonable chance of succeeding.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Parse(_) | LlmError::RateLimited { .. } | LlmError::EmptyContent => false,
        }
    }
}

// ── Anthropic wire types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

// ── Gemini wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

// ── Client ──────────────────────────────────────────────────────────────────

/// The single LLM client used by the screening service.
/// Wraps the provider API with rate-limit backoff and structured output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    provider: Provider,
    api_key: String,
}

impl LlmClient {
    pub fn new(provider: Provider, api_key: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            provider,
            api_key,
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Makes a raw call to the provider and returns the text of the first content part.
    /// Retries on 429 with exponential backoff; every other failure is returned as-is.
    pub async fn call(
        &self,
        prompt: &str,
        system: &str,
        temperature: f32,
    ) -> Result<String, LlmError> {
        for attempt in 0..MAX_RATE_LIMIT_ATTEMPTS {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "LLM call rate limited (attempt {}), retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self.build_request(prompt, system, temperature).send().await?;
            let status = response.status();

            if status.as_u16() == 429 {
                let body = response.text().await.unwrap_or_default();
                warn!("LLM API returned {}: {}", status, body);
                continue;
            }

            let body = response.text().await?;

            if !status.is_success() {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: self.error_message(body),
                });
            }

            return self.extract_text(&body);
        }

        Err(LlmError::RateLimited {
            retries: MAX_RATE_LIMIT_ATTEMPTS - 1,
        })
    }

    /// Convenience method that calls the LLM and deserializes the text response as JSON.
    /// The prompt must instruct the model to return valid JSON.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
        temperature: f32,
    ) -> Result<T, LlmError> {
        let text = self.call(prompt, system, temperature).await?;

        // Strip markdown code fences if the model wraps JSON in them
        let text = strip_json_fences(&text);
        if text.is_empty() {
            return Err(LlmError::EmptyContent);
        }

        serde_json::from_str(text).map_err(LlmError::Parse)
    }

    fn build_request(&self, prompt: &str, system: &str, temperature: f32) -> RequestBuilder {
        match self.provider {
            Provider::Anthropic => self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&AnthropicRequest {
                    model: ANTHROPIC_MODEL,
                    max_tokens: MAX_TOKENS,
                    temperature,
                    system,
                    messages: vec![AnthropicMessage {
                        role: "user",
                        content: prompt,
                    }],
                }),
            Provider::Gemini => self
                .client
                .post(format!("{GEMINI_API_BASE}/{GEMINI_MODEL}:generateContent"))
                .header("x-goog-api-key", &self.api_key)
                .header("content-type", "application/json")
                .json(&GeminiRequest {
                    system_instruction: GeminiContent {
                        role: None,
                        parts: vec![GeminiPart { text: system }],
                    },
                    contents: vec![GeminiContent {
                        role: Some("user"),
                        parts: vec![GeminiPart { text: prompt }],
                    }],
                    generation_config: GeminiGenerationConfig {
                        temperature,
                        max_output_tokens: MAX_TOKENS,
                        response_mime_type: "application/json",
                    },
                }),
        }
    }

    fn extract_text(&self, body: &str) -> Result<String, LlmError> {
        match self.provider {
            Provider::Anthropic => {
                let response: AnthropicResponse = serde_json::from_str(body)?;
                debug!(
                    "LLM call succeeded: input_tokens={}, output_tokens={}",
                    response.usage.input_tokens, response.usage.output_tokens
                );
                response
                    .content
                    .into_iter()
                    .find(|b| b.block_type == "text")
                    .and_then(|b| b.text)
                    .ok_or(LlmError::EmptyContent)
            }
            Provider::Gemini => {
                let response: GeminiResponse = serde_json::from_str(body)?;
                if let Some(usage) = &response.usage_metadata {
                    debug!(
                        "LLM call succeeded: input_tokens={}, output_tokens={}",
                        usage.prompt_token_count, usage.candidates_token_count
                    );
                }
                response
                    .candidates
                    .into_iter()
                    .filter_map(|c| c.content)
                    .flat_map(|c| c.parts)
                    .find_map(|p| p.text)
                    .ok_or(LlmError::EmptyContent)
            }
        }
    }

    /// Pulls the human-readable message out of a provider error body, if it has one.
    fn error_message(&self, body: String) -> String {
        let parsed = match self.provider {
            Provider::Anthropic => serde_json::from_str::<AnthropicError>(&body)
                .map(|e| e.error.message)
                .ok(),
            Provider::Gemini => serde_json::from_str::<GeminiError>(&body)
                .map(|e| e.error.message)
                .ok(),
        };
        parsed.unwrap_or(body)
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(provider: Provider) -> LlmClient {
        LlmClient::new(provider, "test-key".to_string()).unwrap()
    }

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_extract_text_anthropic_picks_text_block() {
        let body = r#"{
            "content": [
                {"type": "tool_use", "text": null},
                {"type": "text", "text": "{\"keywords\": [\"Rust\"]}"}
            ],
            "usage": {"input_tokens": 12, "output_tokens": 7}
        }"#;
        let text = client(Provider::Anthropic).extract_text(body).unwrap();
        assert_eq!(text, "{\"keywords\": [\"Rust\"]}");
    }

    #[test]
    fn test_extract_text_gemini_reads_first_part() {
        let body = r#"{
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "{\"decision\": \"Shortlisted\"}"}]}}
            ],
            "usageMetadata": {"promptTokenCount": 100, "candidatesTokenCount": 20}
        }"#;
        let text = client(Provider::Gemini).extract_text(body).unwrap();
        assert_eq!(text, "{\"decision\": \"Shortlisted\"}");
    }

    #[test]
    fn test_extract_text_gemini_without_candidates_is_empty_content() {
        let body = r#"{"candidates": []}"#;
        let err = client(Provider::Gemini).extract_text(body).unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }

    #[test]
    fn test_error_message_parses_provider_bodies() {
        let anthropic = client(Provider::Anthropic)
            .error_message(r#"{"error": {"type": "invalid_request", "message": "bad key"}}"#.into());
        assert_eq!(anthropic, "bad key");

        let gemini = client(Provider::Gemini)
            .error_message(r#"{"error": {"code": 403, "message": "quota exceeded"}}"#.into());
        assert_eq!(gemini, "quota exceeded");

        let raw = client(Provider::Gemini).error_message("upstream exploded".into());
        assert_eq!(raw, "upstream exploded");
    }

    #[test]
    fn test_transient_classification() {
        assert!(LlmError::Api { status: 503, message: String::new() }.is_transient());
        assert!(!LlmError::Api { status: 401, message: String::new() }.is_transient());
        assert!(!LlmError::RateLimited { retries: 2 }.is_transient());
        assert!(!LlmError::EmptyContent.is_transient());
    }

    #[test]
    fn test_gemini_request_uses_camel_case() {
        let request = GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: "sys" }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart { text: "hello" }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: 0.4,
                max_output_tokens: MAX_TOKENS,
                response_mime_type: "application/json",
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(value["contents"][0]["role"], "user");
        assert!(value["systemInstruction"].get("role").is_none());
    }
}
