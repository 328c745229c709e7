//! Scripted `ScreeningModel` for tests. Replies are keyed by exact resume text.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::screening::ai::{AiServiceError, ScreeningModel};
use crate::screening::models::{AiVerdict, Decision, MatchResult};

#[derive(Debug, Clone)]
pub enum Reply {
    Verdict(AiVerdict),
    Error(AiServiceError),
    /// Answers after `Duration` of (tokio) time.
    Delayed(Duration, AiVerdict),
    /// Transient failure on the first call, then the verdict.
    FlakyOnce(AiVerdict),
}

pub fn verdict(decision: Decision, score: f64) -> AiVerdict {
    AiVerdict {
        decision,
        overall_score: score,
        summary: format!("{} at {score}", decision.label()),
        satisfied: vec![],
        gaps: vec![],
    }
}

pub struct ScriptedModel {
    keywords: Result<Vec<String>, AiServiceError>,
    keyword_delay: Duration,
    replies: HashMap<String, Reply>,
    default_reply: Reply,
    keyword_calls: AtomicUsize,
    evaluate_calls: Mutex<HashMap<String, usize>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            keywords: Ok(vec![]),
            keyword_delay: Duration::ZERO,
            replies: HashMap::new(),
            default_reply: Reply::Verdict(verdict(Decision::Shortlisted, 80.0)),
            keyword_calls: AtomicUsize::new(0),
            evaluate_calls: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_keywords(mut self, keywords: Vec<String>) -> Self {
        self.keywords = Ok(keywords);
        self
    }

    pub fn failing_keywords(mut self) -> Self {
        self.keywords = Err(AiServiceError::Rejected("invalid api key".to_string()));
        self
    }

    /// Keyword generation answers after `delay` of (tokio) time.
    pub fn with_keyword_delay(mut self, delay: Duration) -> Self {
        self.keyword_delay = delay;
        self
    }

    pub fn with_reply(mut self, resume_text: &str, reply: Reply) -> Self {
        self.replies.insert(resume_text.to_string(), reply);
        self
    }

    pub fn with_default_reply(mut self, reply: Reply) -> Self {
        self.default_reply = reply;
        self
    }

    pub fn keyword_calls(&self) -> usize {
        self.keyword_calls.load(Ordering::SeqCst)
    }

    pub fn evaluate_calls(&self) -> usize {
        self.evaluate_calls.lock().unwrap().values().sum()
    }

    pub fn calls_for(&self, resume_text: &str) -> usize {
        self.evaluate_calls
            .lock()
            .unwrap()
            .get(resume_text)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl ScreeningModel for ScriptedModel {
    async fn generate_keywords(&self, _jd_text: &str) -> Result<Vec<String>, AiServiceError> {
        self.keyword_calls.fetch_add(1, Ordering::SeqCst);
        if !self.keyword_delay.is_zero() {
            tokio::time::sleep(self.keyword_delay).await;
        }
        self.keywords.clone()
    }

    async fn evaluate(
        &self,
        resume_text: &str,
        _jd_text: &str,
        _matches: &MatchResult,
    ) -> Result<AiVerdict, AiServiceError> {
        let call = {
            let mut calls = self.evaluate_calls.lock().unwrap();
            let count = calls.entry(resume_text.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let reply = self
            .replies
            .get(resume_text)
            .unwrap_or(&self.default_reply)
            .clone();

        match reply {
            Reply::Verdict(v) => Ok(v),
            Reply::Error(e) => Err(e),
            Reply::Delayed(delay, v) => {
                tokio::time::sleep(delay).await;
                Ok(v)
            }
            Reply::FlakyOnce(v) if call > 1 => Ok(v),
            Reply::FlakyOnce(_) => Err(AiServiceError::Transient("503 overloaded".to_string())),
        }
    }
}
