use std::sync::Arc;

use crate::config::Config;
use crate::screening::ai::ScreeningModel;
use crate::screening::evaluator::ScreeningEvaluator;
use crate::screening::keywords::KeywordCache;
use crate::screening::sessions::BatchRegistry;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Pluggable AI backend. Production: `LlmScreeningModel`.
    pub model: Arc<dyn ScreeningModel>,
    pub evaluator: Arc<ScreeningEvaluator>,
    pub keyword_cache: Arc<KeywordCache>,
    pub batches: Arc<BatchRegistry>,
}

impl AppState {
    pub fn new(config: Config, model: Arc<dyn ScreeningModel>) -> Self {
        let evaluator = Arc::new(ScreeningEvaluator::new(model.clone(), &config.screening));
        let batch_retention = config.screening.batch_retention;
        Self {
            config,
            model,
            evaluator,
            keyword_cache: Arc::new(KeywordCache::new()),
            batches: Arc::new(BatchRegistry::new(batch_retention)),
        }
    }
}
