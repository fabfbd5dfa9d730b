use proxima_common::AppConfig;
use proxima_vector::RankingEngine;
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Ranking engine, shared by all workers
    pub engine: Arc<RankingEngine>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: AppConfig, engine: RankingEngine) -> Self {
        Self {
            config,
            engine: Arc::new(engine),
        }
    }
}
