use std::sync::Arc;

use async_trait::async_trait;
use proxima_common::{AppConfig, EmbeddingBackend, ProximaError, Result};

use crate::gemini::GeminiEmbedder;
use crate::ollama::OllamaEmbedder;

/// Common trait for embedding services
///
/// Implementations report every failure as
/// [`ProximaError::EmbeddingUnavailable`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embedding for text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model name used for embeddings
    fn model(&self) -> &str;
}

/// Build the provider selected in configuration
pub fn from_config(config: &AppConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding_provider {
        EmbeddingBackend::Ollama => Ok(Arc::new(OllamaEmbedder::new(
            &config.embedding_base_url,
            &config.embedding_model,
        )?)),
        EmbeddingBackend::Gemini => {
            let api_key = config
                .embedding_api_key
                .clone()
                .ok_or_else(|| ProximaError::config("Gemini embeddings require an API key"))?;
            Ok(Arc::new(GeminiEmbedder::new(
                &config.embedding_base_url,
                &config.embedding_model,
                api_key,
            )?))
        }
    }
}
