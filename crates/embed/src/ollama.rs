use async_trait::async_trait;
use proxima_common::{ProximaError, Result};
use reqwest::Client;
use tracing::{debug, info};

use crate::provider::EmbeddingProvider;
use crate::types::{EmbedRequest, EmbedResponse};

/// Ollama embedding client
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    client: Client,
    max_attempts: u32,
}

impl OllamaEmbedder {
    /// Create new Ollama embedder
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProximaError::config(format!("Failed to create HTTP client: {}", e)))?;

        info!("Ollama embedder initialized: {}", base_url);
        Ok(Self {
            base_url,
            model: model.into(),
            client,
            max_attempts: 1,
        })
    }

    /// Allow retries with exponential backoff (1 = single attempt)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Single attempt to generate embedding
    async fn try_embed(&self, url: &str, request: &EmbedRequest) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| ProximaError::embedding(format!("Failed to send embedding request: {}", e)))?
            .error_for_status()
            .map_err(|e| ProximaError::embedding(format!("Ollama embedding API error: {}", e)))?;

        let result: EmbedResponse = response.json().await.map_err(|e| {
            ProximaError::embedding(format!("Failed to parse embedding response: {}", e))
        })?;

        if result.embedding.is_empty() {
            return Err(ProximaError::embedding("Empty embedding from Ollama"));
        }

        Ok(result.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbedRequest {
            model: self.model.clone(),
            prompt: text.to_string(),
        };

        debug!("Generating embedding - Model: {}, Text length: {}", self.model, text.len());

        let mut attempt = 1;
        loop {
            match self.try_embed(&url, &request).await {
                Ok(embedding) => {
                    debug!("Received embedding - Dimension: {}", embedding.len());
                    return Ok(embedding);
                }
                Err(e) if attempt < self.max_attempts => {
                    let delay = std::time::Duration::from_millis(500 * 2u64.pow(attempt - 1));
                    tracing::warn!(
                        "Embedding request failed (attempt {}/{}): {}. Retrying in {:?}...",
                        attempt,
                        self.max_attempts,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        let embedder = OllamaEmbedder::new("http://localhost:11434/", "nomic-embed-text").unwrap();
        assert_eq!(embedder.base_url, "http://localhost:11434");
        assert_eq!(embedder.max_attempts, 1);
        assert_eq!(embedder.with_max_attempts(0).max_attempts, 1);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_embedding_unavailable() {
        // Nothing listens on the discard port
        let embedder = OllamaEmbedder::new("http://127.0.0.1:9", "nomic-embed-text").unwrap();
        let err = embedder.embed("mechanic near me").await.unwrap_err();
        assert!(matches!(err, ProximaError::EmbeddingUnavailable(_)));
    }
}
