use async_trait::async_trait;
use proxima_common::{ProximaError, Result};
use reqwest::Client;
use tracing::{debug, info};

use crate::provider::EmbeddingProvider;
use crate::types::{GeminiEmbedRequest, GeminiEmbedResponse};

/// Google Gemini `embedContent` client
#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    base_url: String,
    model: String,
    api_key: String,
    client: Client,
}

impl GeminiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| ProximaError::config(format!("Failed to create HTTP client: {}", e)))?;

        info!("Gemini embedder initialized: {}", base_url);
        Ok(Self {
            base_url,
            model: model.into().trim_start_matches("models/").to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:embedContent", self.base_url, self.model)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding - Model: {}, Text length: {}", self.model, text.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&GeminiEmbedRequest::text(&self.model, text))
            .send()
            .await
            .map_err(|e| ProximaError::embedding(format!("Failed to send embedding request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ProximaError::embedding(format!(
                "Gemini API error {}: {}",
                status, error_text
            )));
        }

        let result: GeminiEmbedResponse = response.json().await.map_err(|e| {
            ProximaError::embedding(format!("Failed to parse Gemini embedding response: {}", e))
        })?;

        if result.embedding.values.is_empty() {
            return Err(ProximaError::embedding("Empty embedding from Gemini"));
        }

        Ok(result.embedding.values)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
