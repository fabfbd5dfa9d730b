use serde::{Deserialize, Serialize};

/// Ollama embedding request
#[derive(Debug, Clone, Serialize)]
pub struct EmbedRequest {
    /// Model name (e.g., "nomic-embed-text")
    pub model: String,

    /// Text to embed
    pub prompt: String,
}

/// Ollama embedding response
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedResponse {
    /// Embedding vector
    #[serde(default)]
    pub embedding: Vec<f32>,
}

/// Gemini `embedContent` request
#[derive(Debug, Clone, Serialize)]
pub struct GeminiEmbedRequest {
    /// Fully qualified model ("models/embedding-001")
    pub model: String,

    pub content: GeminiContent,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GeminiPart {
    pub text: String,
}

impl GeminiEmbedRequest {
    /// Single-part text request
    pub fn text(model: &str, text: impl Into<String>) -> Self {
        Self {
            model: format!("models/{}", model.trim_start_matches("models/")),
            content: GeminiContent {
                parts: vec![GeminiPart { text: text.into() }],
            },
        }
    }
}

/// Gemini `embedContent` response
#[derive(Debug, Clone, Deserialize)]
pub struct GeminiEmbedResponse {
    pub embedding: GeminiValues,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiValues {
    #[serde(default)]
    pub values: Vec<f32>,
}
