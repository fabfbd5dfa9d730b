//! Proxima embedding providers
//!
//! Turns query text into vectors through an external embedding service

mod gemini;
mod ollama;
mod provider;
mod types;

pub use gemini::GeminiEmbedder;
pub use ollama::OllamaEmbedder;
pub use provider::{from_config, EmbeddingProvider};
pub use types::{EmbedRequest, EmbedResponse, GeminiContent, GeminiEmbedRequest, GeminiEmbedResponse, GeminiPart, GeminiValues};
