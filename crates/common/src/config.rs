use crate::error::ProximaError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Embedding service used to turn query text into vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Ollama,
    Gemini,
}

impl EmbeddingBackend {
    /// Base URL used when `EMBEDDING_BASE_URL` is unset
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Ollama => "http://localhost:11434",
            Self::Gemini => "https://generativelanguage.googleapis.com",
        }
    }

    /// Model used when `EMBEDDING_MODEL` is unset
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Ollama => "nomic-embed-text",
            Self::Gemini => "embedding-001",
        }
    }
}

impl FromStr for EmbeddingBackend {
    type Err = ProximaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" => Ok(Self::Gemini),
            other => Err(ProximaError::config(format!(
                "Unknown embedding provider '{}'",
                other
            ))),
        }
    }
}

/// Proxima application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Vector index base URL
    pub index_url: String,

    /// Vector index API key (sent as `api-key`)
    pub index_api_key: Option<String>,

    /// Collection holding the searchable items
    pub index_collection: String,

    /// Embedding dimension of the collection
    pub vector_dim: usize,

    /// Embedding provider
    pub embedding_provider: EmbeddingBackend,

    /// Embedding API base URL
    pub embedding_base_url: String,

    /// Embedding model name
    pub embedding_model: String,

    /// Embedding API key (Gemini only)
    pub embedding_api_key: Option<String>,

    /// Default inclusive similarity threshold
    pub score_threshold: f32,

    /// Over-fetch multiplier applied when geo ranking is active
    pub over_fetch_factor: usize,

    /// Lower bound of the over-fetched pool
    pub min_over_fetch: usize,

    /// Cap on `offset + limit` and on the over-fetched pool of geo searches
    pub max_fetch: usize,

    /// Largest page size a caller may request
    pub max_limit: usize,

    /// Index query timeout in milliseconds
    pub query_timeout_ms: u64,

    /// Result count when the caller gives none
    pub default_limit: usize,

    /// Payload field carrying `{lat, lon}`
    pub location_field: String,

    /// Payload fields exposed to callers (empty = all)
    pub public_fields: Vec<String>,

    /// Extra exact-match filter keys beyond `category` and `type`
    pub match_fields: Vec<String>,

    /// Server bind address
    pub server_host: String,

    /// Server port
    pub server_port: u16,

    /// Log directory
    pub log_dir: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            index_url: "http://localhost:6333".to_string(),
            index_api_key: None,
            index_collection: "items".to_string(),
            vector_dim: 768,
            embedding_provider: EmbeddingBackend::Ollama,
            embedding_base_url: EmbeddingBackend::Ollama.default_base_url().to_string(),
            embedding_model: EmbeddingBackend::Ollama.default_model().to_string(),
            embedding_api_key: None,
            score_threshold: 0.72,
            over_fetch_factor: 3,
            min_over_fetch: 30,
            max_fetch: 500,
            max_limit: 100,
            query_timeout_ms: 5000,
            default_limit: 20,
            location_field: "location".to_string(),
            public_fields: Vec::new(),
            match_fields: Vec::new(),
            server_host: "0.0.0.0".to_string(),
            server_port: 8080,
            log_dir: PathBuf::from("./log"),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self, ProximaError> {
        // Load .env file (ignore if not exists)
        let _ = dotenv::dotenv();

        let defaults = Self::default();

        let embedding_provider: EmbeddingBackend =
            Self::get_env_parsed("EMBEDDING_PROVIDER")?.unwrap_or(defaults.embedding_provider);

        let config = Self {
            index_url: std::env::var("INDEX_URL").unwrap_or(defaults.index_url),
            index_api_key: Self::get_env_opt("INDEX_API_KEY"),
            index_collection: std::env::var("INDEX_COLLECTION")
                .unwrap_or(defaults.index_collection),
            vector_dim: Self::get_env_parsed("VECTOR_DIM")?.unwrap_or(defaults.vector_dim),
            embedding_provider,
            embedding_base_url: Self::get_env_opt("EMBEDDING_BASE_URL")
                .unwrap_or_else(|| embedding_provider.default_base_url().to_string()),
            embedding_model: Self::get_env_opt("EMBEDDING_MODEL")
                .unwrap_or_else(|| embedding_provider.default_model().to_string()),
            embedding_api_key: Self::get_env_opt("EMBEDDING_API_KEY"),
            score_threshold: Self::get_env_parsed("SCORE_THRESHOLD")?
                .unwrap_or(defaults.score_threshold),
            over_fetch_factor: Self::get_env_parsed("OVER_FETCH_FACTOR")?
                .unwrap_or(defaults.over_fetch_factor),
            min_over_fetch: Self::get_env_parsed("MIN_OVER_FETCH")?
                .unwrap_or(defaults.min_over_fetch),
            max_fetch: Self::get_env_parsed("MAX_FETCH")?.unwrap_or(defaults.max_fetch),
            max_limit: Self::get_env_parsed("MAX_LIMIT")?.unwrap_or(defaults.max_limit),
            query_timeout_ms: Self::get_env_parsed("QUERY_TIMEOUT_MS")?
                .unwrap_or(defaults.query_timeout_ms),
            default_limit: Self::get_env_parsed("DEFAULT_LIMIT")?
                .unwrap_or(defaults.default_limit),
            location_field: std::env::var("LOCATION_FIELD").unwrap_or(defaults.location_field),
            public_fields: std::env::var("PUBLIC_FIELDS")
                .map(|s| Self::split_list(&s))
                .unwrap_or(defaults.public_fields),
            match_fields: std::env::var("MATCH_FIELDS")
                .map(|s| Self::split_list(&s))
                .unwrap_or(defaults.match_fields),
            server_host: std::env::var("SERVER_HOST").unwrap_or(defaults.server_host),
            server_port: Self::get_env_parsed("SERVER_PORT")?.unwrap_or(defaults.server_port),
            log_dir: std::env::var("LOG_DIR")
                .ok()
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            log_level: std::env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
        };

        config.validate()?;

        Ok(config)
    }

    /// Non-empty environment variable
    fn get_env_opt(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    }

    /// Parse environment variable, reporting which key was malformed
    fn get_env_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ProximaError> {
        match Self::get_env_opt(key) {
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ProximaError::config(format!("{} has an invalid value: {}", key, raw))),
            None => Ok(None),
        }
    }

    /// Comma separated list, blanks dropped
    fn split_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    /// Get server bind address (host:port)
    pub fn server_bind_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ProximaError> {
        for (name, url) in [
            ("Index", &self.index_url),
            ("Embedding", &self.embedding_base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ProximaError::config(format!(
                    "{} URL must start with http:// or https://",
                    name
                )));
            }
        }

        if self.index_collection.is_empty() {
            return Err(ProximaError::config("Index collection cannot be empty"));
        }

        if self.vector_dim == 0 {
            return Err(ProximaError::config("Vector dimension cannot be 0"));
        }

        if !(-1.0..=1.0).contains(&self.score_threshold) {
            return Err(ProximaError::config("Score threshold must be within [-1, 1]"));
        }

        if self.over_fetch_factor == 0 || self.min_over_fetch == 0 || self.default_limit == 0 {
            return Err(ProximaError::config(
                "Over-fetch factor, minimum over-fetch and default limit must be positive",
            ));
        }

        if self.max_fetch < self.min_over_fetch {
            return Err(ProximaError::config("MAX_FETCH cannot be below MIN_OVER_FETCH"));
        }

        if self.max_limit == 0 || self.max_limit > self.max_fetch {
            return Err(ProximaError::config("MAX_LIMIT must be within 1..=MAX_FETCH"));
        }

        if self.default_limit > self.max_limit {
            return Err(ProximaError::config("DEFAULT_LIMIT cannot exceed MAX_LIMIT"));
        }

        if self.query_timeout_ms == 0 {
            return Err(ProximaError::config("Query timeout cannot be 0"));
        }

        if self.embedding_provider == EmbeddingBackend::Gemini && self.embedding_api_key.is_none() {
            return Err(ProximaError::config("Gemini embeddings require EMBEDDING_API_KEY"));
        }

        // Validate port range
        if self.server_port == 0 {
            return Err(ProximaError::config("Server port cannot be 0"));
        }

        Ok(())
    }
}
