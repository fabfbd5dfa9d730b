use std::time::Duration;

/// Proxima error types
#[derive(Debug, thiserror::Error)]
pub enum ProximaError {
    /// Vector shape does not match the collection dimension
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Upstream embedding provider failed
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Index service unreachable or erroring
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Index query exceeded its deadline
    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),

    /// Index answered with a body we could not map
    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    /// Filter parameters could not be normalized
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller cancelled the search
    #[error("Search cancelled")]
    Cancelled,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General error (anyhow integration)
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ProximaError {
    /// Create dimension mismatch error
    pub fn dimension_mismatch(expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch { expected, actual }
    }

    /// Create embedding error
    pub fn embedding<S: Into<String>>(msg: S) -> Self {
        Self::EmbeddingUnavailable(msg.into())
    }

    /// Create backend error
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    /// Create malformed response error
    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Create invalid filter error
    pub fn invalid_filter<S: Into<String>>(msg: S) -> Self {
        Self::InvalidFilter(msg.into())
    }

    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// True for the backend family: unreachable, timed out, or malformed.
    pub fn is_backend_unavailable(&self) -> bool {
        matches!(
            self,
            Self::BackendUnavailable(_) | Self::Timeout(_) | Self::MalformedResponse(_)
        )
    }

    /// Validation failures are raised before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::DimensionMismatch { .. } | Self::InvalidFilter(_) | Self::InvalidInput(_)
        )
    }
}

// HTTP response conversion
impl ProximaError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::DimensionMismatch { .. } => 400,
            Self::InvalidFilter(_) => 400,
            Self::InvalidInput(_) => 400,
            Self::Json(_) => 400,
            Self::NotFound(_) => 404,
            Self::Cancelled => 499,
            Self::EmbeddingUnavailable(_) => 502,
            Self::MalformedResponse(_) => 502,
            Self::BackendUnavailable(_) => 503,
            Self::Timeout(_) => 504,
            Self::Config(_) => 500,
            Self::Io(_) => 500,
            Self::Other(_) => 500,
        }
    }

    /// Stable machine-readable error code
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::EmbeddingUnavailable(_) => "embedding_unavailable",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Timeout(_) => "backend_timeout",
            Self::MalformedResponse(_) => "malformed_response",
            Self::InvalidFilter(_) => "invalid_filter",
            Self::InvalidInput(_) | Self::Json(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::Cancelled => "cancelled",
            Self::Config(_) | Self::Io(_) | Self::Other(_) => "internal",
        }
    }
}
