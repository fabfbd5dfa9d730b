use proxima_vector::{FilterParams, Location, PublicResult, SearchOptions};
use serde::{Deserialize, Serialize};

/// POST /search body
#[derive(Debug, Deserialize)]
pub struct SearchBody {
    /// Free-text query
    pub query: String,

    /// Loose filter parameters (minPrice, category, ...)
    #[serde(default)]
    pub filters: FilterParams,

    /// Result count
    pub limit: Option<usize>,

    /// Ranked results to skip
    #[serde(default)]
    pub offset: usize,

    /// Caller position; enables geo ranking
    pub location: Option<Location>,

    /// Drop results farther than this
    pub radius_km: Option<f64>,

    /// Override the configured similarity threshold
    pub score_threshold: Option<f32>,

    /// Include similarity and distance in results
    #[serde(default)]
    pub include_scores: bool,
}

impl SearchBody {
    /// Split into query text and engine options
    pub fn into_parts(self) -> (String, SearchOptions) {
        let options = SearchOptions {
            filters: self.filters,
            limit: self.limit,
            offset: self.offset,
            location: self.location,
            radius_km: self.radius_km,
            score_threshold: self.score_threshold,
            include_scores: self.include_scores,
        };
        (self.query, options)
    }
}

/// POST /search/similar body
#[derive(Debug, Deserialize)]
pub struct SimilarBody {
    /// Source item ID
    pub id: String,

    #[serde(default)]
    pub filters: FilterParams,

    pub limit: Option<usize>,

    #[serde(default)]
    pub offset: usize,

    pub location: Option<Location>,

    pub radius_km: Option<f64>,

    #[serde(default)]
    pub include_scores: bool,
}

impl SimilarBody {
    pub fn into_parts(self) -> (String, SearchOptions) {
        let options = SearchOptions {
            filters: self.filters,
            limit: self.limit,
            offset: self.offset,
            location: self.location,
            radius_km: self.radius_km,
            score_threshold: None,
            include_scores: self.include_scores,
        };
        (self.id, options)
    }
}

/// Search response
#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<PublicResult>,
    pub count: usize,
}

impl From<Vec<PublicResult>> for SearchResponse {
    fn from(results: Vec<PublicResult>) -> Self {
        Self {
            count: results.len(),
            results,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub index: String,
    pub collection: String,
    pub embedding_model: String,
    pub dimension: usize,
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Machine-readable code, e.g. `invalid_filter`
    pub error: String,

    /// Human-readable message
    pub message: String,
}
