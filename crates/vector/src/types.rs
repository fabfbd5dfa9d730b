use proxima_common::{ProximaError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::distance::haversine_km;
use crate::filter::FilterParams;

/// Default inclusive similarity threshold
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.72;

/// Domain attributes attached to an item (name, price, category, location, ...)
pub type Payload = serde_json::Map<String, Value>;

/// Searchable item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Item ID
    pub id: String,

    /// Embedding; empty when the backend did not return it
    #[serde(default)]
    pub vector: Vec<f32>,

    /// Payload
    #[serde(default)]
    pub payload: Payload,
}

impl Item {
    pub fn new(id: impl Into<String>, vector: Vec<f32>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            vector,
            payload,
        }
    }

    /// Location stored under `field`, if present and well formed
    pub fn location(&self, field: &str) -> Option<Location> {
        self.payload.get(field).and_then(Location::from_value)
    }
}

/// Geographic point in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,

    #[serde(alias = "lng")]
    pub lon: f64,
}

impl Location {
    /// Create a validated location
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let location = Self { lat, lon };
        location.validate()?;
        Ok(location)
    }

    /// Latitude within [-90, 90], longitude within [-180, 180]
    pub fn validate(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ProximaError::invalid_input(format!(
                "latitude {} outside [-90, 90]",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(ProximaError::invalid_input(format!(
                "longitude {} outside [-180, 180]",
                self.lon
            )));
        }
        Ok(())
    }

    /// Read `{lat, lon}` (or `{lat, lng}`) from a payload value.
    /// Out-of-range coordinates count as missing.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let lat = obj.get("lat")?.as_f64()?;
        let lon = obj.get("lon").or_else(|| obj.get("lng"))?.as_f64()?;
        Self::new(lat, lon).ok()
    }

    /// Great-circle distance to `other` in kilometres
    pub fn distance_km(&self, other: &Location) -> f64 {
        haversine_km(self.lat, self.lon, other.lat, other.lon)
    }
}

/// Index hit, produced fresh per query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub item: Item,

    /// Cosine similarity in [-1, 1]
    pub similarity: f32,

    /// Set only when geo ranking ran; `INFINITY` when the item has no location
    pub distance_km: Option<f64>,
}

impl ScoredCandidate {
    pub fn new(item: Item, similarity: f32) -> Self {
        Self {
            item,
            similarity,
            distance_km: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.item.id
    }
}

/// Ranking request over a precomputed query vector
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query_vector: Vec<f32>,

    /// Loose filter parameters, normalized by the filter builder
    pub filters: FilterParams,

    /// Final result count
    pub limit: usize,

    /// Ranked results skipped before the page starts
    pub offset: usize,

    /// Inclusive lower bound on similarity
    pub score_threshold: f32,

    /// Enables geo re-ranking
    pub location: Option<Location>,

    /// Drop candidates farther than this (unknown distances are kept)
    pub radius_km: Option<f64>,
}

impl SearchRequest {
    pub fn new(query_vector: Vec<f32>, limit: usize) -> Self {
        Self {
            query_vector,
            filters: FilterParams::new(),
            limit,
            offset: 0,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            location: None,
            radius_km: None,
        }
    }

    pub fn with_filters(mut self, filters: FilterParams) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = score_threshold;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_radius_km(mut self, radius_km: f64) -> Self {
        self.radius_km = Some(radius_km);
        self
    }
}

/// Caller-facing search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicResult {
    pub id: String,

    /// Whitelisted payload fields
    pub payload: Payload,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}
