//! HTTP client for a Qdrant-compatible vector index.
//!
//! Only the logical contract of [`VectorIndex`] is relied upon by the
//! ranking engine. This module owns the wire format: request bodies,
//! the `api-key` header and the strict mapping of responses into
//! [`ScoredCandidate`]s.

use std::time::Duration;

use async_trait::async_trait;
use proxima_common::{AppConfig, ProximaError, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::index::{sort_by_similarity, IndexQuery, VectorIndex};
use crate::types::{Item, Payload, ScoredCandidate};

/// HNSW beam width requested per search
const HNSW_EF: usize = 128;

/// Qdrant point id: unsigned integer or UUID string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum PointId {
    Num(u64),
    Uuid(String),
}

impl PointId {
    /// Accepts only ids Qdrant can address: an unsigned integer or a UUID
    fn parse(id: &str) -> Result<Self> {
        if let Ok(n) = id.parse::<u64>() {
            return Ok(Self::Num(n));
        }
        match uuid::Uuid::parse_str(id) {
            Ok(uuid) => Ok(Self::Uuid(uuid.hyphenated().to_string())),
            Err(_) => Err(ProximaError::invalid_input(format!(
                "item id must be an unsigned integer or a UUID, got {:?}",
                id
            ))),
        }
    }

    fn into_string(self) -> String {
        match self {
            Self::Num(n) => n.to_string(),
            Self::Uuid(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    id: PointId,
    score: f32,
    #[serde(default)]
    payload: Option<Payload>,
}

#[derive(Debug, Deserialize)]
struct PointResponse {
    result: Option<StoredPoint>,
}

#[derive(Debug, Deserialize)]
struct StoredPoint {
    #[serde(default)]
    vector: Option<Value>,
}

/// Qdrant REST client bound to one collection
#[derive(Debug, Clone)]
pub struct QdrantIndex {
    endpoint: String,
    collection: String,
    api_key: Option<String>,
    timeout: Duration,
    client: Client,
}

impl QdrantIndex {
    pub fn new(
        endpoint: impl Into<String>,
        collection: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProximaError::config(format!("Failed to create HTTP client: {}", e)))?;

        let collection = collection.into();
        info!("Qdrant index client initialized: {} (collection={})", endpoint, collection);

        Ok(Self {
            endpoint,
            collection,
            api_key,
            timeout,
            client,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(
            &config.index_url,
            &config.index_collection,
            config.index_api_key.clone(),
            Duration::from_millis(config.query_timeout_ms),
        )
    }

    fn points_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}/points/{}", self.endpoint, self.collection, suffix)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ProximaError {
        if e.is_timeout() {
            ProximaError::Timeout(self.timeout)
        } else {
            ProximaError::backend(format!("Qdrant request failed: {}", e))
        }
    }

    /// Read a non-success response into the matching error
    async fn status_error(&self, response: reqwest::Response, actual_dim: usize) -> ProximaError {
        let status = response.status();
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error response".to_string());

        if status == StatusCode::BAD_REQUEST {
            if let Some(err) = parse_dimension_error(&error_text, actual_dim) {
                return err;
            }
        }

        ProximaError::backend(format!("Qdrant returned {}: {}", status, error_text))
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn query(&self, query: IndexQuery<'_>) -> Result<Vec<ScoredCandidate>> {
        let url = self.points_url("search");
        debug!(
            "Qdrant search - collection={}, fetch_limit={}, threshold={}, predicates={}",
            self.collection,
            query.fetch_limit,
            query.score_threshold,
            query.filter.predicates().len()
        );

        let response = self
            .authorized(self.client.post(&url))
            .json(&search_body(&query))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            return Err(self.status_error(response, query.vector.len()).await);
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let parsed: SearchResponse = serde_json::from_slice(&body)
            .map_err(|e| ProximaError::malformed(format!("search response: {}", e)))?;

        map_points(parsed.result, query.score_threshold, query.fetch_limit)
    }

    async fn point_vector(&self, id: &str) -> Result<Option<Vec<f32>>> {
        let point = PointId::parse(id)?.into_string();
        let response = self
            .authorized(self.client.get(self.points_url(&point)))
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(self.status_error(response, 0).await);
        }

        let body = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let parsed: PointResponse = serde_json::from_slice(&body)
            .map_err(|e| ProximaError::malformed(format!("point response: {}", e)))?;

        match parsed.result {
            Some(point) => parse_vector(point.vector).map(Some),
            None => Ok(None),
        }
    }

    fn name(&self) -> &str {
        "qdrant"
    }
}

/// JSON body for `POST /collections/{c}/points/search`
fn search_body(query: &IndexQuery<'_>) -> Value {
    let mut body = json!({
        "vector": query.vector,
        "limit": query.fetch_limit,
        "score_threshold": query.score_threshold,
        "with_payload": true,
        "with_vector": false,
        "params": {
            "hnsw_ef": HNSW_EF,
            "exact": false
        }
    });
    if let Some(filter) = query.filter.to_qdrant() {
        body["filter"] = filter;
    }
    body
}

/// Validate scored points and restore the index contract locally
fn map_points(
    points: Vec<ScoredPoint>,
    score_threshold: f32,
    fetch_limit: usize,
) -> Result<Vec<ScoredCandidate>> {
    let mut candidates = Vec::with_capacity(points.len());
    for point in points {
        if !point.score.is_finite() {
            return Err(ProximaError::malformed(format!(
                "non-finite score {} for point",
                point.score
            )));
        }
        let id = point.id.into_string();
        if point.score < score_threshold {
            warn!("Qdrant returned point {} below threshold ({})", id, point.score);
            continue;
        }
        let item = Item::new(id, Vec::new(), point.payload.unwrap_or_default());
        candidates.push(ScoredCandidate::new(item, point.score));
    }

    sort_by_similarity(&mut candidates);
    candidates.truncate(fetch_limit);
    Ok(candidates)
}

fn parse_vector(vector: Option<Value>) -> Result<Vec<f32>> {
    match vector {
        Some(Value::Array(values)) => values
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| ProximaError::malformed("non-numeric vector component"))
            })
            .collect(),
        Some(Value::Object(_)) => Err(ProximaError::malformed("named vectors are not supported")),
        _ => Err(ProximaError::malformed("point has no vector")),
    }
}

/// Qdrant reports shape errors as e.g.
/// `Wrong input: Vector dimension error: expected dim: 768, got 3`
fn parse_dimension_error(text: &str, actual_dim: usize) -> Option<ProximaError> {
    let lower = text.to_lowercase();
    if !lower.contains("dimension") {
        return None;
    }

    let number_after = |marker: &str| -> Option<usize> {
        let start = lower.find(marker)? + marker.len();
        let digits: String = lower[start..]
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    };

    let expected = number_after("expected dim:").unwrap_or(0);
    let actual = number_after("got").unwrap_or(actual_dim);
    Some(ProximaError::dimension_mismatch(expected, actual))
}
