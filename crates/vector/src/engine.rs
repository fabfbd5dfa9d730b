use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use proxima_common::{AppConfig, ProximaError, Result};
use proxima_embed::EmbeddingProvider;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::filter::{Filter, FilterBuilder, FilterParams};
use crate::index::{sort_by_similarity, IndexQuery, VectorIndex};
use crate::projection::Projection;
use crate::qdrant::QdrantIndex;
use crate::types::{Location, PublicResult, ScoredCandidate, SearchRequest};

/// Engine settings, fixed at construction
#[derive(Debug, Clone)]
pub struct RankingConfig {
    /// Collection embedding dimension
    pub dimension: usize,

    /// Threshold used when a search does not set one
    pub score_threshold: f32,

    /// Over-fetch multiplier for geo searches
    pub over_fetch_factor: usize,

    /// Smallest over-fetched pool
    pub min_over_fetch: usize,

    /// Cap on `offset + limit` and on the over-fetched pool
    pub max_fetch: usize,

    /// Largest accepted page size
    pub max_limit: usize,

    /// Deadline for a single index call
    pub query_timeout: Duration,

    /// Result count when a search does not set one
    pub default_limit: usize,

    /// Payload field holding item locations
    pub location_field: String,

    /// Projection applied to public results
    pub projection: Projection,
}

impl RankingConfig {
    /// Defaults for a collection of the given dimension
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Self::from(&AppConfig::default())
        }
    }
}

impl From<&AppConfig> for RankingConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            dimension: config.vector_dim,
            score_threshold: config.score_threshold,
            over_fetch_factor: config.over_fetch_factor,
            min_over_fetch: config.min_over_fetch,
            max_fetch: config.max_fetch,
            max_limit: config.max_limit,
            query_timeout: Duration::from_millis(config.query_timeout_ms),
            default_limit: config.default_limit,
            location_field: config.location_field.clone(),
            projection: Projection::from_config(config),
        }
    }
}

/// Per-search options shared by text and item-to-item searches
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub filters: FilterParams,
    pub limit: Option<usize>,
    pub offset: usize,
    pub location: Option<Location>,
    pub radius_km: Option<f64>,
    pub score_threshold: Option<f32>,
    pub include_scores: bool,
}

impl SearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filters(mut self, filters: FilterParams) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
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

    pub fn with_threshold(mut self, score_threshold: f32) -> Self {
        self.score_threshold = Some(score_threshold);
        self
    }

    pub fn with_scores(mut self, include_scores: bool) -> Self {
        self.include_scores = include_scores;
        self
    }
}

/// Similarity search and ranking engine
///
/// Stateless between calls: every search embeds, queries and ranks on its
/// own, so one engine can serve concurrent searches behind an `Arc`.
pub struct RankingEngine {
    config: RankingConfig,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    filters: FilterBuilder,
}

impl RankingEngine {
    pub fn new(
        config: RankingConfig,
        index: Arc<dyn VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        info!(
            "Ranking engine initialized - index={}, model={}, dim={}, threshold={}",
            index.name(),
            embedder.model(),
            config.dimension,
            config.score_threshold
        );
        Self {
            config,
            index,
            embedder,
            filters: FilterBuilder::default(),
        }
    }

    /// Qdrant index and the configured embedding provider
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let index = Arc::new(QdrantIndex::from_config(config)?);
        let embedder = proxima_embed::from_config(config)?;
        let filters = config
            .match_fields
            .iter()
            .fold(FilterBuilder::default(), |builder, field| {
                builder.with_match_field(field.as_str())
            });
        Ok(Self::new(RankingConfig::from(config), index, embedder).with_filter_builder(filters))
    }

    pub fn with_filter_builder(mut self, filters: FilterBuilder) -> Self {
        self.filters = filters;
        self
    }

    pub fn config(&self) -> &RankingConfig {
        &self.config
    }

    pub fn embedding_model(&self) -> &str {
        self.embedder.model()
    }

    pub fn index_name(&self) -> &str {
        self.index.name()
    }

    /// Candidates requested from the index for a ranked `window`
    /// (`offset + limit`)
    ///
    /// Geo ranking can promote close items with lower similarity, so the pool
    /// is over-fetched: `max(window * factor, min_over_fetch)`, capped at
    /// `max_fetch`, and never below `window`.
    pub fn fetch_limit(&self, window: usize, geo: bool) -> usize {
        if !geo {
            return window;
        }
        window
            .saturating_mul(self.config.over_fetch_factor)
            .max(self.config.min_over_fetch)
            .min(self.config.max_fetch)
            .max(window)
    }

    /// Rank candidates for a precomputed query vector
    pub async fn rank(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredCandidate>> {
        self.check_vector(&request.query_vector)?;
        self.validate(
            request.limit,
            request.offset,
            request.score_threshold,
            request.location.as_ref(),
            request.radius_km,
        )?;
        let filter = self.filters.build(&request.filters)?;

        self.rank_with(request, &filter, cancel).await
    }

    /// Public query surface: embed `query`, rank, project
    pub async fn search(
        &self,
        query: &str,
        filters: &FilterParams,
        limit: Option<usize>,
        location: Option<Location>,
    ) -> Result<Vec<PublicResult>> {
        let options = SearchOptions {
            filters: filters.clone(),
            limit,
            location,
            ..SearchOptions::default()
        };
        self.execute(query, options, &CancellationToken::new()).await
    }

    /// Text search with full options and caller-controlled cancellation
    pub async fn execute(
        &self,
        query: &str,
        options: SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<PublicResult>> {
        let text = query.trim();
        if text.is_empty() {
            return Err(ProximaError::invalid_input("Query cannot be empty"));
        }

        let (limit, score_threshold) = self.resolve(&options);
        self.validate(
            limit,
            options.offset,
            score_threshold,
            options.location.as_ref(),
            options.radius_km,
        )?;
        let filter = self.filters.build(&options.filters)?;

        debug!("Embedding query - model={}, length={}", self.embedder.model(), text.len());
        let query_vector = cancellable(cancel, self.embedder.embed(text))
            .await
            .map_err(|e| match e {
                ProximaError::EmbeddingUnavailable(_) | ProximaError::Cancelled => e,
                other => ProximaError::embedding(other.to_string()),
            })?;
        self.check_vector(&query_vector)?;

        let include_scores = options.include_scores;
        let request = Self::request(query_vector, options, limit, score_threshold);
        let ranked = self.rank_with(&request, &filter, cancel).await?;

        Ok(self.projection(include_scores).project(ranked))
    }

    /// Items similar to a stored item, excluding the item itself
    pub async fn similar_to(
        &self,
        id: &str,
        options: SearchOptions,
        cancel: &CancellationToken,
    ) -> Result<Vec<PublicResult>> {
        let id = id.trim();
        if id.is_empty() {
            return Err(ProximaError::invalid_input("Item id cannot be empty"));
        }

        let (limit, score_threshold) = self.resolve(&options);
        self.validate(
            limit,
            options.offset,
            score_threshold,
            options.location.as_ref(),
            options.radius_km,
        )?;
        let filter = self.filters.build(&options.filters)?;

        let query_vector = self
            .bounded(cancel, self.index.point_vector(id))
            .await?
            .ok_or_else(|| ProximaError::not_found(format!("item {}", id)))?;
        self.check_vector(&query_vector)?;

        let include_scores = options.include_scores;
        let offset = options.offset;
        // Rank the whole window from the top, plus one slot for the source
        // item, which always matches itself
        let window = offset.saturating_add(limit).saturating_add(1);
        let mut request = Self::request(query_vector, options, window, score_threshold);
        request.offset = 0;

        let page: Vec<ScoredCandidate> = self
            .rank_with(&request, &filter, cancel)
            .await?
            .into_iter()
            .filter(|c| c.item.id != id)
            .skip(offset)
            .take(limit)
            .collect();

        Ok(self.projection(include_scores).project(page))
    }

    async fn rank_with(
        &self,
        request: &SearchRequest,
        filter: &Filter,
        cancel: &CancellationToken,
    ) -> Result<Vec<ScoredCandidate>> {
        let window = request.offset.saturating_add(request.limit);
        let fetch_limit = self.fetch_limit(window, request.location.is_some());
        debug!(
            "Querying {} index - limit={}, offset={}, fetch_limit={}, threshold={}, predicates={}, geo={}",
            self.index.name(),
            request.limit,
            request.offset,
            fetch_limit,
            request.score_threshold,
            filter.predicates().len(),
            request.location.is_some()
        );

        let query = IndexQuery {
            vector: &request.query_vector,
            filter,
            score_threshold: request.score_threshold,
            fetch_limit,
        };
        let candidates = self.bounded(cancel, self.index.query(query)).await?;

        if cancel.is_cancelled() {
            return Err(ProximaError::Cancelled);
        }

        let fetched = candidates.len();
        let ranked = order_candidates(candidates, request, &self.config.location_field);

        info!(
            "Search completed - {} results (ranked from {} candidates)",
            ranked.len(),
            fetched
        );
        Ok(ranked)
    }

    /// Index call bounded by the query timeout and the cancellation token
    async fn bounded<T, F>(&self, cancel: &CancellationToken, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let timeout = self.config.query_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ProximaError::Cancelled),
            res = tokio::time::timeout(timeout, fut) => match res {
                Ok(result) => result,
                Err(_) => {
                    warn!("{} index query timed out after {:?}", self.index.name(), timeout);
                    Err(ProximaError::Timeout(timeout))
                }
            },
        }
    }

    fn resolve(&self, options: &SearchOptions) -> (usize, f32) {
        (
            options.limit.unwrap_or(self.config.default_limit),
            options.score_threshold.unwrap_or(self.config.score_threshold),
        )
    }

    fn projection(&self, include_scores: bool) -> Projection {
        let projection = self.config.projection.clone();
        let include_scores = include_scores || projection.include_scores;
        projection.with_scores(include_scores)
    }

    fn request(
        query_vector: Vec<f32>,
        options: SearchOptions,
        limit: usize,
        score_threshold: f32,
    ) -> SearchRequest {
        SearchRequest {
            query_vector,
            filters: options.filters,
            limit,
            offset: options.offset,
            score_threshold,
            location: options.location,
            radius_km: options.radius_km,
        }
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.config.dimension {
            return Err(ProximaError::dimension_mismatch(self.config.dimension, vector.len()));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(ProximaError::invalid_input("Query vector contains non-finite values"));
        }
        Ok(())
    }

    fn validate(
        &self,
        limit: usize,
        offset: usize,
        score_threshold: f32,
        location: Option<&Location>,
        radius_km: Option<f64>,
    ) -> Result<()> {
        if limit == 0 {
            return Err(ProximaError::invalid_input("limit must be greater than 0"));
        }
        if limit > self.config.max_limit {
            return Err(ProximaError::invalid_input(format!(
                "limit {} exceeds the maximum of {}",
                limit, self.config.max_limit
            )));
        }
        if offset.saturating_add(limit) > self.config.max_fetch {
            return Err(ProximaError::invalid_input(format!(
                "offset + limit must not exceed {}",
                self.config.max_fetch
            )));
        }
        if !(-1.0..=1.0).contains(&score_threshold) {
            return Err(ProximaError::invalid_input(format!(
                "score threshold {} outside [-1, 1]",
                score_threshold
            )));
        }
        if let Some(location) = location {
            location.validate()?;
        }
        if let Some(radius) = radius_km {
            if location.is_none() {
                return Err(ProximaError::invalid_input("radius_km requires a location"));
            }
            if !radius.is_finite() || radius < 0.0 {
                return Err(ProximaError::invalid_input(format!(
                    "radius_km {} must be a non-negative number",
                    radius
                )));
            }
        }
        Ok(())
    }
}

/// Await `fut` unless the token fires first
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ProximaError::Cancelled),
        result = fut => result,
    }
}

/// Threshold, optional geo re-rank, deterministic order, then the
/// `offset..offset + limit` page
fn order_candidates(
    candidates: Vec<ScoredCandidate>,
    request: &SearchRequest,
    location_field: &str,
) -> Vec<ScoredCandidate> {
    let mut candidates: Vec<ScoredCandidate> = candidates
        .into_iter()
        .filter(|c| c.similarity >= request.score_threshold)
        .collect();

    match request.location {
        None => sort_by_similarity(&mut candidates),
        Some(origin) => {
            for candidate in &mut candidates {
                let distance = candidate
                    .item
                    .location(location_field)
                    .map_or(f64::INFINITY, |loc| origin.distance_km(&loc));
                candidate.distance_km = Some(distance);
            }

            if let Some(radius) = request.radius_km {
                candidates.retain(|c| {
                    let d = c.distance_km.unwrap_or(f64::INFINITY);
                    d.is_infinite() || d <= radius
                });
            }

            candidates.sort_by(|a, b| {
                let da = a.distance_km.unwrap_or(f64::INFINITY);
                let db = b.distance_km.unwrap_or(f64::INFINITY);
                da.total_cmp(&db)
                    .then_with(|| b.similarity.total_cmp(&a.similarity))
                    .then_with(|| a.item.id.cmp(&b.item.id))
            });
        }
    }

    candidates
        .into_iter()
        .skip(request.offset)
        .take(request.limit)
        .collect()
}
