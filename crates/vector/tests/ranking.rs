use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use proxima_common::{ProximaError, Result};
use proxima_embed::EmbeddingProvider;
use proxima_vector::{
    CancellationToken, FilterParams, InMemoryIndex, IndexQuery, Item, Location, Payload,
    PublicResult, RankingConfig, RankingEngine, ScoredCandidate, SearchOptions, SearchRequest,
    VectorIndex,
};
use serde_json::{json, Value};

const ORIGIN: (f64, f64) = (37.7749, -122.4194);
const KM_PER_DEGREE_LAT: f64 = 111.195;

/// Always embeds to the unit x-axis, or fails
struct StubEmbedder {
    fail: bool,
    dimension: usize,
}

impl StubEmbedder {
    fn ok() -> Arc<Self> {
        Arc::new(Self { fail: false, dimension: 2 })
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        if self.fail {
            return Err(ProximaError::embedding("model offline"));
        }
        let mut v = vec![0.0; self.dimension];
        v[0] = 1.0;
        Ok(v)
    }

    fn model(&self) -> &str {
        "stub"
    }
}

/// Wraps an index and records how it was called
struct RecordingIndex {
    inner: InMemoryIndex,
    calls: AtomicUsize,
    last_fetch_limit: Mutex<Option<usize>>,
}

impl RecordingIndex {
    fn new(items: Vec<Item>) -> Arc<Self> {
        Arc::new(Self {
            inner: InMemoryIndex::with_items(2, items).unwrap(),
            calls: AtomicUsize::new(0),
            last_fetch_limit: Mutex::new(None),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_fetch_limit(&self) -> Option<usize> {
        *self.last_fetch_limit.lock().unwrap()
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn query(&self, query: IndexQuery<'_>) -> Result<Vec<ScoredCandidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_fetch_limit.lock().unwrap() = Some(query.fetch_limit);
        self.inner.query(query).await
    }

    async fn point_vector(&self, id: &str) -> Result<Option<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.point_vector(id).await
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Never answers within any reasonable deadline
struct StalledIndex;

#[async_trait]
impl VectorIndex for StalledIndex {
    async fn query(&self, _query: IndexQuery<'_>) -> Result<Vec<ScoredCandidate>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    async fn point_vector(&self, _id: &str) -> Result<Option<Vec<f32>>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(None)
    }

    fn name(&self) -> &str {
        "stalled"
    }
}

/// Connection always refused
struct DownIndex;

#[async_trait]
impl VectorIndex for DownIndex {
    async fn query(&self, _query: IndexQuery<'_>) -> Result<Vec<ScoredCandidate>> {
        Err(ProximaError::backend("connection refused"))
    }

    async fn point_vector(&self, _id: &str) -> Result<Option<Vec<f32>>> {
        Err(ProximaError::backend("connection refused"))
    }

    fn name(&self) -> &str {
        "down"
    }
}

/// Item whose cosine similarity to the x-axis is `similarity`,
/// `km` north of the origin when given
fn item(id: &str, similarity: f32, km: Option<f64>, category: &str) -> Item {
    let mut payload = Payload::new();
    payload.insert("name".into(), json!(format!("Service {}", id)));
    payload.insert("category".into(), json!(category));
    payload.insert("vector".into(), json!([similarity]));
    if let Some(km) = km {
        payload.insert(
            "location".into(),
            json!({"lat": ORIGIN.0 + km / KM_PER_DEGREE_LAT, "lon": ORIGIN.1}),
        );
    }
    let y = (1.0 - similarity * similarity).max(0.0).sqrt();
    Item::new(id, vec![similarity, y], payload)
}

fn origin() -> Location {
    Location::new(ORIGIN.0, ORIGIN.1).unwrap()
}

fn engine_with(index: Arc<dyn VectorIndex>) -> RankingEngine {
    RankingEngine::new(RankingConfig::new(2), index, StubEmbedder::ok())
}

fn params(value: Value) -> FilterParams {
    value.as_object().cloned().unwrap_or_default()
}

fn ids(results: &[PublicResult]) -> Vec<&str> {
    results.iter().map(|r| r.id.as_str()).collect()
}

async fn search_scored(engine: &RankingEngine, options: SearchOptions) -> Result<Vec<PublicResult>> {
    engine
        .execute("mechanic near me", options.with_scores(true), &CancellationToken::new())
        .await
}

#[tokio::test]
async fn threshold_excludes_low_similarity() {
    let index = RecordingIndex::new(vec![
        item("a", 0.95, None, "mechanics"),
        item("b", 0.80, None, "mechanics"),
        item("c", 0.73, None, "towing"),
        item("d", 0.71, None, "towing"),
        item("e", 0.30, None, "fuel"),
    ]);
    let engine = engine_with(index);

    let results = search_scored(&engine, SearchOptions::new()).await.unwrap();
    assert_eq!(ids(&results), vec!["a", "b", "c"]);
    assert!(results.iter().all(|r| r.similarity.unwrap() >= 0.72));
}

#[tokio::test]
async fn threshold_is_inclusive() {
    let index = RecordingIndex::new(vec![item("exact", 1.0, None, "fuel")]);
    let engine = engine_with(index);

    let results = search_scored(&engine, SearchOptions::new().with_threshold(1.0))
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["exact"]);
}

#[tokio::test]
async fn location_orders_by_distance() {
    let index = RecordingIndex::new(vec![
        item("close", 0.90, Some(5.0), "mechanics"),
        item("far", 0.95, Some(50.0), "mechanics"),
    ]);
    let engine = engine_with(index);

    let results = search_scored(&engine, SearchOptions::new().with_location(origin()))
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["close", "far"]);
    let d = results[0].distance_km.unwrap();
    assert!((d - 5.0).abs() < 0.05, "distance was {}", d);
}

#[tokio::test]
async fn without_location_orders_by_similarity() {
    let index = RecordingIndex::new(vec![
        item("close", 0.90, Some(5.0), "mechanics"),
        item("far", 0.95, Some(50.0), "mechanics"),
    ]);
    let engine = engine_with(index);

    let results = search_scored(&engine, SearchOptions::new()).await.unwrap();
    assert_eq!(ids(&results), vec!["far", "close"]);
    assert!(results.iter().all(|r| r.distance_km.is_none()));
}

#[tokio::test]
async fn limit_returns_top_candidates() {
    let index = RecordingIndex::new(vec![
        item("a", 0.99, Some(40.0), "mechanics"),
        item("b", 0.95, Some(30.0), "mechanics"),
        item("c", 0.90, Some(20.0), "mechanics"),
        item("d", 0.85, Some(10.0), "mechanics"),
        item("e", 0.80, Some(1.0), "mechanics"),
    ]);
    let engine = engine_with(index.clone());

    let by_similarity = search_scored(&engine, SearchOptions::new().with_limit(2))
        .await
        .unwrap();
    assert_eq!(ids(&by_similarity), vec!["a", "b"]);
    assert_eq!(index.last_fetch_limit(), Some(2));

    let by_distance = search_scored(
        &engine,
        SearchOptions::new().with_limit(2).with_location(origin()),
    )
    .await
    .unwrap();
    assert_eq!(ids(&by_distance), vec!["e", "d"]);
}

#[tokio::test]
async fn category_filter_excludes_other_categories() {
    let index = RecordingIndex::new(vec![
        item("tow", 0.99, None, "towing"),
        item("mech-1", 0.80, None, "mechanics"),
        item("wash", 0.97, None, "carwash"),
        item("mech-2", 0.75, None, "mechanics"),
    ]);
    let engine = engine_with(index);

    let results = engine
        .search("mechanic", &params(json!({"category": "mechanics"})), None, None)
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["mech-1", "mech-2"]);
    assert!(results.iter().all(|r| r.payload["category"] == "mechanics"));
}

#[tokio::test]
async fn projection_never_exposes_vectors() {
    let index = RecordingIndex::new(vec![
        item("a", 0.95, Some(2.0), "mechanics"),
        item("b", 0.85, None, "mechanics"),
    ]);
    let engine = engine_with(index);

    let results = search_scored(&engine, SearchOptions::new().with_location(origin()))
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    for result in &results {
        let json = serde_json::to_value(result).unwrap();
        assert!(json.get("vector").is_none());
        assert!(json["payload"].get("vector").is_none());
    }
    // Unknown distance is not serialized as a number
    assert_eq!(results[1].distance_km, None);
}

#[tokio::test]
async fn end_to_end_scenario() {
    let index = RecordingIndex::new(vec![
        item("A", 0.8, Some(1.0), "mechanics"),
        item("B", 0.9, Some(100.0), "mechanics"),
        item("C", 0.5, Some(2.0), "mechanics"),
    ]);
    let engine = engine_with(index);

    let results = engine
        .search("mechanic", &FilterParams::new(), Some(2), Some(origin()))
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["A", "B"]);
}

#[tokio::test]
async fn over_fetch_lets_close_item_win() {
    // Ten strong matches far away, one weaker match next door
    let mut items: Vec<Item> = (0..10)
        .map(|i| item(&format!("far-{}", i), 0.99 - i as f32 * 0.01, Some(200.0 + i as f64), "fuel"))
        .collect();
    items.push(item("next-door", 0.75, Some(0.5), "fuel"));
    let index = RecordingIndex::new(items);
    let engine = engine_with(index.clone());

    let results = search_scored(
        &engine,
        SearchOptions::new().with_limit(1).with_location(origin()),
    )
    .await
    .unwrap();
    assert_eq!(ids(&results), vec!["next-door"]);
    assert_eq!(index.last_fetch_limit(), Some(30));
}

#[tokio::test]
async fn radius_drops_far_candidates() {
    let index = RecordingIndex::new(vec![
        item("near", 0.80, Some(3.0), "fuel"),
        item("far", 0.95, Some(80.0), "fuel"),
        item("nowhere", 0.90, None, "fuel"),
    ]);
    let engine = engine_with(index);

    let results = search_scored(
        &engine,
        SearchOptions::new().with_location(origin()).with_radius_km(10.0),
    )
    .await
    .unwrap();
    assert_eq!(ids(&results), vec!["near", "nowhere"]);
}

#[tokio::test]
async fn rank_with_precomputed_vector() {
    let index = RecordingIndex::new(vec![
        item("a", 0.9, None, "fuel"),
        item("b", 0.9, None, "fuel"),
        item("c", 0.95, None, "fuel"),
    ]);
    let engine = engine_with(index);

    let request = SearchRequest::new(vec![1.0, 0.0], 3);
    let ranked = engine.rank(&request, &CancellationToken::new()).await.unwrap();
    let ranked_ids: Vec<_> = ranked.iter().map(|c| c.id()).collect();
    // Equal similarity falls back to id order
    assert_eq!(ranked_ids, vec!["c", "a", "b"]);
    assert_eq!(ranked[0].item.vector.len(), 2);
}

#[tokio::test]
async fn validation_errors_skip_the_backend() {
    let index = RecordingIndex::new(vec![item("a", 0.9, None, "fuel")]);
    let engine = engine_with(index.clone());
    let cancel = CancellationToken::new();

    let err = engine
        .rank(&SearchRequest::new(vec![1.0, 0.0, 0.0], 5), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ProximaError::DimensionMismatch { expected: 2, actual: 3 }));

    let err = engine
        .search("fuel", &params(json!({"minPrice": "cheap"})), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProximaError::InvalidFilter(_)));

    let err = engine
        .search("fuel", &FilterParams::new(), Some(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProximaError::InvalidInput(_)));

    let err = engine
        .rank(&SearchRequest::new(vec![1.0, 0.0], 5).with_threshold(-2.0), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ProximaError::InvalidInput(_)));

    assert_eq!(index.calls(), 0);
}

#[tokio::test]
async fn embedding_failure_is_terminal() {
    let index = RecordingIndex::new(vec![item("a", 0.9, None, "fuel")]);
    let engine = RankingEngine::new(
        RankingConfig::new(2),
        index.clone(),
        Arc::new(StubEmbedder { fail: true, dimension: 2 }),
    );

    let err = engine
        .search("fuel", &FilterParams::new(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProximaError::EmbeddingUnavailable(_)));
    assert_eq!(index.calls(), 0);
}

#[tokio::test]
async fn embedding_with_wrong_dimension_is_rejected() {
    let index = RecordingIndex::new(vec![item("a", 0.9, None, "fuel")]);
    let engine = RankingEngine::new(
        RankingConfig::new(2),
        index.clone(),
        Arc::new(StubEmbedder { fail: false, dimension: 3 }),
    );

    let err = engine
        .search("fuel", &FilterParams::new(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProximaError::DimensionMismatch { expected: 2, actual: 3 }));
    assert_eq!(index.calls(), 0);
}

#[tokio::test]
async fn backend_failure_is_not_an_empty_result() {
    let engine = engine_with(Arc::new(DownIndex));
    let err = engine
        .search("fuel", &FilterParams::new(), None, None)
        .await
        .unwrap_err();
    assert!(err.is_backend_unavailable());
}

#[tokio::test]
async fn stalled_backend_times_out() {
    let mut config = RankingConfig::new(2);
    config.query_timeout = Duration::from_millis(50);
    let engine = RankingEngine::new(config, Arc::new(StalledIndex), StubEmbedder::ok());

    let started = Instant::now();
    let err = engine
        .search("fuel", &FilterParams::new(), None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ProximaError::Timeout(d) if d == Duration::from_millis(50)));
    assert!(err.is_backend_unavailable());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn cancellation_returns_promptly() {
    let engine = Arc::new(engine_with(Arc::new(StalledIndex)));
    let cancel = CancellationToken::new();

    let task = {
        let engine = engine.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            engine
                .execute("fuel", SearchOptions::new(), &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    let started = Instant::now();
    cancel.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, ProximaError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn cancelled_token_never_reaches_backend() {
    let index = RecordingIndex::new(vec![item("a", 0.9, None, "fuel")]);
    let engine = engine_with(index.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = engine
        .rank(&SearchRequest::new(vec![1.0, 0.0], 5), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ProximaError::Cancelled));
    assert_eq!(index.calls(), 0);
}

#[tokio::test]
async fn similar_to_excludes_the_source_item() {
    let index = RecordingIndex::new(vec![
        item("src", 1.0, None, "mechanics"),
        item("twin", 0.99, None, "mechanics"),
        item("cousin", 0.85, None, "mechanics"),
        item("stranger", 0.10, None, "mechanics"),
    ]);
    let engine = engine_with(index);
    let cancel = CancellationToken::new();

    let results = engine
        .similar_to("src", SearchOptions::new().with_limit(2), &cancel)
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["twin", "cousin"]);

    let err = engine
        .similar_to("ghost", SearchOptions::new(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ProximaError::NotFound(_)));
}

#[tokio::test]
async fn similar_to_rejects_unbounded_limit() {
    let index = RecordingIndex::new(vec![
        item("src", 1.0, None, "mechanics"),
        item("twin", 0.99, None, "mechanics"),
    ]);
    let engine = engine_with(index.clone());

    let err = engine
        .similar_to("src", SearchOptions::new().with_limit(usize::MAX), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProximaError::InvalidInput(_)), "got {:?}", err);
    assert_eq!(index.calls(), 0);
}

#[tokio::test]
async fn similar_to_pages_after_excluding_the_source() {
    let index = RecordingIndex::new(vec![
        item("src", 1.0, None, "mechanics"),
        item("twin", 0.99, None, "mechanics"),
        item("cousin", 0.85, None, "mechanics"),
        item("neighbour", 0.80, None, "mechanics"),
    ]);
    let engine = engine_with(index);

    let results = engine
        .similar_to(
            "src",
            SearchOptions::new().with_limit(2).with_offset(1),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(ids(&results), vec!["cousin", "neighbour"]);
}

#[tokio::test]
async fn offset_pages_through_the_ranked_order() {
    let index = RecordingIndex::new(vec![
        item("a", 0.99, Some(40.0), "mechanics"),
        item("b", 0.95, Some(30.0), "mechanics"),
        item("c", 0.90, Some(20.0), "mechanics"),
        item("d", 0.85, Some(10.0), "mechanics"),
        item("e", 0.80, Some(1.0), "mechanics"),
    ]);
    let engine = engine_with(index.clone());

    let second = search_scored(&engine, SearchOptions::new().with_limit(2).with_offset(2))
        .await
        .unwrap();
    assert_eq!(ids(&second), vec!["c", "d"]);
    assert_eq!(index.last_fetch_limit(), Some(4));

    // Pages are cut after the distance ordering, not before it
    let geo = SearchOptions::new().with_limit(2).with_location(origin());
    let second = search_scored(&engine, geo.clone().with_offset(2)).await.unwrap();
    assert_eq!(ids(&second), vec!["c", "b"]);
    assert_eq!(index.last_fetch_limit(), Some(30));

    let last = search_scored(&engine, geo.clone().with_offset(4)).await.unwrap();
    assert_eq!(ids(&last), vec!["a"]);

    let past_end = search_scored(&engine, geo.with_offset(10)).await.unwrap();
    assert!(past_end.is_empty());
}

#[tokio::test]
async fn page_bounds_skip_the_backend() {
    let index = RecordingIndex::new(vec![item("a", 0.99, None, "mechanics")]);
    let engine = engine_with(index.clone());

    for options in [
        SearchOptions::new().with_limit(101),
        SearchOptions::new().with_limit(100).with_offset(401),
        SearchOptions::new().with_offset(usize::MAX),
    ] {
        let err = search_scored(&engine, options).await.unwrap_err();
        assert!(matches!(err, ProximaError::InvalidInput(_)), "got {:?}", err);
    }
    assert_eq!(index.calls(), 0);

    let ok = search_scored(&engine, SearchOptions::new().with_limit(100)).await.unwrap();
    assert_eq!(ids(&ok), vec!["a"]);
}

#[tokio::test]
async fn concurrent_searches_are_independent() {
    let index = RecordingIndex::new(vec![
        item("a", 0.95, Some(30.0), "mechanics"),
        item("b", 0.85, Some(3.0), "mechanics"),
        item("c", 0.80, Some(10.0), "towing"),
    ]);
    let engine = Arc::new(engine_with(index.clone()));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let location = if i % 2 == 0 { Some(origin()) } else { None };
                engine
                    .search("mechanic", &FilterParams::new(), None, location)
                    .await
                    .map(|results| (i, results))
            })
        })
        .collect();

    for handle in handles {
        let (i, results) = handle.await.unwrap().unwrap();
        let expected = if i % 2 == 0 {
            vec!["b", "c", "a"]
        } else {
            vec!["a", "b", "c"]
        };
        assert_eq!(ids(&results), expected);
    }
    assert_eq!(index.calls(), 8);
}
