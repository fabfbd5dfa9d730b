use async_trait::async_trait;
use proxima_common::Result;

use crate::filter::Filter;
use crate::types::ScoredCandidate;

/// Parameters of a single similarity query
#[derive(Debug, Clone, Copy)]
pub struct IndexQuery<'a> {
    pub vector: &'a [f32],
    pub filter: &'a Filter,

    /// Inclusive lower bound on similarity
    pub score_threshold: f32,

    /// Maximum number of candidates to return
    pub fetch_limit: usize,
}

/// Approximate-nearest-neighbour store holding the searchable items
///
/// `query` returns candidates sorted by similarity (descending), all at or
/// above `score_threshold`, at most `fetch_limit` of them. Transport
/// failures are reported as `BackendUnavailable` and never retried here.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn query(&self, query: IndexQuery<'_>) -> Result<Vec<ScoredCandidate>>;

    /// Stored vector of an item, `None` when the item does not exist
    async fn point_vector(&self, id: &str) -> Result<Option<Vec<f32>>>;

    /// Short backend name for logs
    fn name(&self) -> &str;
}

/// Sort by similarity descending, then id ascending
pub(crate) fn sort_by_similarity(candidates: &mut [ScoredCandidate]) {
    candidates.sort_by(|a, b| {
        b.similarity
            .total_cmp(&a.similarity)
            .then_with(|| a.item.id.cmp(&b.item.id))
    });
}
