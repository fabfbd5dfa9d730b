use std::collections::HashMap;

use async_trait::async_trait;
use proxima_common::{ProximaError, Result};
use tokio::sync::RwLock;
use tracing::debug;

use crate::distance::cosine_similarity;
use crate::index::{sort_by_similarity, IndexQuery, VectorIndex};
use crate::types::{Item, ScoredCandidate};

/// Brute-force index kept in memory
///
/// Scores every stored item against the query. Suited to tests, demos and
/// collections small enough that a linear scan is acceptable.
pub struct InMemoryIndex {
    dimension: usize,
    items: RwLock<HashMap<String, Item>>,
}

impl InMemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            items: RwLock::new(HashMap::new()),
        }
    }

    /// Create an index pre-populated with `items`
    pub fn with_items(dimension: usize, items: impl IntoIterator<Item = Item>) -> Result<Self> {
        let mut map = HashMap::new();
        for item in items {
            Self::check_dimension(dimension, &item.vector)?;
            map.insert(item.id.clone(), item);
        }
        Ok(Self {
            dimension,
            items: RwLock::new(map),
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Insert or replace an item
    pub async fn upsert(&self, item: Item) -> Result<()> {
        Self::check_dimension(self.dimension, &item.vector)?;
        self.items.write().await.insert(item.id.clone(), item);
        Ok(())
    }

    /// Remove an item, returning whether it existed
    pub async fn remove(&self, id: &str) -> bool {
        self.items.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }

    fn check_dimension(dimension: usize, vector: &[f32]) -> Result<()> {
        if vector.len() != dimension {
            return Err(ProximaError::dimension_mismatch(dimension, vector.len()));
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn query(&self, query: IndexQuery<'_>) -> Result<Vec<ScoredCandidate>> {
        Self::check_dimension(self.dimension, query.vector)?;

        let items = self.items.read().await;
        let mut candidates = Vec::new();
        for item in items.values() {
            if !query.filter.matches(&item.payload) {
                continue;
            }
            let similarity = cosine_similarity(query.vector, &item.vector)?;
            if similarity >= query.score_threshold {
                candidates.push(ScoredCandidate::new(item.clone(), similarity));
            }
        }
        let total = items.len();
        drop(items);

        sort_by_similarity(&mut candidates);
        candidates.truncate(query.fetch_limit);

        debug!(
            "In-memory query returned {} candidates (scanned {})",
            candidates.len(),
            total
        );
        Ok(candidates)
    }

    async fn point_vector(&self, id: &str) -> Result<Option<Vec<f32>>> {
        Ok(self.items.read().await.get(id).map(|item| item.vector.clone()))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
