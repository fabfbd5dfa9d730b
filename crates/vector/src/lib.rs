//! Proxima similarity search and ranking
//!
//! Query embedding, filtered index retrieval, score thresholding,
//! optional geo re-ranking and result projection.

pub mod distance;
pub mod engine;
pub mod filter;
pub mod index;
pub mod memory;
pub mod projection;
pub mod qdrant;
pub mod types;

pub use distance::{cosine_similarity, haversine_km, EARTH_RADIUS_KM};
pub use engine::{RankingConfig, RankingEngine, SearchOptions};
pub use filter::{Filter, FilterBuilder, FilterParams, MatchPredicate, MatchValue, Predicate, RangePredicate};
pub use index::{IndexQuery, VectorIndex};
pub use memory::InMemoryIndex;
pub use projection::{FieldSelection, Projection};
pub use qdrant::QdrantIndex;
pub use types::{
    Item, Location, Payload, PublicResult, ScoredCandidate, SearchRequest, DEFAULT_SCORE_THRESHOLD,
};

// Re-export so callers can cancel searches without naming tokio-util
pub use tokio_util::sync::CancellationToken;
