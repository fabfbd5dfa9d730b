use proxima_common::AppConfig;

use crate::types::{Payload, PublicResult, ScoredCandidate};

/// Payload keys that may carry raw embeddings; never exposed
pub const RESERVED_FIELDS: &[&str] = &["vector", "vectors", "embedding"];

/// Which payload fields reach the caller
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldSelection {
    #[default]
    All,
    Only(Vec<String>),
}

/// Maps scored candidates to public records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub fields: FieldSelection,

    /// Expose `similarity` and `distance_km`
    pub include_scores: bool,
}

impl Projection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: FieldSelection::Only(fields.into_iter().map(Into::into).collect()),
            include_scores: false,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        if config.public_fields.is_empty() {
            Self::all()
        } else {
            Self::only(config.public_fields.iter().cloned())
        }
    }

    pub fn with_scores(mut self, include_scores: bool) -> Self {
        self.include_scores = include_scores;
        self
    }

    pub fn project(&self, candidates: Vec<ScoredCandidate>) -> Vec<PublicResult> {
        candidates.into_iter().map(|c| self.project_one(c)).collect()
    }

    pub fn project_one(&self, candidate: ScoredCandidate) -> PublicResult {
        let ScoredCandidate {
            item,
            similarity,
            distance_km,
        } = candidate;

        let payload: Payload = item
            .payload
            .into_iter()
            .filter(|(key, _)| !RESERVED_FIELDS.contains(&key.as_str()))
            .filter(|(key, _)| match &self.fields {
                FieldSelection::All => true,
                FieldSelection::Only(fields) => fields.iter().any(|f| f == key),
            })
            .collect();

        let (similarity, distance_km) = if self.include_scores {
            // Unknown distance is INFINITY internally
            (Some(similarity), distance_km.filter(|d| d.is_finite()))
        } else {
            (None, None)
        };

        PublicResult {
            id: item.id,
            payload,
            similarity,
            distance_km,
        }
    }
}
