//! Filter normalization and evaluation.
//!
//! A caller hands in a loose JSON object (`minPrice`, `category`, ...). The
//! [`FilterBuilder`] turns the keys it knows into a conjunctive set of
//! [`Predicate`]s; everything else is ignored. The resulting [`Filter`] can be
//! evaluated locally or rendered as a Qdrant `must` clause.

use proxima_common::{ProximaError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::types::Payload;

/// Loose filter parameters as received from callers
pub type FilterParams = serde_json::Map<String, Value>;

/// Value of an exact-match predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchValue {
    Keyword(String),
    Integer(i64),
    Bool(bool),
}

impl MatchValue {
    fn to_json(&self) -> Value {
        match self {
            Self::Keyword(s) => json!(s),
            Self::Integer(i) => json!(i),
            Self::Bool(b) => json!(b),
        }
    }

    /// Arrays match when any element matches
    fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Array(values)) => values.iter().any(|v| self.matches(v)),
            (Self::Keyword(expected), Value::String(actual)) => expected == actual,
            (Self::Integer(expected), Value::Number(actual)) => {
                actual.as_i64() == Some(*expected)
                    || actual.as_f64().is_some_and(|f| f == *expected as f64)
            }
            (Self::Bool(expected), Value::Bool(actual)) => expected == actual,
            _ => false,
        }
    }
}

/// `field >= gte && field <= lte`, each bound optional
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangePredicate {
    pub field: String,
    pub gte: Option<f64>,
    pub lte: Option<f64>,
}

/// `field == value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPredicate {
    pub field: String,
    pub value: MatchValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Range(RangePredicate),
    Match(MatchPredicate),
}

impl Predicate {
    pub fn field(&self) -> &str {
        match self {
            Self::Range(r) => &r.field,
            Self::Match(m) => &m.field,
        }
    }

    /// Missing payload fields never match
    pub fn matches(&self, payload: &Payload) -> bool {
        let Some(value) = payload.get(self.field()) else {
            return false;
        };

        match self {
            Self::Range(range) => match value.as_f64() {
                Some(v) => {
                    range.gte.map_or(true, |gte| v >= gte) && range.lte.map_or(true, |lte| v <= lte)
                }
                None => false,
            },
            Self::Match(m) => m.value.matches(value),
        }
    }

    /// Qdrant field condition
    pub fn to_qdrant(&self) -> Value {
        match self {
            Self::Range(range) => {
                let mut bounds = serde_json::Map::new();
                if let Some(gte) = range.gte {
                    bounds.insert("gte".to_string(), json!(gte));
                }
                if let Some(lte) = range.lte {
                    bounds.insert("lte".to_string(), json!(lte));
                }
                json!({ "key": range.field, "range": bounds })
            }
            Self::Match(m) => json!({ "key": m.field, "match": { "value": m.value.to_json() } }),
        }
    }
}

/// Conjunction of predicates; empty matches everything
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn matches(&self, payload: &Payload) -> bool {
        self.predicates.iter().all(|p| p.matches(payload))
    }

    /// `{"must": [...]}`, or `None` when there is nothing to filter on
    pub fn to_qdrant(&self) -> Option<Value> {
        if self.is_empty() {
            return None;
        }
        let must: Vec<Value> = self.predicates.iter().map(Predicate::to_qdrant).collect();
        Some(json!({ "must": must }))
    }
}

#[derive(Debug, Clone)]
struct RangeField {
    field: String,
    min_key: String,
    max_key: String,
}

/// Builds a [`Filter`] from loose parameters
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    ranges: Vec<RangeField>,
    matches: Vec<String>,
}

impl Default for FilterBuilder {
    /// `minPrice`/`maxPrice` → `price`, `minRating`/`maxRating` → `rating`,
    /// exact matches on `category` and `type`
    fn default() -> Self {
        Self::empty()
            .with_range_field("price", "minPrice", "maxPrice")
            .with_range_field("rating", "minRating", "maxRating")
            .with_match_field("category")
            .with_match_field("type")
    }
}

impl FilterBuilder {
    /// Builder that recognizes no keys
    pub fn empty() -> Self {
        Self {
            ranges: Vec::new(),
            matches: Vec::new(),
        }
    }

    /// Declare a range over payload `field` read from two parameter keys
    pub fn with_range_field(
        mut self,
        field: impl Into<String>,
        min_key: impl Into<String>,
        max_key: impl Into<String>,
    ) -> Self {
        self.ranges.push(RangeField {
            field: field.into(),
            min_key: min_key.into(),
            max_key: max_key.into(),
        });
        self
    }

    /// Declare an exact-match parameter; the key is also the payload field
    pub fn with_match_field(mut self, field: impl Into<String>) -> Self {
        self.matches.push(field.into());
        self
    }

    pub fn build(&self, params: &FilterParams) -> Result<Filter> {
        let mut filter = Filter::new();

        for range in &self.ranges {
            let gte = parse_bound(params, &range.min_key)?;
            let lte = parse_bound(params, &range.max_key)?;

            if let (Some(min), Some(max)) = (gte, lte) {
                if min > max {
                    return Err(ProximaError::invalid_filter(format!(
                        "{} ({}) is greater than {} ({})",
                        range.min_key, min, range.max_key, max
                    )));
                }
            }

            if gte.is_some() || lte.is_some() {
                filter = filter.with(Predicate::Range(RangePredicate {
                    field: range.field.clone(),
                    gte,
                    lte,
                }));
            }
        }

        for field in &self.matches {
            if let Some(value) = parse_match(params, field)? {
                filter = filter.with(Predicate::Match(MatchPredicate {
                    field: field.clone(),
                    value,
                }));
            }
        }

        Ok(filter)
    }
}

/// Numbers and numeric strings; `null` and blank strings are absent
fn parse_bound(params: &FilterParams, key: &str) -> Result<Option<f64>> {
    let bound = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match bound {
        Some(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(ProximaError::invalid_filter(format!(
            "{} must be a finite number, got {}",
            key, params[key]
        ))),
    }
}

fn parse_match(params: &FilterParams, key: &str) -> Result<Option<MatchValue>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(MatchValue::Keyword(s.clone()))),
        Some(Value::Bool(b)) => Ok(Some(MatchValue::Bool(*b))),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(Some(MatchValue::Integer(i))),
            None => match n.as_f64() {
                Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                    Ok(Some(MatchValue::Integer(f as i64)))
                }
                _ => Err(ProximaError::invalid_filter(format!(
                    "{} must be a string, integer or bool, got {}",
                    key, n
                ))),
            },
        },
        Some(other) => Err(ProximaError::invalid_filter(format!(
            "{} must be a string, integer or bool, got {}",
            key, other
        ))),
    }
}
