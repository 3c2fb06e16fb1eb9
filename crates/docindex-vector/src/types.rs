//! Caller-facing types for the vector index contract.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::VectorError;

/// Open metadata mapping stored alongside each vector.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Metadata key promoted into the backend's searchable text field.
pub const TEXT_KEY: &str = "text";

/// Distance metric an index is configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cosine => "cosine",
            Metric::Euclidean => "euclidean",
            Metric::DotProduct => "dot_product",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = VectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            "dotproduct" | "dot" => Ok(Metric::DotProduct),
            other => Err(VectorError::UnsupportedMetric(other.to_string())),
        }
    }
}

/// Abstract description of an index to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: usize,
    #[serde(default)]
    pub metric: Metric,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, dimension: usize, metric: Metric) -> Self {
        Self {
            name: name.into(),
            dimension,
            metric,
        }
    }

    /// Reject specs the backend would refuse.
    pub fn validate(&self) -> Result<(), VectorError> {
        if self.name.trim().is_empty() {
            return Err(VectorError::InvalidArgument(
                "index name must not be empty".to_string(),
            ));
        }
        if self.dimension == 0 {
            return Err(VectorError::InvalidArgument(
                "index dimension must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Live statistics for an index. Never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub dimension: usize,
    pub count: u64,
    pub metric: Metric,
}

/// A single nearest-neighbor hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub id: String,
    /// Backend score, higher is more similar
    pub score: f64,
    pub metadata: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
}

/// Vectors to write, with optional per-position metadata and ids.
#[derive(Debug, Clone, Default)]
pub struct UpsertRequest {
    pub vectors: Vec<Vec<f32>>,
    /// Metadata for the vector at the same position
    pub metadata: Option<Vec<Metadata>>,
    /// Explicit ids; positions without one get a generated id
    pub ids: Option<Vec<Option<String>>>,
    /// Records matching this filter are deleted before the write
    pub delete_filter: Option<String>,
    /// Batches are not started after this instant
    pub deadline: Option<Instant>,
}

impl UpsertRequest {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self {
            vectors,
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: Vec<Metadata>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = Some(ids.into_iter().map(|id| Some(id.into())).collect());
        self
    }

    /// Set ids where some positions should still get a generated id.
    pub fn with_partial_ids(mut self, ids: Vec<Option<String>>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn replacing(mut self, filter: impl Into<String>) -> Self {
        self.delete_filter = Some(filter.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Nearest-neighbor query parameters.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub vector: Vec<f32>,
    pub top_k: usize,
    pub filter: Option<String>,
    pub include_vector: bool,
}

impl QueryRequest {
    pub fn new(vector: Vec<f32>) -> Self {
        Self {
            vector,
            top_k: 10,
            filter: None,
            include_vector: false,
        }
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn include_vector(mut self, include: bool) -> Self {
        self.include_vector = include;
        self
    }
}

/// Field delta applied by an update. Absent fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct VectorUpdate {
    pub vector: Option<Vec<f32>>,
    pub metadata: Option<Metadata>,
}

impl VectorUpdate {
    pub fn vector(vector: Vec<f32>) -> Self {
        Self {
            vector: Some(vector),
            metadata: None,
        }
    }

    pub fn metadata(metadata: Metadata) -> Self {
        Self {
            vector: None,
            metadata: Some(metadata),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_none() && self.metadata.is_none()
    }
}

/// Target of a single-record mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    ById(String),
    ByFilter(String),
}

impl Selector {
    /// Build from the two mutually exclusive optional inputs.
    pub fn from_parts(id: Option<String>, filter: Option<String>) -> Result<Self, VectorError> {
        match (id, filter) {
            (Some(id), None) => Ok(Selector::ById(id)),
            (None, Some(filter)) => Ok(Selector::ByFilter(filter)),
            (Some(_), Some(_)) => Err(VectorError::InvalidArgument(
                "specify either an id or a filter, not both".to_string(),
            )),
            (None, None) => Err(VectorError::InvalidArgument(
                "an id or a filter is required".to_string(),
            )),
        }
    }
}

/// Target of a bulk deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkSelector {
    Ids(Vec<String>),
    Filter(String),
}

impl BulkSelector {
    /// Build from the two mutually exclusive optional inputs.
    pub fn from_parts(
        ids: Option<Vec<String>>,
        filter: Option<String>,
    ) -> Result<Self, VectorError> {
        match (ids, filter) {
            (Some(ids), None) => Ok(BulkSelector::Ids(ids)),
            (None, Some(filter)) => Ok(BulkSelector::Filter(filter)),
            (Some(_), Some(_)) => Err(VectorError::InvalidArgument(
                "specify either ids or a filter, not both".to_string(),
            )),
            (None, None) => Err(VectorError::InvalidArgument(
                "ids or a filter is required".to_string(),
            )),
        }
    }
}
