//! Translation between [`IndexSpec`] and the backend index definition.
//!
//! Every index carries the same four fields:
//! - `id`: key, filterable string
//! - `vector`: single-precision collection bound to the HNSW profile
//! - `metadata`: opaque JSON string, neither searchable nor filterable
//! - `text`: full-text searchable string
//!
//! HNSW parameters are fixed and favour recall over latency:
//! - m = 4
//! - efConstruction = 400
//! - efSearch = 500

use serde::{Deserialize, Serialize};

use crate::types::{IndexSpec, Metric};

pub const ID_FIELD: &str = "id";
pub const VECTOR_FIELD: &str = "vector";
pub const METADATA_FIELD: &str = "metadata";
pub const TEXT_FIELD: &str = "text";

pub const ALGORITHM_NAME: &str = "vector-config";
pub const PROFILE_NAME: &str = "vector-profile";

pub const HNSW_M: u32 = 4;
pub const HNSW_EF_CONSTRUCTION: u32 = 400;
pub const HNSW_EF_SEARCH: u32 = 500;

/// Backend index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchIndex {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<SearchField>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search: Option<VectorSearch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searchable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filterable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search_profile: Option<String>,
}

impl SearchField {
    fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: name.to_string(),
            field_type: field_type.to_string(),
            key: None,
            searchable: None,
            filterable: None,
            dimensions: None,
            vector_search_profile: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearch {
    #[serde(default)]
    pub algorithms: Vec<VectorSearchAlgorithm>,
    #[serde(default)]
    pub profiles: Vec<VectorSearchProfile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchAlgorithm {
    pub name: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hnsw_parameters: Option<HnswParameters>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HnswParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_construction: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_search: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearchProfile {
    pub name: String,
    pub algorithm: String,
}

/// Dimension and metric recovered from a backend definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaSummary {
    pub dimension: usize,
    pub metric: Metric,
}

/// Backend spelling of a metric.
pub fn metric_to_backend(metric: Metric) -> &'static str {
    match metric {
        Metric::Cosine => "cosine",
        Metric::Euclidean => "euclidean",
        Metric::DotProduct => "dotProduct",
    }
}

/// Parse a backend metric name; `None` if unrecognized.
pub fn metric_from_backend(name: &str) -> Option<Metric> {
    match name {
        "cosine" => Some(Metric::Cosine),
        "euclidean" => Some(Metric::Euclidean),
        "dotProduct" => Some(Metric::DotProduct),
        _ => None,
    }
}

/// Build the backend definition for an index spec.
pub fn to_backend_schema(spec: &IndexSpec) -> SearchIndex {
    let mut id = SearchField::new(ID_FIELD, "Edm.String");
    id.key = Some(true);
    id.filterable = Some(true);

    let mut vector = SearchField::new(VECTOR_FIELD, "Collection(Edm.Single)");
    vector.searchable = Some(true);
    vector.dimensions = Some(spec.dimension);
    vector.vector_search_profile = Some(PROFILE_NAME.to_string());

    let mut metadata = SearchField::new(METADATA_FIELD, "Edm.String");
    metadata.searchable = Some(false);
    metadata.filterable = Some(false);

    let mut text = SearchField::new(TEXT_FIELD, "Edm.String");
    text.searchable = Some(true);

    SearchIndex {
        name: spec.name.clone(),
        fields: vec![id, vector, metadata, text],
        vector_search: Some(VectorSearch {
            algorithms: vec![VectorSearchAlgorithm {
                name: ALGORITHM_NAME.to_string(),
                kind: "hnsw".to_string(),
                hnsw_parameters: Some(HnswParameters {
                    m: Some(HNSW_M),
                    ef_construction: Some(HNSW_EF_CONSTRUCTION),
                    ef_search: Some(HNSW_EF_SEARCH),
                    metric: Some(metric_to_backend(spec.metric).to_string()),
                }),
            }],
            profiles: vec![VectorSearchProfile {
                name: PROFILE_NAME.to_string(),
                algorithm: ALGORITHM_NAME.to_string(),
            }],
        }),
    }
}

/// Recover dimension and metric from a backend definition.
///
/// Dimension comes from the `vector` field (0 if absent). The metric is read
/// from the first algorithm and falls back to cosine.
pub fn from_backend_schema(index: &SearchIndex) -> SchemaSummary {
    let dimension = index
        .fields
        .iter()
        .find(|f| f.name == VECTOR_FIELD)
        .and_then(|f| f.dimensions)
        .unwrap_or(0);

    let metric = index
        .vector_search
        .as_ref()
        .and_then(|vs| vs.algorithms.first())
        .and_then(|alg| alg.hnsw_parameters.as_ref())
        .and_then(|params| params.metric.as_deref())
        .and_then(metric_from_backend)
        .unwrap_or(Metric::Cosine);

    SchemaSummary { dimension, metric }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_fields() {
        let schema = to_backend_schema(&IndexSpec::new("docs", 1536, Metric::Euclidean));
        assert_eq!(schema.name, "docs");

        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "vector", "metadata", "text"]);

        let id = &schema.fields[0];
        assert_eq!(id.key, Some(true));
        assert_eq!(id.filterable, Some(true));

        let vector = &schema.fields[1];
        assert_eq!(vector.dimensions, Some(1536));
        assert_eq!(vector.vector_search_profile.as_deref(), Some(PROFILE_NAME));

        let metadata = &schema.fields[2];
        assert_eq!(metadata.searchable, Some(false));
        assert_eq!(metadata.filterable, Some(false));
    }

    #[test]
    fn test_profile_binds_algorithm() {
        let schema = to_backend_schema(&IndexSpec::new("docs", 3, Metric::Cosine));
        let vs = schema.vector_search.unwrap();
        assert_eq!(vs.profiles[0].algorithm, vs.algorithms[0].name);
        assert_eq!(vs.algorithms[0].kind, "hnsw");
        let params = vs.algorithms[0].hnsw_parameters.as_ref().unwrap();
        assert_eq!(params.ef_construction, Some(400));
        assert_eq!(params.ef_search, Some(500));
    }

    #[test]
    fn test_round_trip_all_metrics() {
        for metric in [Metric::Cosine, Metric::Euclidean, Metric::DotProduct] {
            let spec = IndexSpec::new("docs", 8, metric);
            let summary = from_backend_schema(&to_backend_schema(&spec));
            assert_eq!(summary.dimension, 8);
            assert_eq!(summary.metric, metric);
        }
    }

    #[test]
    fn test_unknown_metric_defaults_to_cosine() {
        let mut schema = to_backend_schema(&IndexSpec::new("docs", 8, Metric::DotProduct));
        if let Some(vs) = schema.vector_search.as_mut() {
            vs.algorithms[0].hnsw_parameters.as_mut().unwrap().metric =
                Some("hamming".to_string());
        }
        assert_eq!(from_backend_schema(&schema).metric, Metric::Cosine);

        schema.vector_search = None;
        assert_eq!(from_backend_schema(&schema).metric, Metric::Cosine);
    }

    #[test]
    fn test_serialized_shape() {
        let schema = to_backend_schema(&IndexSpec::new("docs", 3, Metric::DotProduct));
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["fields"][1]["type"], "Collection(Edm.Single)");
        assert_eq!(json["fields"][1]["vectorSearchProfile"], PROFILE_NAME);
        assert_eq!(
            json["vectorSearch"]["algorithms"][0]["hnswParameters"]["metric"],
            "dotProduct"
        );
        assert!(json["fields"][0].get("dimensions").is_none());
    }

    #[test]
    fn test_deserialize_backend_response() {
        let body = r#"{
            "name": "docs",
            "@odata.etag": "\"0x1\"",
            "fields": [
                {"name": "id", "type": "Edm.String", "key": true, "filterable": true},
                {"name": "vector", "type": "Collection(Edm.Single)", "dimensions": 4,
                 "vectorSearchProfile": "vector-profile", "retrievable": true}
            ],
            "vectorSearch": {
                "algorithms": [{"name": "vector-config", "kind": "hnsw",
                                "hnswParameters": {"m": 4, "metric": "euclidean"}}],
                "profiles": [{"name": "vector-profile", "algorithm": "vector-config"}]
            }
        }"#;
        let schema: SearchIndex = serde_json::from_str(body).unwrap();
        let summary = from_backend_schema(&schema);
        assert_eq!(summary.dimension, 4);
        assert_eq!(summary.metric, Metric::Euclidean);
    }
}
