//! Vector index adapter.
//!
//! Maps the generic vector-store contract onto a [`SearchService`]:
//! index lifecycle through the schema mapper, writes through the batch
//! uploader, filtered mutations through the filter mutator.
//!
//! `upsert` with a delete filter is two backend transactions (delete, then
//! upload) and is not atomic. A reader between the two sees neither the old
//! nor the new records.

use std::sync::Arc;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::backend::{IndexAction, SearchDocument, SearchHit, SearchService, VectorSearchRequest};
use crate::cache::{HandleCache, IndexHandle};
use crate::error::VectorError;
use crate::mutator::{FilterMutator, DEFAULT_FILTER_QUERY_CAP};
use crate::schema::{
    from_backend_schema, to_backend_schema, ID_FIELD, METADATA_FIELD, TEXT_FIELD, VECTOR_FIELD,
};
use crate::types::{
    BulkSelector, IndexSpec, IndexStats, Metadata, QueryRequest, QueryResult, Selector,
    UpsertRequest, VectorUpdate, TEXT_KEY,
};
use crate::uploader::{reconcile, BatchUploader, DEFAULT_BATCH_SIZE};

/// Adapter tuning.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Records per write batch
    pub batch_size: usize,
    /// Maximum ids resolved from one filter
    pub filter_query_cap: usize,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            filter_query_cap: DEFAULT_FILTER_QUERY_CAP,
        }
    }
}

impl AdapterConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_filter_query_cap(mut self, cap: usize) -> Self {
        self.filter_query_cap = cap;
        self
    }
}

/// Vector store facade over a search service.
pub struct VectorIndexAdapter {
    service: Arc<dyn SearchService>,
    handles: HandleCache,
    uploader: BatchUploader,
    mutator: FilterMutator,
}

impl VectorIndexAdapter {
    pub fn new(service: Arc<dyn SearchService>) -> Self {
        Self::with_config(service, AdapterConfig::default())
    }

    pub fn with_config(service: Arc<dyn SearchService>, config: AdapterConfig) -> Self {
        Self {
            service,
            handles: HandleCache::new(),
            uploader: BatchUploader::new(config.batch_size),
            mutator: FilterMutator::new(config.filter_query_cap),
        }
    }

    /// Handle cache owned by this adapter.
    pub fn handles(&self) -> &HandleCache {
        &self.handles
    }

    /// Create the index, replacing an existing one whose dimension or metric
    /// differs.
    pub async fn create_index(&self, spec: &IndexSpec) -> Result<(), VectorError> {
        spec.validate()?;
        let schema = to_backend_schema(spec);

        match self.service.get_index(&spec.name).await {
            Ok(existing) => {
                let current = from_backend_schema(&existing);
                if current.dimension != spec.dimension || current.metric != spec.metric {
                    info!(
                        index = %spec.name,
                        old_dimension = current.dimension,
                        old_metric = %current.metric,
                        "Replacing index with incompatible schema"
                    );
                    self.handles.invalidate(&spec.name);
                    self.service.delete_index(&spec.name).await?;
                }
            }
            Err(VectorError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        self.service.create_or_update_index(&schema).await?;
        self.handles.invalidate(&spec.name);
        info!(
            index = %spec.name,
            dimension = spec.dimension,
            metric = %spec.metric,
            "Index ready"
        );
        Ok(())
    }

    /// Lazily page through all index names.
    pub fn index_names(&self) -> BoxStream<'static, Result<String, VectorError>> {
        let service = Arc::clone(&self.service);
        stream::try_unfold(Some(None::<String>), move |state| {
            let service = Arc::clone(&service);
            async move {
                let Some(continuation) = state else {
                    return Ok::<_, VectorError>(None);
                };
                let page = service.list_index_names(continuation).await?;
                debug!(names = page.names.len(), more = page.next.is_some(), "Index page");
                let next = page.next.map(Some);
                Ok(Some((page.names, next)))
            }
        })
        .map_ok(|names| stream::iter(names.into_iter().map(Ok::<String, VectorError>)))
        .try_flatten()
        .boxed()
    }

    /// All index names, in listing order.
    pub async fn list_indexes(&self) -> Result<Vec<String>, VectorError> {
        self.index_names().try_collect().await
    }

    /// Live dimension, count and metric of an index.
    pub async fn describe_index(&self, name: &str) -> Result<IndexStats, VectorError> {
        let schema = self.service.get_index(name).await?;
        let summary = from_backend_schema(&schema);
        let handle = self.handles.replace(
            name,
            IndexHandle {
                client: self.service.document_client(name),
                dimension: summary.dimension,
                metric: summary.metric,
            },
        );
        let count = handle.client.count().await?;

        Ok(IndexStats {
            dimension: summary.dimension,
            count,
            metric: summary.metric,
        })
    }

    /// Delete an index and forget its handle. `NotFound` is not suppressed.
    pub async fn delete_index(&self, name: &str) -> Result<(), VectorError> {
        self.handles.invalidate(name);
        self.service.delete_index(name).await?;
        info!(index = %name, "Index deleted");
        Ok(())
    }

    /// Write vectors, returning their ids in input order.
    ///
    /// With a delete filter, matching records are removed first; if that
    /// delete fails nothing is written.
    pub async fn upsert(
        &self,
        name: &str,
        request: UpsertRequest,
    ) -> Result<Vec<String>, VectorError> {
        let UpsertRequest {
            vectors,
            metadata,
            ids,
            delete_filter,
            deadline,
        } = request;

        check_len("metadata", metadata.as_ref().map(Vec::len), vectors.len())?;
        check_len("ids", ids.as_ref().map(Vec::len), vectors.len())?;

        let handle = self.handle(name).await?;
        for (position, vector) in vectors.iter().enumerate() {
            check_dimension(&handle, position, vector)?;
        }

        if let Some(filter) = delete_filter.as_deref() {
            self.mutator
                .delete_matching(handle.client.as_ref(), filter, handle.dimension)
                .await?;
        }

        let mut metadata = metadata.map(Vec::into_iter);
        let mut ids = ids.map(Vec::into_iter);
        let mut actions = Vec::with_capacity(vectors.len());
        for vector in vectors {
            let id = ids
                .as_mut()
                .and_then(|ids| ids.next())
                .flatten()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| Ulid::new().to_string());
            let meta = metadata
                .as_mut()
                .and_then(|metadata| metadata.next())
                .unwrap_or_default();
            let (metadata_json, text) = encode_metadata(meta)?;

            actions.push(IndexAction::upload(SearchDocument {
                id,
                vector: Some(vector),
                metadata: Some(metadata_json),
                text: Some(text),
            }));
        }

        let count = actions.len();
        let confirmed = self
            .uploader
            .submit(handle.client.as_ref(), actions, deadline)
            .await?;
        info!(index = %name, count, "Upserted vectors");
        Ok(confirmed)
    }

    /// Nearest neighbors of a query vector.
    pub async fn query(
        &self,
        name: &str,
        request: &QueryRequest,
    ) -> Result<Vec<QueryResult>, VectorError> {
        if request.top_k == 0 {
            return Err(VectorError::InvalidArgument(
                "top_k must be positive".to_string(),
            ));
        }

        let handle = self.handle(name).await?;
        check_dimension(&handle, 0, &request.vector)?;

        let mut select = vec![ID_FIELD, METADATA_FIELD, TEXT_FIELD];
        if request.include_vector {
            select.push(VECTOR_FIELD);
        }

        let hits = handle
            .client
            .search(&VectorSearchRequest {
                vector: request.vector.clone(),
                k: request.top_k,
                filter: request.filter.clone(),
                select,
            })
            .await?;

        debug!(index = %name, hits = hits.len(), "Query complete");
        Ok(hits
            .into_iter()
            .map(|hit| to_query_result(hit, request.include_vector))
            .collect())
    }

    /// Merge a field delta into one record or every record matching a
    /// filter. Returns how many records were updated.
    pub async fn update_vector(
        &self,
        name: &str,
        selector: Selector,
        update: VectorUpdate,
    ) -> Result<usize, VectorError> {
        if update.is_empty() {
            return Err(VectorError::InvalidArgument(
                "update must set a vector or metadata".to_string(),
            ));
        }

        let handle = self.handle(name).await?;
        if let Some(vector) = &update.vector {
            check_dimension(&handle, 0, vector)?;
        }

        let mut delta = SearchDocument {
            vector: update.vector,
            ..Default::default()
        };
        if let Some(meta) = update.metadata {
            let (metadata_json, text) = encode_metadata(meta)?;
            delta.metadata = Some(metadata_json);
            delta.text = Some(text);
        }

        match selector {
            Selector::ById(id) => {
                delta.id = id.clone();
                let actions = vec![IndexAction::merge(delta)];
                let results = handle.client.index_documents(actions.clone()).await?;
                let (_, failures) = reconcile(&actions, results);
                if failures.is_empty() {
                    debug!(index = %name, id = %id, "Updated vector");
                    return Ok(1);
                }
                if failures.iter().any(|f| f.status == 404) {
                    return Err(VectorError::NotFound(format!(
                        "record {} in index {}",
                        id, name
                    )));
                }
                Err(VectorError::RecordsRejected { failures })
            }
            Selector::ByFilter(filter) => {
                self.mutator
                    .merge_matching(handle.client.as_ref(), &filter, handle.dimension, &delta)
                    .await
            }
        }
    }

    /// Delete one record by id.
    pub async fn delete_vector(&self, name: &str, id: &str) -> Result<(), VectorError> {
        let handle = self.handle(name).await?;
        let actions = vec![IndexAction::delete(id)];
        let results = handle.client.index_documents(actions.clone()).await?;
        let (_, failures) = reconcile(&actions, results);
        if !failures.is_empty() {
            return Err(VectorError::RecordsRejected { failures });
        }
        debug!(index = %name, id, "Deleted vector");
        Ok(())
    }

    /// Delete records by id list (batched) or by filter. Returns how many
    /// deletions the backend confirmed.
    pub async fn delete_vectors(
        &self,
        name: &str,
        selector: BulkSelector,
    ) -> Result<usize, VectorError> {
        let handle = self.handle(name).await?;
        match selector {
            BulkSelector::Ids(ids) => {
                let actions: Vec<IndexAction> = ids.into_iter().map(IndexAction::delete).collect();
                let confirmed = self
                    .uploader
                    .submit(handle.client.as_ref(), actions, None)
                    .await?;
                info!(index = %name, deleted = confirmed.len(), "Deleted vectors by id");
                Ok(confirmed.len())
            }
            BulkSelector::Filter(filter) => {
                self.mutator
                    .delete_matching(handle.client.as_ref(), &filter, handle.dimension)
                    .await
            }
        }
    }

    /// Cached handle for `name`, resolving the schema on first use.
    async fn handle(&self, name: &str) -> Result<IndexHandle, VectorError> {
        if let Some(handle) = self.handles.get(name) {
            return Ok(handle);
        }

        let schema = self.service.get_index(name).await?;
        let summary = from_backend_schema(&schema);
        debug!(index = %name, dimension = summary.dimension, "Resolved index handle");
        Ok(self.handles.insert(
            name,
            IndexHandle {
                client: self.service.document_client(name),
                dimension: summary.dimension,
                metric: summary.metric,
            },
        ))
    }
}

fn check_len(field: &str, actual: Option<usize>, expected: usize) -> Result<(), VectorError> {
    match actual {
        Some(actual) if actual != expected => Err(VectorError::InvalidArgument(format!(
            "{} has {} entries for {} vectors",
            field, actual, expected
        ))),
        _ => Ok(()),
    }
}

fn check_dimension(handle: &IndexHandle, position: usize, vector: &[f32]) -> Result<(), VectorError> {
    if vector.len() != handle.dimension {
        return Err(VectorError::DimensionMismatch {
            position,
            expected: handle.dimension,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Split `text` out of the metadata and serialize the rest.
fn encode_metadata(mut metadata: Metadata) -> Result<(String, String), VectorError> {
    let text = match metadata.remove(TEXT_KEY) {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    Ok((serde_json::to_string(&metadata)?, text))
}

/// Parse stored metadata; a malformed payload yields an empty map.
fn decode_metadata(id: &str, raw: Option<&str>) -> Metadata {
    match raw {
        None | Some("") => Metadata::new(),
        Some(raw) => match serde_json::from_str::<Metadata>(raw) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(id, error = %e, "Malformed metadata, returning empty map");
                Metadata::new()
            }
        },
    }
}

fn to_query_result(hit: SearchHit, include_vector: bool) -> QueryResult {
    let SearchHit { score, document } = hit;
    let mut metadata = decode_metadata(&document.id, document.metadata.as_deref());
    if let Some(text) = document.text.filter(|t| !t.is_empty()) {
        metadata.insert(TEXT_KEY.to_string(), Value::String(text));
    }

    QueryResult {
        id: document.id,
        score,
        metadata,
        vector: if include_vector { document.vector } else { None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_encode_metadata_promotes_text() {
        let (json, text) = encode_metadata(meta(json!({"text": "hello", "page": 2}))).unwrap();
        assert_eq!(text, "hello");
        assert_eq!(json, r#"{"page":2}"#);
    }

    #[test]
    fn test_encode_metadata_without_text() {
        let (json, text) = encode_metadata(Metadata::new()).unwrap();
        assert_eq!(text, "");
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_encode_metadata_non_string_text() {
        let (_, text) = encode_metadata(meta(json!({"text": 42}))).unwrap();
        assert_eq!(text, "42");
    }

    #[test]
    fn test_decode_malformed_metadata() {
        assert!(decode_metadata("a", Some("{not json")).is_empty());
        assert!(decode_metadata("a", Some("[1,2]")).is_empty());
        assert!(decode_metadata("a", None).is_empty());
    }

    #[test]
    fn test_query_result_folds_text() {
        let hit = SearchHit {
            score: 0.9,
            document: SearchDocument {
                id: "a".to_string(),
                vector: Some(vec![1.0]),
                metadata: Some(r#"{"source":"x"}"#.to_string()),
                text: Some("body".to_string()),
            },
        };
        let result = to_query_result(hit, false);
        assert_eq!(result.metadata["text"], "body");
        assert_eq!(result.metadata["source"], "x");
        assert!(result.vector.is_none());
    }

    #[test]
    fn test_query_result_skips_empty_text() {
        let hit = SearchHit {
            score: 0.1,
            document: SearchDocument {
                id: "a".to_string(),
                text: Some(String::new()),
                ..Default::default()
            },
        };
        assert!(!to_query_result(hit, true).metadata.contains_key("text"));
    }

    #[test]
    fn test_check_len() {
        assert!(check_len("ids", None, 3).is_ok());
        assert!(check_len("ids", Some(3), 3).is_ok());
        assert!(matches!(
            check_len("ids", Some(2), 3),
            Err(VectorError::InvalidArgument(_))
        ));
    }
}
