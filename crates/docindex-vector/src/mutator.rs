//! Mutate-by-filter on top of mutate-by-id.
//!
//! The backend has no filtered bulk update or delete, so a filter is first
//! resolved to ids with a neutral (all-zero) vector query capped at
//! `cap` hits, then the mutation is applied to exactly those ids in one
//! backend call. Matches beyond the cap are not touched.

use tracing::{debug, info, warn};

use crate::backend::{DocumentClient, IndexAction, SearchDocument, VectorSearchRequest};
use crate::error::VectorError;
use crate::schema::ID_FIELD;
use crate::uploader::reconcile;

/// Default ceiling on ids resolved from one filter.
pub const DEFAULT_FILTER_QUERY_CAP: usize = 10_000;

/// Resolves filters to id sets and applies deletes or field merges to them.
#[derive(Debug, Clone, Copy)]
pub struct FilterMutator {
    cap: usize,
}

impl Default for FilterMutator {
    fn default() -> Self {
        Self::new(DEFAULT_FILTER_QUERY_CAP)
    }
}

impl FilterMutator {
    pub fn new(cap: usize) -> Self {
        Self { cap: cap.max(1) }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Ids of records matching `filter`, at most `cap` of them.
    pub async fn resolve_ids(
        &self,
        client: &dyn DocumentClient,
        filter: &str,
        dimension: usize,
    ) -> Result<Vec<String>, VectorError> {
        let request = VectorSearchRequest {
            vector: vec![0.0; dimension],
            k: self.cap,
            filter: Some(filter.to_string()),
            select: vec![ID_FIELD],
        };

        let hits = client.search(&request).await?;
        if hits.len() >= self.cap {
            warn!(
                index = client.index_name(),
                cap = self.cap,
                "Filter matched the resolution cap; further matches are ignored"
            );
        }

        let ids: Vec<String> = hits.into_iter().map(|hit| hit.document.id).collect();
        debug!(index = client.index_name(), matched = ids.len(), "Resolved filter");
        Ok(ids)
    }

    /// Delete every record matching `filter`. Returns how many were deleted.
    pub async fn delete_matching(
        &self,
        client: &dyn DocumentClient,
        filter: &str,
        dimension: usize,
    ) -> Result<usize, VectorError> {
        let ids = self.resolve_ids(client, filter, dimension).await?;
        if ids.is_empty() {
            debug!(index = client.index_name(), "No records match filter, skipping delete");
            return Ok(0);
        }

        let actions: Vec<IndexAction> = ids.into_iter().map(IndexAction::delete).collect();
        let deleted = apply(client, actions).await?;
        info!(index = client.index_name(), deleted, "Deleted records by filter");
        Ok(deleted)
    }

    /// Merge `delta` into every record matching `filter`. Returns how many
    /// were updated. The id of `delta` is ignored.
    pub async fn merge_matching(
        &self,
        client: &dyn DocumentClient,
        filter: &str,
        dimension: usize,
        delta: &SearchDocument,
    ) -> Result<usize, VectorError> {
        let ids = self.resolve_ids(client, filter, dimension).await?;
        if ids.is_empty() {
            debug!(index = client.index_name(), "No records match filter, skipping merge");
            return Ok(0);
        }

        let actions: Vec<IndexAction> = ids
            .into_iter()
            .map(|id| {
                IndexAction::merge(SearchDocument {
                    id,
                    ..delta.clone()
                })
            })
            .collect();
        let updated = apply(client, actions).await?;
        info!(index = client.index_name(), updated, "Updated records by filter");
        Ok(updated)
    }
}

/// Send all actions in one call; any rejected record fails the whole call.
async fn apply(client: &dyn DocumentClient, actions: Vec<IndexAction>) -> Result<usize, VectorError> {
    let results = client.index_documents(actions.clone()).await?;
    let (succeeded, failures) = reconcile(&actions, results);
    if !failures.is_empty() {
        return Err(VectorError::RecordsRejected { failures });
    }
    Ok(succeeded.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SearchService;
    use crate::memory::InMemorySearchService;
    use crate::schema::to_backend_schema;
    use crate::types::{IndexSpec, Metric};

    async fn seeded(n: usize) -> InMemorySearchService {
        let service = InMemorySearchService::new();
        service
            .create_or_update_index(&to_backend_schema(&IndexSpec::new("docs", 2, Metric::Cosine)))
            .await
            .unwrap();
        let client = service.document_client("docs");
        let actions = (0..n)
            .map(|i| {
                let source = if i % 2 == 0 { "even" } else { "odd" };
                IndexAction::upload(SearchDocument {
                    id: format!("doc-{}", i),
                    vector: Some(vec![1.0, i as f32]),
                    metadata: Some(format!(r#"{{"source":"{}"}}"#, source)),
                    text: Some(String::new()),
                })
            })
            .collect();
        client.index_documents(actions).await.unwrap();
        service
    }

    #[tokio::test]
    async fn test_resolve_ids_respects_cap() {
        let service = seeded(6).await;
        let client = service.document_client("docs");

        let all = FilterMutator::new(10)
            .resolve_ids(client.as_ref(), "source eq 'even'", 2)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let capped = FilterMutator::new(2)
            .resolve_ids(client.as_ref(), "source eq 'even'", 2)
            .await
            .unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[tokio::test]
    async fn test_no_match_skips_write() {
        let service = seeded(4).await;
        let client = service.document_client("docs");
        let before = service.write_batch_sizes().len();

        let deleted = FilterMutator::default()
            .delete_matching(client.as_ref(), "source eq 'missing'", 2)
            .await
            .unwrap();

        assert_eq!(deleted, 0);
        assert_eq!(service.write_batch_sizes().len(), before);
    }

    #[tokio::test]
    async fn test_delete_matching_single_call() {
        let service = seeded(6).await;
        let client = service.document_client("docs");

        let deleted = FilterMutator::default()
            .delete_matching(client.as_ref(), "source eq 'odd'", 2)
            .await
            .unwrap();

        assert_eq!(deleted, 3);
        assert_eq!(client.count().await.unwrap(), 3);
        assert_eq!(service.write_batch_sizes().last(), Some(&3));
    }

    #[tokio::test]
    async fn test_merge_matching_updates_fields() {
        let service = seeded(4).await;
        let client = service.document_client("docs");
        let delta = SearchDocument {
            text: Some("patched".to_string()),
            ..Default::default()
        };

        let updated = FilterMutator::default()
            .merge_matching(client.as_ref(), "source eq 'even'", 2, &delta)
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let patched = FilterMutator::default()
            .resolve_ids(client.as_ref(), "text eq 'patched'", 2)
            .await
            .unwrap();
        assert_eq!(patched.len(), 2);
    }
}
