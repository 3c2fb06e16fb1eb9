//! Backend client contracts.
//!
//! The adapter only talks to the search service through these two traits:
//! [`SearchService`] for index lifecycle and [`DocumentClient`] for the
//! documents of one index. [`crate::http`] implements them over REST,
//! [`crate::memory`] in process.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VectorError;
use crate::schema::SearchIndex;

/// A stored document as the backend sees it.
///
/// Fields left `None` are omitted on the wire, which is what makes a merge
/// action a partial update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    /// Opaque JSON-encoded metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl SearchDocument {
    pub fn key_only(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }
}

/// Document write action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Upload,
    Merge,
    Delete,
}

/// One entry of a batch write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexAction {
    #[serde(rename = "@search.action")]
    pub action: ActionKind,
    #[serde(flatten)]
    pub document: SearchDocument,
}

impl IndexAction {
    pub fn upload(document: SearchDocument) -> Self {
        Self {
            action: ActionKind::Upload,
            document,
        }
    }

    pub fn merge(document: SearchDocument) -> Self {
        Self {
            action: ActionKind::Merge,
            document,
        }
    }

    pub fn delete(id: impl Into<String>) -> Self {
        Self {
            action: ActionKind::Delete,
            document: SearchDocument::key_only(id),
        }
    }

    pub fn key(&self) -> &str {
        &self.document.id
    }
}

/// Per-document outcome of a batch write.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingResult {
    pub key: String,
    pub status: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    pub status_code: u16,
}

impl IndexingResult {
    pub fn succeeded(key: impl Into<String>, status_code: u16) -> Self {
        Self {
            key: key.into(),
            status: true,
            error_message: None,
            status_code,
        }
    }

    pub fn failed(key: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: false,
            error_message: Some(message.into()),
            status_code,
        }
    }
}

/// Nearest-neighbor query over the vector field.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchRequest {
    pub vector: Vec<f32>,
    pub k: usize,
    pub filter: Option<String>,
    /// Fields to return; the key is always included
    pub select: Vec<&'static str>,
}

/// One hit from a vector search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub score: f64,
    pub document: SearchDocument,
}

/// One page of the index listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexNamePage {
    pub names: Vec<String>,
    /// Opaque token for the next page, `None` on the last page
    pub next: Option<String>,
}

/// Document operations scoped to one index.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    /// Name of the index this client is bound to.
    fn index_name(&self) -> &str;

    /// Apply a batch of write actions, returning one result per document.
    async fn index_documents(
        &self,
        actions: Vec<IndexAction>,
    ) -> Result<Vec<IndexingResult>, VectorError>;

    /// Run a nearest-neighbor query.
    async fn search(&self, request: &VectorSearchRequest) -> Result<Vec<SearchHit>, VectorError>;

    /// Live document count.
    async fn count(&self) -> Result<u64, VectorError>;
}

/// Index lifecycle operations of a search service.
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Create the index, or update it in place if it exists.
    async fn create_or_update_index(&self, index: &SearchIndex) -> Result<SearchIndex, VectorError>;

    /// Fetch an index definition. Fails with `NotFound` if absent.
    async fn get_index(&self, name: &str) -> Result<SearchIndex, VectorError>;

    /// Delete an index. Fails with `NotFound` if absent.
    async fn delete_index(&self, name: &str) -> Result<(), VectorError>;

    /// Fetch one page of index names.
    async fn list_index_names(
        &self,
        continuation: Option<String>,
    ) -> Result<IndexNamePage, VectorError>;

    /// Construct a document client for an index. Performs no I/O.
    fn document_client(&self, index_name: &str) -> Arc<dyn DocumentClient>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_action_wire_shape() {
        let action = IndexAction::upload(SearchDocument {
            id: "a".to_string(),
            vector: Some(vec![0.5, 1.0]),
            metadata: Some("{}".to_string()),
            text: Some(String::new()),
        });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["@search.action"], "upload");
        assert_eq!(json["id"], "a");
        assert_eq!(json["vector"][1], 1.0);
        assert_eq!(json["text"], "");
    }

    #[test]
    fn test_merge_omits_absent_fields() {
        let action = IndexAction::merge(SearchDocument {
            id: "a".to_string(),
            metadata: Some(r#"{"k":1}"#.to_string()),
            ..Default::default()
        });
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["@search.action"], "merge");
        assert!(json.get("vector").is_none());
        assert!(json.get("text").is_none());
    }

    #[test]
    fn test_delete_action_is_key_only() {
        let json = serde_json::to_value(IndexAction::delete("gone")).unwrap();
        assert_eq!(json, serde_json::json!({"@search.action": "delete", "id": "gone"}));
    }

    #[test]
    fn test_indexing_result_deserialize() {
        let body = r#"{"key": "a", "status": false, "errorMessage": "Document not found.", "statusCode": 404}"#;
        let result: IndexingResult = serde_json::from_str(body).unwrap();
        assert!(!result.status);
        assert_eq!(result.status_code, 404);
        assert_eq!(result.error_message.as_deref(), Some("Document not found."));
    }
}
