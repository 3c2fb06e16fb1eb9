//! REST implementation of the backend contracts.
//!
//! Every request carries the `api-version` query parameter and the
//! `api-key` header. A 404 becomes [`VectorError::NotFound`]; any other
//! non-success status becomes [`VectorError::Backend`] with the service's
//! error message when one is present.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use docindex_types::{ConfigError, SearchSettings};

use crate::backend::{
    DocumentClient, IndexAction, IndexNamePage, IndexingResult, SearchDocument, SearchHit,
    SearchService, VectorSearchRequest,
};
use crate::error::VectorError;
use crate::schema::{SearchIndex, VECTOR_FIELD};

/// Connection settings for the REST backend.
#[derive(Debug, Clone)]
pub struct HttpSearchConfig {
    /// Service endpoint without a trailing slash
    pub endpoint: String,

    /// Admin API key
    pub api_key: SecretString,

    /// REST API version
    pub api_version: String,

    /// Per-request timeout
    pub timeout: Duration,
}

impl HttpSearchConfig {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let defaults = SearchSettings::default();
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key.into()),
            api_version: defaults.api_version,
            timeout: Duration::from_secs(defaults.request_timeout_secs),
        }
    }

    /// Build from loaded settings. The endpoint and key must both be set.
    pub fn from_settings(settings: &SearchSettings) -> Result<Self, VectorError> {
        settings.validate()?;
        let api_key = settings
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::invalid("search.api_key", "must be set"))?;

        Ok(Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key),
            api_version: settings.api_version.clone(),
            timeout: Duration::from_secs(settings.request_timeout_secs),
        })
    }
}

/// Search service reached over HTTPS.
pub struct HttpSearchService {
    client: Client,
    config: Arc<HttpSearchConfig>,
}

impl HttpSearchService {
    pub fn new(config: HttpSearchConfig) -> Result<Self, VectorError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    fn index_url(&self, name: &str) -> String {
        format!("{}/indexes/{}", self.config.endpoint, name)
    }
}

fn authorize(builder: RequestBuilder, config: &HttpSearchConfig) -> RequestBuilder {
    builder
        .query(&[("api-version", config.api_version.as_str())])
        .header("api-key", config.api_key.expose_secret())
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

/// Pass a successful response through, map anything else to an error.
async fn check(response: Response, what: &str) -> Result<Response, VectorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);
    if status == StatusCode::NOT_FOUND {
        return Err(VectorError::NotFound(what.to_string()));
    }
    warn!(status = status.as_u16(), what, message = %message, "Search request failed");
    Err(VectorError::Backend {
        status: status.as_u16(),
        message,
    })
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => parsed.error.message,
        _ => body.trim().to_string(),
    }
}

#[derive(Deserialize)]
struct IndexListResponse {
    #[serde(default)]
    value: Vec<IndexName>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Deserialize)]
struct IndexName {
    name: String,
}

#[async_trait]
impl SearchService for HttpSearchService {
    async fn create_or_update_index(&self, index: &SearchIndex) -> Result<SearchIndex, VectorError> {
        debug!(index = %index.name, "PUT index");
        let request = self
            .client
            .put(self.index_url(&index.name))
            .header("Prefer", "return=representation")
            .json(index);
        let response = authorize(request, &self.config).send().await?;
        let response = check(response, &format!("index {}", index.name)).await?;

        if response.status() == StatusCode::NO_CONTENT {
            return Ok(index.clone());
        }
        Ok(response.json().await?)
    }

    async fn get_index(&self, name: &str) -> Result<SearchIndex, VectorError> {
        let request = self.client.get(self.index_url(name));
        let response = authorize(request, &self.config).send().await?;
        let response = check(response, &format!("index {}", name)).await?;
        Ok(response.json().await?)
    }

    async fn delete_index(&self, name: &str) -> Result<(), VectorError> {
        debug!(index = %name, "DELETE index");
        let request = self.client.delete(self.index_url(name));
        let response = authorize(request, &self.config).send().await?;
        check(response, &format!("index {}", name)).await?;
        Ok(())
    }

    async fn list_index_names(
        &self,
        continuation: Option<String>,
    ) -> Result<IndexNamePage, VectorError> {
        // The next link already carries every query parameter.
        let request = match continuation {
            Some(next_link) => self
                .client
                .get(next_link)
                .header("api-key", self.config.api_key.expose_secret()),
            None => authorize(
                self.client.get(format!("{}/indexes", self.config.endpoint)),
                &self.config,
            )
            .query(&[("$select", "name")]),
        };
        let response = check(request.send().await?, "index listing").await?;
        let page: IndexListResponse = response.json().await?;

        Ok(IndexNamePage {
            names: page.value.into_iter().map(|index| index.name).collect(),
            next: page.next_link,
        })
    }

    fn document_client(&self, index_name: &str) -> Arc<dyn DocumentClient> {
        Arc::new(HttpDocumentClient {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            index_name: index_name.to_string(),
        })
    }
}

/// Document operations on one index over REST.
pub struct HttpDocumentClient {
    client: Client,
    config: Arc<HttpSearchConfig>,
    index_name: String,
}

impl HttpDocumentClient {
    fn docs_url(&self, operation: &str) -> String {
        format!(
            "{}/indexes/{}/docs/{}",
            self.config.endpoint, self.index_name, operation
        )
    }

    fn not_found_label(&self) -> String {
        format!("index {}", self.index_name)
    }
}

#[derive(Serialize)]
struct IndexBatch<'a> {
    value: &'a [IndexAction],
}

#[derive(Deserialize)]
struct IndexBatchResponse {
    #[serde(default)]
    value: Vec<IndexingResult>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchBody<'a> {
    select: String,
    top: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a str>,
    vector_queries: [VectorQuery<'a>; 1],
}

#[derive(Serialize)]
struct VectorQuery<'a> {
    kind: &'static str,
    vector: &'a [f32],
    fields: &'static str,
    k: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    value: Vec<RawHit>,
}

#[derive(Deserialize)]
struct RawHit {
    #[serde(rename = "@search.score")]
    score: f64,
    #[serde(flatten)]
    document: SearchDocument,
}

/// Parse a `$count` body: a bare integer, possibly preceded by a BOM.
fn parse_count(body: &str) -> Option<u64> {
    body.trim_start_matches('\u{feff}').trim().parse().ok()
}

#[async_trait]
impl DocumentClient for HttpDocumentClient {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn index_documents(
        &self,
        actions: Vec<IndexAction>,
    ) -> Result<Vec<IndexingResult>, VectorError> {
        debug!(index = %self.index_name, actions = actions.len(), "POST docs/index");
        let request = self
            .client
            .post(self.docs_url("index"))
            .json(&IndexBatch { value: &actions });
        let response = authorize(request, &self.config).send().await?;
        // 207 means some records failed; the per-record results say which.
        let response = check(response, &self.not_found_label()).await?;
        let body: IndexBatchResponse = response.json().await?;
        Ok(body.value)
    }

    async fn search(&self, request: &VectorSearchRequest) -> Result<Vec<SearchHit>, VectorError> {
        let body = SearchBody {
            select: request.select.join(","),
            top: request.k,
            filter: request.filter.as_deref(),
            vector_queries: [VectorQuery {
                kind: "vector",
                vector: &request.vector,
                fields: VECTOR_FIELD,
                k: request.k,
            }],
        };
        let builder = self.client.post(self.docs_url("search")).json(&body);
        let response = authorize(builder, &self.config).send().await?;
        let response = check(response, &self.not_found_label()).await?;
        let results: SearchResponse = response.json().await?;

        Ok(results
            .value
            .into_iter()
            .map(|hit| SearchHit {
                score: hit.score,
                document: hit.document,
            })
            .collect())
    }

    async fn count(&self) -> Result<u64, VectorError> {
        let request = self.client.get(self.docs_url("$count"));
        let response = authorize(request, &self.config).send().await?;
        let response = check(response, &self.not_found_label()).await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        parse_count(&body).ok_or_else(|| VectorError::Backend {
            status,
            message: format!("unexpected count body: {}", body.trim()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_count_strips_bom() {
        assert_eq!(parse_count("\u{feff}42"), Some(42));
        assert_eq!(parse_count(" 7\n"), Some(7));
        assert_eq!(parse_count("many"), None);
    }

    #[test]
    fn test_error_message_prefers_service_message() {
        let body = r#"{"error":{"code":"","message":"The request is invalid."}}"#;
        assert_eq!(error_message(body), "The request is invalid.");
        assert_eq!(error_message("gateway timeout "), "gateway timeout");
    }

    #[test]
    fn test_search_body_shape() {
        let vector = vec![0.5, 0.25];
        let body = SearchBody {
            select: "id,metadata".to_string(),
            top: 3,
            filter: None,
            vector_queries: [VectorQuery {
                kind: "vector",
                vector: &vector,
                fields: VECTOR_FIELD,
                k: 3,
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["vectorQueries"][0]["kind"], "vector");
        assert_eq!(json["vectorQueries"][0]["fields"], "vector");
        assert_eq!(json["vectorQueries"][0]["k"], 3);
        assert!(json.get("filter").is_none());
    }

    #[test]
    fn test_hit_flattens_document() {
        let hit: RawHit = serde_json::from_str(
            r#"{"@search.score":0.8,"id":"a","metadata":"{}","text":"hi"}"#,
        )
        .unwrap();
        assert_eq!(hit.score, 0.8);
        assert_eq!(hit.document.id, "a");
        assert_eq!(hit.document.text.as_deref(), Some("hi"));
        assert!(hit.document.vector.is_none());
    }

    #[test]
    fn test_config_requires_key() {
        let settings = SearchSettings {
            endpoint: "https://search.example".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            HttpSearchConfig::from_settings(&settings),
            Err(VectorError::Config(_))
        ));

        let settings = SearchSettings {
            endpoint: "https://search.example/".to_string(),
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let config = HttpSearchConfig::from_settings(&settings).unwrap();
        assert_eq!(config.endpoint, "https://search.example");
        assert_eq!(config.api_version, "2023-11-01");
    }
}
