//! In-process search service.
//!
//! Behaves like the REST backend closely enough to exercise the adapter
//! without a network: per-record write status, paginated listing, filter
//! evaluation (see [`filter`]) and metric-aware scoring. It also records the
//! size of every write call and can fail a chosen call.

pub mod filter;

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{
    ActionKind, DocumentClient, IndexAction, IndexNamePage, IndexingResult, SearchDocument,
    SearchHit, SearchService, VectorSearchRequest,
};
use crate::error::VectorError;
use crate::schema::{from_backend_schema, SearchIndex, METADATA_FIELD, TEXT_FIELD, VECTOR_FIELD};
use crate::types::Metric;

pub use filter::Filter;

const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Default)]
struct State {
    indexes: BTreeMap<String, StoredIndex>,
    write_calls: Vec<usize>,
    failing_write_calls: HashSet<usize>,
    search_calls: usize,
}

struct StoredIndex {
    schema: SearchIndex,
    documents: BTreeMap<String, SearchDocument>,
}

impl StoredIndex {
    fn dimension(&self) -> usize {
        from_backend_schema(&self.schema).dimension
    }

    fn metric(&self) -> Metric {
        from_backend_schema(&self.schema).metric
    }
}

fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Search service held entirely in memory.
#[derive(Clone)]
pub struct InMemorySearchService {
    state: Arc<Mutex<State>>,
    page_size: usize,
    write_delay: Option<Duration>,
}

impl Default for InMemorySearchService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySearchService {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            page_size: DEFAULT_PAGE_SIZE,
            write_delay: None,
        }
    }

    /// Number of index names returned per listing page.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Sleep this long at the start of every document write call.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    /// Sizes of every document write call so far, in call order.
    pub fn write_batch_sizes(&self) -> Vec<usize> {
        lock(&self.state).write_calls.clone()
    }

    /// Number of search calls so far.
    pub fn search_calls(&self) -> usize {
        lock(&self.state).search_calls
    }

    /// Make the write call with this ordinal (0-based, counted across all
    /// indexes since creation) fail with a 503.
    pub fn fail_write_call(&self, ordinal: usize) {
        lock(&self.state).failing_write_calls.insert(ordinal);
    }
}

#[async_trait]
impl SearchService for InMemorySearchService {
    async fn create_or_update_index(&self, index: &SearchIndex) -> Result<SearchIndex, VectorError> {
        let mut state = lock(&self.state);
        match state.indexes.get_mut(&index.name) {
            Some(existing) => {
                if existing.schema.fields != index.fields {
                    return Err(VectorError::Backend {
                        status: 400,
                        message: format!(
                            "Existing field(s) of index '{}' cannot be changed",
                            index.name
                        ),
                    });
                }
                existing.schema = index.clone();
            }
            None => {
                state.indexes.insert(
                    index.name.clone(),
                    StoredIndex {
                        schema: index.clone(),
                        documents: BTreeMap::new(),
                    },
                );
            }
        }
        Ok(index.clone())
    }

    async fn get_index(&self, name: &str) -> Result<SearchIndex, VectorError> {
        lock(&self.state)
            .indexes
            .get(name)
            .map(|stored| stored.schema.clone())
            .ok_or_else(|| VectorError::NotFound(format!("index {}", name)))
    }

    async fn delete_index(&self, name: &str) -> Result<(), VectorError> {
        lock(&self.state)
            .indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| VectorError::NotFound(format!("index {}", name)))
    }

    async fn list_index_names(
        &self,
        continuation: Option<String>,
    ) -> Result<IndexNamePage, VectorError> {
        let offset = match continuation {
            Some(token) => token.parse::<usize>().map_err(|_| {
                VectorError::InvalidArgument(format!("bad continuation token: {}", token))
            })?,
            None => 0,
        };

        let state = lock(&self.state);
        let names: Vec<String> = state
            .indexes
            .keys()
            .skip(offset)
            .take(self.page_size)
            .cloned()
            .collect();
        let consumed = offset + names.len();
        let next = (consumed < state.indexes.len()).then(|| consumed.to_string());
        Ok(IndexNamePage { names, next })
    }

    fn document_client(&self, index_name: &str) -> Arc<dyn DocumentClient> {
        Arc::new(InMemoryDocumentClient {
            index_name: index_name.to_string(),
            state: Arc::clone(&self.state),
            write_delay: self.write_delay,
        })
    }
}

/// Document client bound to one in-memory index.
pub struct InMemoryDocumentClient {
    index_name: String,
    state: Arc<Mutex<State>>,
    write_delay: Option<Duration>,
}

impl InMemoryDocumentClient {
    fn not_found(&self) -> VectorError {
        VectorError::NotFound(format!("index {}", self.index_name))
    }
}

#[async_trait]
impl DocumentClient for InMemoryDocumentClient {
    fn index_name(&self) -> &str {
        &self.index_name
    }

    async fn index_documents(
        &self,
        actions: Vec<IndexAction>,
    ) -> Result<Vec<IndexingResult>, VectorError> {
        // A write cancelled during the delay is never recorded or applied.
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = lock(&self.state);
        let ordinal = state.write_calls.len();
        state.write_calls.push(actions.len());
        if state.failing_write_calls.remove(&ordinal) {
            return Err(VectorError::Backend {
                status: 503,
                message: "Service unavailable".to_string(),
            });
        }

        let not_found = self.not_found();
        let index = state.indexes.get_mut(&self.index_name).ok_or(not_found)?;
        let dimension = index.dimension();

        let results = actions
            .into_iter()
            .map(|IndexAction { action, document }| {
                let key = document.id.clone();
                if document.vector.as_ref().is_some_and(|v| v.len() != dimension) {
                    return IndexingResult::failed(
                        key,
                        400,
                        format!("The vector field must have {} dimensions", dimension),
                    );
                }
                match action {
                    ActionKind::Upload => {
                        index.documents.insert(key.clone(), document);
                        IndexingResult::succeeded(key, 201)
                    }
                    ActionKind::Merge => match index.documents.get_mut(&key) {
                        Some(existing) => {
                            if document.vector.is_some() {
                                existing.vector = document.vector;
                            }
                            if document.metadata.is_some() {
                                existing.metadata = document.metadata;
                            }
                            if document.text.is_some() {
                                existing.text = document.text;
                            }
                            IndexingResult::succeeded(key, 200)
                        }
                        None => IndexingResult::failed(key, 404, "Document not found."),
                    },
                    ActionKind::Delete => {
                        index.documents.remove(&key);
                        IndexingResult::succeeded(key, 200)
                    }
                }
            })
            .collect();

        Ok(results)
    }

    async fn search(&self, request: &VectorSearchRequest) -> Result<Vec<SearchHit>, VectorError> {
        let filter = request
            .filter
            .as_deref()
            .map(Filter::parse)
            .transpose()
            .map_err(|message| VectorError::Backend {
                status: 400,
                message: format!("Invalid expression: {}", message),
            })?;

        let mut state = lock(&self.state);
        state.search_calls += 1;
        let index = state
            .indexes
            .get(&self.index_name)
            .ok_or_else(|| self.not_found())?;

        if request.vector.len() != index.dimension() {
            return Err(VectorError::Backend {
                status: 400,
                message: format!(
                    "The vector query must have {} dimensions",
                    index.dimension()
                ),
            });
        }

        let metric = index.metric();
        let mut hits: Vec<SearchHit> = index
            .documents
            .values()
            .filter(|doc| filter.as_ref().map_or(true, |f| f.matches(doc)))
            .map(|doc| SearchHit {
                score: score(metric, &request.vector, doc.vector.as_deref().unwrap_or(&[])),
                document: project(doc, &request.select),
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(request.k);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, VectorError> {
        lock(&self.state)
            .indexes
            .get(&self.index_name)
            .map(|index| index.documents.len() as u64)
            .ok_or_else(|| self.not_found())
    }
}

/// Keep only the selected fields; the key is always returned.
fn project(doc: &SearchDocument, select: &[&str]) -> SearchDocument {
    SearchDocument {
        id: doc.id.clone(),
        vector: select
            .contains(&VECTOR_FIELD)
            .then(|| doc.vector.clone())
            .flatten(),
        metadata: select
            .contains(&METADATA_FIELD)
            .then(|| doc.metadata.clone())
            .flatten(),
        text: select
            .contains(&TEXT_FIELD)
            .then(|| doc.text.clone())
            .flatten(),
    }
}

/// Higher is more similar for every metric.
fn score(metric: Metric, query: &[f32], candidate: &[f32]) -> f64 {
    let dot: f64 = query
        .iter()
        .zip(candidate)
        .map(|(a, b)| f64::from(*a) * f64::from(*b))
        .sum();
    match metric {
        Metric::DotProduct => dot,
        Metric::Cosine => {
            let norm = |v: &[f32]| v.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
            let denom = norm(query) * norm(candidate);
            if denom == 0.0 {
                0.0
            } else {
                dot / denom
            }
        }
        Metric::Euclidean => {
            let distance: f64 = query
                .iter()
                .zip(candidate)
                .map(|(a, b)| (f64::from(*a) - f64::from(*b)).powi(2))
                .sum::<f64>()
                .sqrt();
            1.0 / (1.0 + distance)
        }
    }
}
