//! Vector index adapter for docindex.
//!
//! Provides:
//! - Index lifecycle (create, list, describe, delete) mapped onto a search
//!   service schema with an HNSW vector field
//! - Batched upserts with generated ids and per-batch partial-failure reporting
//! - Nearest-neighbor queries with metadata round-tripping
//! - Updates and deletes by id or by filter expression
//! - A REST backend ([`http`]) and an in-process backend ([`memory`])

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod error;
pub mod http;
pub mod memory;
pub mod mutator;
pub mod schema;
pub mod types;
pub mod uploader;

pub use adapter::{AdapterConfig, VectorIndexAdapter};
pub use backend::{DocumentClient, SearchService};
pub use error::{RecordFailure, VectorError};
pub use http::{HttpSearchConfig, HttpSearchService};
pub use memory::InMemorySearchService;
pub use types::{
    BulkSelector, IndexSpec, IndexStats, Metadata, Metric, QueryRequest, QueryResult, Selector,
    UpsertRequest, VectorUpdate,
};
