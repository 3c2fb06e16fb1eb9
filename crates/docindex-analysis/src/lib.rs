//! Document analysis for docindex.
//!
//! Submits documents to the analysis service, polls the job to completion
//! and normalizes the result into pages and table grids.

pub mod client;
pub mod document;
pub mod error;
pub mod parser;
pub mod processor;
pub mod raw;

pub use client::{
    DocumentAnalysisClient, DocumentSource, HttpAnalysisClient, HttpAnalysisConfig,
    MockAnalysisClient,
};
pub use document::{DocumentMetadata, ProcessedDocument, ProcessedPage, Table};
pub use error::AnalysisError;
pub use parser::{parse, parse_at};
pub use processor::DocumentProcessor;
pub use raw::AnalyzeResult;
