//! CLI argument parsing for docindex.
//!
//! CLI flags override all other config sources.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use docindex_vector::Metric;

/// Document index tool
///
/// Manages vector indexes on a search service and extracts text and tables
/// from documents with an analysis service.
#[derive(Parser, Debug)]
#[command(name = "docindex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/docindex/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage vector indexes
    #[command(subcommand)]
    Index(IndexCommands),

    /// Nearest-neighbor query against an index
    Query {
        /// Index name
        index: String,

        /// Query vector as comma-separated numbers
        #[arg(long, required = true, value_delimiter = ',', allow_hyphen_values = true)]
        vector: Vec<f32>,

        /// Number of neighbors to return
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Backend filter expression
        #[arg(short, long)]
        filter: Option<String>,

        /// Return stored vectors with each hit
        #[arg(long)]
        include_vector: bool,
    },

    /// Analyze a document and print its pages and tables
    Analyze(AnalyzeArgs),
}

/// Index subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum IndexCommands {
    /// Create an index (replaces one with a different dimension or metric)
    Create {
        name: String,

        /// Vector dimension
        #[arg(short, long)]
        dimension: usize,

        /// Similarity metric (cosine, euclidean, dotproduct)
        #[arg(short, long, default_value = "cosine", value_parser = parse_metric)]
        metric: Metric,
    },

    /// List index names
    List,

    /// Show dimension, record count and metric
    Describe { name: String },

    /// Delete an index
    Delete { name: String },
}

/// Exactly one of `--url` and `--file` is required.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Document URL reachable by the analysis service
    #[arg(long, required_unless_present = "file", conflicts_with = "file")]
    pub url: Option<String>,

    /// Local document file
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Analysis model (defaults to the configured model)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print tables as Markdown instead of the full JSON document
    #[arg(long)]
    pub markdown: bool,
}

fn parse_metric(input: &str) -> Result<Metric, String> {
    input.parse().map_err(|e: docindex_vector::VectorError| e.to_string())
}
