//! Command implementations.

use std::sync::Arc;

use anyhow::{Context, Result};
use futures::TryStreamExt;
use tracing::{debug, info};

use docindex_analysis::{
    DocumentProcessor, DocumentSource, HttpAnalysisClient, HttpAnalysisConfig, ProcessedDocument,
};
use docindex_types::Settings;
use docindex_vector::{
    HttpSearchConfig, HttpSearchService, IndexSpec, QueryRequest, VectorIndexAdapter,
};

use crate::cli::{AnalyzeArgs, IndexCommands};

/// Load settings (defaults -> file -> env) and apply CLI overrides.
pub fn load_settings(config_path: Option<&str>, log_level: Option<&str>) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;
    if let Some(log_level) = log_level {
        settings.log_level = log_level.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn adapter(settings: &Settings) -> Result<VectorIndexAdapter> {
    let config =
        HttpSearchConfig::from_settings(&settings.search).context("Invalid search settings")?;
    let service = HttpSearchService::new(config).context("Failed to build search client")?;
    Ok(VectorIndexAdapter::new(Arc::new(service)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Handle `docindex index ...`.
pub async fn handle_index(settings: &Settings, command: IndexCommands) -> Result<()> {
    let adapter = adapter(settings)?;

    match command {
        IndexCommands::Create {
            name,
            dimension,
            metric,
        } => {
            adapter
                .create_index(&IndexSpec::new(&name, dimension, metric))
                .await
                .with_context(|| format!("Failed to create index {}", name))?;
            println!("Index {} ready (dimension {}, {})", name, dimension, metric);
        }
        IndexCommands::List => {
            let mut names = adapter.index_names();
            while let Some(name) = names.try_next().await.context("Failed to list indexes")? {
                println!("{}", name);
            }
        }
        IndexCommands::Describe { name } => {
            let stats = adapter
                .describe_index(&name)
                .await
                .with_context(|| format!("Failed to describe index {}", name))?;
            print_json(&stats)?;
        }
        IndexCommands::Delete { name } => {
            adapter
                .delete_index(&name)
                .await
                .with_context(|| format!("Failed to delete index {}", name))?;
            println!("Index {} deleted", name);
        }
    }

    Ok(())
}

/// Handle `docindex query`.
pub async fn handle_query(
    settings: &Settings,
    index: &str,
    vector: Vec<f32>,
    top_k: usize,
    filter: Option<String>,
    include_vector: bool,
) -> Result<()> {
    let mut request = QueryRequest::new(vector)
        .top_k(top_k)
        .include_vector(include_vector);
    if let Some(filter) = filter {
        request = request.filter(filter);
    }

    let results = adapter(settings)?
        .query(index, &request)
        .await
        .with_context(|| format!("Query against {} failed", index))?;
    debug!(hits = results.len(), "Query returned");
    print_json(&results)
}

/// Handle `docindex analyze`.
pub async fn handle_analyze(settings: &Settings, args: AnalyzeArgs) -> Result<()> {
    let config = HttpAnalysisConfig::from_settings(&settings.analysis)
        .context("Invalid analysis settings")?;
    let client = HttpAnalysisClient::new(config).context("Failed to build analysis client")?;
    let model_id = args
        .model
        .unwrap_or_else(|| settings.analysis.model_id.clone());

    let source = match (args.url, args.file) {
        (Some(url), _) => DocumentSource::Url(url),
        (None, Some(path)) => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            DocumentSource::Bytes(bytes)
        }
        (None, None) => anyhow::bail!("Either --url or --file is required"),
    };

    info!(model_id = %model_id, "Analyzing document");
    let document = DocumentProcessor::new(client, model_id)
        .process(&source)
        .await
        .context("Document analysis failed")?;

    if args.markdown {
        print_markdown(&document);
        Ok(())
    } else {
        print_json(&document)
    }
}

fn print_markdown(document: &ProcessedDocument) {
    for (i, table) in document.tables().iter().enumerate() {
        match table.page_number {
            Some(page) => println!("Table {} (page {})\n", i + 1, page),
            None => println!("Table {}\n", i + 1),
        }
        println!("{}\n", table.to_markdown());
    }
}
