//! docindex
//!
//! Vector index management and document analysis from the command line.
//!
//! # Usage
//!
//! ```bash
//! docindex index create docs --dimension 1536 --metric cosine
//! docindex index list
//! docindex query docs --vector 0.1,0.2,0.3 -k 5 --filter "source eq 'a.pdf'"
//! docindex analyze --file report.pdf --markdown
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/docindex/config.toml)
//! 3. Environment variables (DOCINDEX__SEARCH__ENDPOINT, ...)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use docindex_cli::{
    handle_analyze, handle_index, handle_query, init_logging, load_settings, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref(), cli.log_level.as_deref())?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Index(command) => {
            handle_index(&settings, command).await?;
        }
        Commands::Query {
            index,
            vector,
            top_k,
            filter,
            include_vector,
        } => {
            handle_query(&settings, &index, vector, top_k, filter, include_vector).await?;
        }
        Commands::Analyze(args) => {
            handle_analyze(&settings, args).await?;
        }
    }

    Ok(())
}
