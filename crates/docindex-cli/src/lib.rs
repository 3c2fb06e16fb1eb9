//! docindex command-line library.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (index, query, analyze)

pub mod cli;
pub mod commands;

pub use cli::{AnalyzeArgs, Cli, Commands, IndexCommands};
pub use commands::{handle_analyze, handle_index, handle_query, init_logging, load_settings};
