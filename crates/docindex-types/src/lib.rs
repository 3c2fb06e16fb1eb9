//! # docindex-types
//!
//! Shared configuration types for the docindex workspace.
//!
//! - [`Settings`]: layered application settings
//! - [`SearchSettings`]: search backend endpoint and credentials
//! - [`AnalysisSettings`]: document-analysis backend endpoint and polling
//! - [`ConfigError`]: configuration failures

pub mod config;
pub mod error;

pub use config::{AnalysisSettings, SearchSettings, Settings};
pub use error::ConfigError;
