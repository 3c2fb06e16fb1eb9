//! Configuration loading for docindex.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at `<config dir>/docindex/config.toml`.

use ::config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Search backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Service endpoint (e.g., "https://my-search.search.windows.net")
    #[serde(default)]
    pub endpoint: String,

    /// Admin API key (usually supplied through the environment)
    #[serde(default)]
    pub api_key: Option<String>,

    /// REST API version sent with every request
    #[serde(default = "default_search_api_version")]
    pub api_version: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_search_api_version() -> String {
    "2023-11-01".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            api_version: default_search_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SearchSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("search.endpoint", "must not be empty"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "search.request_timeout_secs",
                "must be > 0",
            ));
        }
        Ok(())
    }
}

/// Document-analysis backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Service endpoint (e.g., "https://my-di.cognitiveservices.azure.com")
    #[serde(default)]
    pub endpoint: String,

    /// Subscription key
    #[serde(default)]
    pub api_key: Option<String>,

    /// REST API version sent with every request
    #[serde(default = "default_analysis_api_version")]
    pub api_version: String,

    /// Analysis model used when the caller does not name one
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// First delay between job status polls (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up on a job after this many seconds
    #[serde(default = "default_max_poll_secs")]
    pub max_poll_secs: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_analysis_api_version() -> String {
    "2024-11-30".to_string()
}

fn default_model_id() -> String {
    "prebuilt-layout".to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_poll_secs() -> u64 {
    300
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            api_key: None,
            api_version: default_analysis_api_version(),
            model_id: default_model_id(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_secs: default_max_poll_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl AnalysisSettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid("analysis.endpoint", "must not be empty"));
        }
        if self.model_id.trim().is_empty() {
            return Err(ConfigError::invalid("analysis.model_id", "must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::invalid("analysis.poll_interval_ms", "must be > 0"));
        }
        if self.max_poll_secs == 0 {
            return Err(ConfigError::invalid("analysis.max_poll_secs", "must be > 0"));
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Search backend configuration
    #[serde(default)]
    pub search: SearchSettings,

    /// Document-analysis backend configuration
    #[serde(default)]
    pub analysis: AnalysisSettings,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            analysis: AnalysisSettings::default(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/docindex/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (DOCINDEX__*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let default_config_path = default_config_dir().join("config");

        let mut builder = Config::builder()
            .set_default("log_level", default_log_level())?
            .set_default("search.api_version", default_search_api_version())?
            .set_default("analysis.api_version", default_analysis_api_version())?
            .set_default("analysis.model_id", default_model_id())?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Format: DOCINDEX__SEARCH__ENDPOINT, DOCINDEX__ANALYSIS__API_KEY, etc.
        builder = builder.add_source(
            Environment::with_prefix("DOCINDEX")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

/// Directory holding the default config file.
pub fn default_config_dir() -> PathBuf {
    ProjectDirs::from("", "", "docindex")
        .map(|p| p.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}
