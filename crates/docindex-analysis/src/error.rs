//! Document-analysis error types.

use thiserror::Error;

/// Errors from submitting, polling or decoding an analysis job.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The service returned a non-success status
    #[error("Backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    /// The submit response carried no `Operation-Location` header
    #[error("Analysis accepted without an Operation-Location header")]
    MissingOperationLocation,

    /// The job finished with status `failed`
    #[error("Analysis job failed: {0}")]
    JobFailed(String),

    /// The job did not finish within the polling budget
    #[error("Analysis job still {status} after {elapsed_secs}s")]
    Timeout { status: String, elapsed_secs: u64 },

    /// Network or transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Analysis settings are missing or unusable
    #[error(transparent)]
    Config(#[from] docindex_types::ConfigError),
}
