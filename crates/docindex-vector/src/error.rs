//! Vector index error types.

use thiserror::Error;

/// Errors that can occur during vector index operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// Index or record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Vector length differs from the index dimension
    #[error("Dimension mismatch at position {position}: expected {expected}, got {actual}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    /// Metric name the backend schema cannot express
    #[error("Unsupported metric: {0}")]
    UnsupportedMetric(String),

    /// Caller supplied an unusable combination of arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A batch in a multi-batch operation failed; earlier batches are committed
    #[error("Batch {batch} failed after {} confirmed ids: {source}", .confirmed_ids.len())]
    BatchFailure {
        batch: usize,
        confirmed_ids: Vec<String>,
        #[source]
        source: Box<VectorError>,
    },

    /// The backend accepted the request but rejected individual records
    #[error("{} record(s) rejected, first: {}", .failures.len(), first_failure(.failures))]
    RecordsRejected { failures: Vec<RecordFailure> },

    /// Caller deadline passed before the operation completed
    #[error("Deadline exceeded after {} confirmed ids", .confirmed_ids.len())]
    DeadlineExceeded { confirmed_ids: Vec<String> },

    /// Backend returned a non-success status
    #[error("Backend error (HTTP {status}): {message}")]
    Backend { status: u16, message: String },

    /// Network or transport failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend settings are missing or unusable
    #[error(transparent)]
    Config(#[from] docindex_types::ConfigError),
}

/// A single record the backend refused during a batch write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFailure {
    pub id: String,
    pub status: u16,
    pub message: String,
}

fn first_failure(failures: &[RecordFailure]) -> String {
    failures
        .first()
        .map(|f| format!("{}: {}", f.id, f.message))
        .unwrap_or_default()
}

impl VectorError {
    /// Ids the backend confirmed before this error was raised.
    ///
    /// Empty for errors that never carry partial progress.
    pub fn confirmed_ids(&self) -> &[String] {
        match self {
            VectorError::BatchFailure { confirmed_ids, .. }
            | VectorError::DeadlineExceeded { confirmed_ids } => confirmed_ids,
            _ => &[],
        }
    }

    /// Whether this error means the index or record is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            VectorError::NotFound(_) => true,
            VectorError::BatchFailure { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_failure_exposes_confirmed_ids() {
        let err = VectorError::BatchFailure {
            batch: 1,
            confirmed_ids: vec!["a".to_string(), "b".to_string()],
            source: Box::new(VectorError::Backend {
                status: 503,
                message: "busy".to_string(),
            }),
        };
        assert_eq!(err.confirmed_ids(), ["a", "b"]);
        assert!(err.to_string().contains("2 confirmed ids"));
        assert!(err.to_string().contains("busy"));
    }

    #[test]
    fn test_records_rejected_display() {
        let err = VectorError::RecordsRejected {
            failures: vec![RecordFailure {
                id: "doc-7".to_string(),
                status: 400,
                message: "bad vector".to_string(),
            }],
        };
        assert!(err.to_string().contains("doc-7: bad vector"));
        assert!(err.confirmed_ids().is_empty());
    }

    #[test]
    fn test_not_found_through_batch() {
        let err = VectorError::BatchFailure {
            batch: 0,
            confirmed_ids: vec![],
            source: Box::new(VectorError::NotFound("index docs".to_string())),
        };
        assert!(err.is_not_found());
    }
}
