//! Sequential fixed-size batch writes.
//!
//! Batches go out strictly in input order. The first failed batch stops the
//! run; ids confirmed by earlier batches (and by the succeeding records of
//! the failed one) travel with the error.

use std::collections::HashMap;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::{DocumentClient, IndexAction, IndexingResult};
use crate::error::{RecordFailure, VectorError};

/// Default records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Splits write actions into batches and submits them one after another.
#[derive(Debug, Clone, Copy)]
pub struct BatchUploader {
    batch_size: usize,
}

impl Default for BatchUploader {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_SIZE)
    }
}

impl BatchUploader {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Submit all actions, returning the confirmed keys in input order.
    ///
    /// When `deadline` is set, no batch starts after it and an in-flight
    /// batch is abandoned when it passes.
    pub async fn submit(
        &self,
        client: &dyn DocumentClient,
        actions: Vec<IndexAction>,
        deadline: Option<Instant>,
    ) -> Result<Vec<String>, VectorError> {
        let total = actions.len();
        let mut confirmed = Vec::with_capacity(total);

        for (batch_no, batch) in actions.chunks(self.batch_size).enumerate() {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(
                    index = client.index_name(),
                    batch = batch_no,
                    confirmed = confirmed.len(),
                    "Deadline passed before batch"
                );
                return Err(VectorError::DeadlineExceeded {
                    confirmed_ids: confirmed,
                });
            }

            debug!(
                index = client.index_name(),
                batch = batch_no,
                size = batch.len(),
                "Submitting batch"
            );

            let call = client.index_documents(batch.to_vec());
            let outcome = match deadline {
                Some(d) => match tokio::time::timeout_at(d, call).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        return Err(VectorError::DeadlineExceeded {
                            confirmed_ids: confirmed,
                        })
                    }
                },
                None => call.await,
            };

            let results = match outcome {
                Ok(results) => results,
                Err(e) => {
                    warn!(batch = batch_no, error = %e, "Batch failed");
                    return Err(VectorError::BatchFailure {
                        batch: batch_no,
                        confirmed_ids: confirmed,
                        source: Box::new(e),
                    });
                }
            };

            let (succeeded, failures) = reconcile(batch, results);
            confirmed.extend(succeeded);

            if !failures.is_empty() {
                warn!(
                    batch = batch_no,
                    rejected = failures.len(),
                    "Backend rejected records"
                );
                return Err(VectorError::BatchFailure {
                    batch: batch_no,
                    confirmed_ids: confirmed,
                    source: Box::new(VectorError::RecordsRejected { failures }),
                });
            }
        }

        debug!(index = client.index_name(), total, "All batches confirmed");
        Ok(confirmed)
    }
}

/// Match backend results to the submitted actions, preserving action order.
///
/// A key with no result counts as rejected.
pub(crate) fn reconcile(
    actions: &[IndexAction],
    results: Vec<IndexingResult>,
) -> (Vec<String>, Vec<RecordFailure>) {
    let by_key: HashMap<String, IndexingResult> =
        results.into_iter().map(|r| (r.key.clone(), r)).collect();

    let mut succeeded = Vec::with_capacity(actions.len());
    let mut failures = Vec::new();

    for action in actions {
        let key = action.key();
        match by_key.get(key) {
            Some(result) if result.status => succeeded.push(key.to_string()),
            Some(result) => failures.push(RecordFailure {
                id: key.to_string(),
                status: result.status_code,
                message: result.error_message.clone().unwrap_or_default(),
            }),
            None => failures.push(RecordFailure {
                id: key.to_string(),
                status: 0,
                message: "no status returned for document".to_string(),
            }),
        }
    }

    (succeeded, failures)
}
