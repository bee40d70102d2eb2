//! Batched blob upload with per-batch verification

use super::{with_retry, RemoteService, RetryPolicy};
use crate::blob::{Blob, HashedBlob};
use crate::error::RemoteError;
use crate::index::{IndexProgress, ProgressSink};
use std::collections::HashSet;

/// Outcome of uploading a list of new blobs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReport {
    /// Digests confirmed by the remote, in upload order
    pub uploaded: Vec<String>,
    /// Indices of batches that failed
    pub failed_batches: Vec<usize>,
    pub total_batches: usize,
    /// Error from the most recent failed batch
    pub last_error: Option<RemoteError>,
}

impl UploadReport {
    pub fn all_failed(&self) -> bool {
        self.total_batches > 0 && self.failed_batches.len() == self.total_batches
    }

    pub fn has_failures(&self) -> bool {
        !self.failed_batches.is_empty()
    }
}

/// Upload `blobs` in consecutive batches of at most `batch_size`.
///
/// A batch only counts as uploaded when the remote returns exactly the expected digest
/// set. Every batch is attempted; a failed batch never stops later ones.
pub async fn upload_batches(
    remote: &dyn RemoteService,
    blobs: &[HashedBlob],
    batch_size: usize,
    retry: &RetryPolicy,
    progress: &mut dyn ProgressSink,
) -> UploadReport {
    let batches: Vec<&[HashedBlob]> = blobs.chunks(batch_size.max(1)).collect();
    let mut report = UploadReport {
        total_batches: batches.len(),
        ..Default::default()
    };

    for (index, batch) in batches.iter().enumerate() {
        progress.progress(IndexProgress::Uploading {
            batch: index + 1,
            total_batches: report.total_batches,
        });

        match upload_one(remote, batch, retry).await {
            Ok(()) => {
                tracing::info!(
                    "Uploaded batch {}/{} ({} blobs)",
                    index + 1,
                    report.total_batches,
                    batch.len()
                );
                report
                    .uploaded
                    .extend(batch.iter().map(|hashed| hashed.digest.clone()));
            }
            Err(err) => {
                tracing::warn!(
                    "Batch {}/{} failed: {}",
                    index + 1,
                    report.total_batches,
                    err
                );
                report.failed_batches.push(index);
                report.last_error = Some(err);
            }
        }
    }

    report
}

async fn upload_one(
    remote: &dyn RemoteService,
    batch: &[HashedBlob],
    retry: &RetryPolicy,
) -> Result<(), RemoteError> {
    let payload: Vec<Blob> = batch.iter().map(|hashed| hashed.blob.clone()).collect();
    let returned = with_retry(retry, "batch upload", || remote.batch_upload(&payload)).await?;

    let expected: HashSet<&str> = batch.iter().map(|hashed| hashed.digest.as_str()).collect();
    let actual: HashSet<&str> = returned.iter().map(String::as_str).collect();

    if returned.len() != expected.len() || actual != expected {
        return Err(RemoteError::Protocol {
            message: format!(
                "remote returned {} digests that do not match the {} uploaded blobs",
                returned.len(),
                expected.len()
            ),
        });
    }

    Ok(())
}
