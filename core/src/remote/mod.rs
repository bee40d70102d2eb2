//! Remote blob store and retrieval service

pub mod batcher;
pub mod http;
pub mod retry;
pub mod stream;

pub use batcher::{upload_batches, UploadReport};
pub use http::HttpRemoteClient;
pub use retry::{with_retry, RetryPolicy};
pub use stream::TagExtractor;

use crate::blob::Blob;
use crate::error::RemoteError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Services the engine needs from the remote side
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Upload blobs; returns the digests the remote now holds for them
    async fn batch_upload(&self, blobs: &[Blob]) -> Result<Vec<String>, RemoteError>;

    /// Run a retrieval query; `None` means nothing relevant was found
    async fn retrieve(&self, request: &RetrievalRequest) -> Result<Option<String>, RemoteError>;

    /// Name used in logs
    fn service_name(&self) -> &str {
        "remote"
    }
}

/// One blob on the upload wire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadBlob {
    pub path: String,
    pub content: String,
}

impl From<&Blob> for UploadBlob {
    fn from(blob: &Blob) -> Self {
        Self {
            path: blob.logical_path.clone(),
            content: blob.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUploadRequest {
    pub blobs: Vec<UploadBlob>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchUploadResponse {
    #[serde(default)]
    pub blob_names: Vec<String>,
}

/// Digest set sent with a retrieval request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobSet {
    #[serde(default)]
    pub checkpoint_id: Option<String>,
    pub added_blobs: Vec<String>,
    #[serde(default)]
    pub deleted_blobs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub information_request: String,
    pub blobs: BlobSet,
    #[serde(default)]
    pub dialog: Vec<serde_json::Value>,
    #[serde(default)]
    pub max_output_length: usize,
    #[serde(default)]
    pub disable_codebase_retrieval: bool,
    #[serde(default)]
    pub enable_commit_retrieval: bool,
}

impl RetrievalRequest {
    /// Build a request carrying the full current digest set
    pub fn new(information_request: impl Into<String>, added_blobs: Vec<String>) -> Self {
        Self {
            information_request: information_request.into(),
            blobs: BlobSet {
                checkpoint_id: None,
                added_blobs,
                deleted_blobs: Vec::new(),
            },
            dialog: Vec::new(),
            max_output_length: 0,
            disable_codebase_retrieval: false,
            enable_commit_retrieval: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalResponse {
    #[serde(default)]
    pub formatted_retrieval: Option<String>,
}
