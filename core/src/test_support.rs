//! Shared fixtures for engine tests

use crate::blob::Blob;
use crate::config::EngineConfig;
use crate::error::RemoteError;
use crate::remote::{RemoteService, RetrievalRequest};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

/// In-memory remote that echoes digests and can be told to fail
#[derive(Default)]
pub struct FakeRemote {
    /// Logical paths of each upload call, in order
    pub uploads: Mutex<Vec<Vec<String>>>,
    /// Batches containing any of these source paths fail
    pub failing_sources: Mutex<HashSet<String>>,
    pub fail_everything: Mutex<bool>,
    /// Last retrieval request received
    pub last_request: Mutex<Option<RetrievalRequest>>,
    pub retrieval_result: Mutex<Option<String>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_source(&self, path: &str) {
        self.failing_sources.lock().unwrap().insert(path.to_string());
    }

    pub fn set_fail_everything(&self, fail: bool) {
        *self.fail_everything.lock().unwrap() = fail;
    }

    pub fn upload_calls(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn uploaded_paths(&self) -> Vec<String> {
        self.uploads.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl RemoteService for FakeRemote {
    async fn batch_upload(&self, blobs: &[Blob]) -> Result<Vec<String>, RemoteError> {
        self.uploads
            .lock()
            .unwrap()
            .push(blobs.iter().map(|b| b.logical_path.clone()).collect());

        let failing = self.failing_sources.lock().unwrap();
        if *self.fail_everything.lock().unwrap()
            || blobs.iter().any(|b| failing.contains(&b.source_path))
        {
            return Err(RemoteError::Api {
                status: 400,
                message: "rejected".to_string(),
            });
        }

        Ok(blobs.iter().map(Blob::digest).collect())
    }

    async fn retrieve(&self, request: &RetrievalRequest) -> Result<Option<String>, RemoteError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.retrieval_result.lock().unwrap().clone())
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig::new("https://retrieval.example.com", "token")
        .with_text_extensions([".py", ".rs", ".md"])
        .with_retry(1, 1)
}

pub fn numbered_lines(count: usize) -> String {
    (1..=count).map(|n| format!("line {}\n", n)).collect()
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}
