//! Codebase retrieval against the committed index

use crate::config::EngineConfig;
use crate::error::{ConfigError, Error, Result};
use crate::index::IndexStatus;
use crate::remote::{with_retry, RemoteService, RetrievalRequest, RetryPolicy};
use crate::scheduler::IndexScheduler;
use std::sync::Arc;
use tracing::info;

/// Returned when the remote has nothing relevant for a query
pub const NO_RESULTS_MESSAGE: &str = "No relevant code context found for this query.";

/// Submits retrieval queries carrying the project's full digest set
pub struct QueryClient {
    scheduler: Arc<IndexScheduler>,
    remote: Arc<dyn RemoteService>,
    retry: RetryPolicy,
    guidance: Option<String>,
}

impl QueryClient {
    pub fn new(scheduler: Arc<IndexScheduler>, config: &EngineConfig) -> Self {
        let remote = Arc::clone(scheduler.reconciler().remote());
        let guidance = Some(config.guidance.trim())
            .filter(|g| !g.is_empty())
            .map(str::to_string);
        Self {
            scheduler,
            remote,
            retry: RetryPolicy::from_config(config),
            guidance,
        }
    }

    /// Search the codebase for context relevant to `query`.
    ///
    /// A project that was never indexed is indexed first. An empty answer from the remote is
    /// reported as [`NO_RESULTS_MESSAGE`], not as an error.
    pub async fn search(&self, query: &str) -> Result<String> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "query".to_string(),
                value: "query must not be empty".to_string(),
            }
            .into());
        }

        let reconciler = self.scheduler.reconciler();
        let mut store = reconciler.load_index().await;
        if store.is_empty() {
            info!("No index for {}; indexing first", reconciler.root().display());
            let outcome = self
                .scheduler
                .try_index_project(&mut ())
                .await
                .ok_or_else(|| {
                    Error::Generic(
                        "Indexing is already in progress; try the search again when it finishes"
                            .to_string(),
                    )
                })??;

            if outcome.status == IndexStatus::Error {
                return Err(Error::Generic(outcome.message));
            }
            store = reconciler.load_index().await;
        }

        let request = RetrievalRequest::new(self.request_text(query), store.blob_name_list());
        info!(
            "Searching with {} blobs: {}",
            request.blobs.added_blobs.len(),
            query
        );

        let result = with_retry(&self.retry, "codebase retrieval", || {
            self.remote.retrieve(&request)
        })
        .await?;

        Ok(result
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| NO_RESULTS_MESSAGE.to_string()))
    }

    fn request_text(&self, query: &str) -> String {
        match &self.guidance {
            Some(guidance) => format!("{}\n\n{}", query, guidance),
            None => query.to_string(),
        }
    }
}
