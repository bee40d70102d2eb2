//! CLI command implementations

pub mod enhance;
pub mod index;
pub mod search;
pub mod status;
pub mod watch;

pub use enhance::enhance_command;
pub use index::{index_command, index_file_command};
pub use search::search_command;
pub use status::status_command;
pub use watch::watch_command;

use crate::config::CliConfigLoader;
use anyhow::{Context, Result};
use ctxsync_core::{EngineConfig, HttpRemoteClient, IndexScheduler, Reconciler};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Engine objects shared by the commands that talk to the remote service
pub struct Engine {
    pub config: EngineConfig,
    pub remote: Arc<HttpRemoteClient>,
    pub scheduler: Arc<IndexScheduler>,
}

impl Engine {
    pub async fn load(loader: &CliConfigLoader, project: &Path) -> Result<Self> {
        let config = loader.load().await?;
        debug!("Using retrieval service at {}", config.trimmed_base_url());

        let remote = Arc::new(
            HttpRemoteClient::new(&config).context("Failed to create the remote client")?,
        );
        let reconciler = Arc::new(Reconciler::new(project, &config, remote.clone()));
        let scheduler = Arc::new(IndexScheduler::new(reconciler));

        Ok(Self {
            config,
            remote,
            scheduler,
        })
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        self.scheduler.reconciler()
    }
}
