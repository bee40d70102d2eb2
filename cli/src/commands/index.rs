//! Full-project and single-file indexing commands

use super::Engine;
use crate::config::CliConfigLoader;
use crate::output::{print_outcome, IndexProgressBar};
use anyhow::{anyhow, Result};
use ctxsync_core::IndexOutcome;
use std::path::{Path, PathBuf};
use tracing::info;

/// Index every file in the project
pub async fn index_command(loader: CliConfigLoader, project: PathBuf) -> Result<()> {
    let engine = Engine::load(&loader, &project).await?;
    info!("Indexing {}", engine.reconciler().root().display());

    let mut progress = IndexProgressBar::new();
    let result = engine.scheduler.try_index_project(&mut progress).await;
    progress.finish();

    let outcome = result.ok_or_else(|| anyhow!("Indexing is already in progress"))??;
    report(outcome)
}

/// Reindex one file
pub async fn index_file_command(
    loader: CliConfigLoader,
    project: PathBuf,
    path: &Path,
) -> Result<()> {
    let engine = Engine::load(&loader, &project).await?;

    let mut progress = IndexProgressBar::new();
    let result = engine.scheduler.try_index_file(path, &mut progress).await;
    progress.finish();

    let outcome = result.ok_or_else(|| anyhow!("Indexing is already in progress"))??;
    report(outcome)
}

fn report(outcome: IndexOutcome) -> Result<()> {
    print_outcome(&outcome);
    if outcome.status == ctxsync_core::IndexStatus::Error {
        return Err(anyhow!("Indexing failed"));
    }
    Ok(())
}
