//! Local index status

use crate::output::print_status;
use anyhow::Result;
use ctxsync_core::IndexStoreFile;
use std::path::PathBuf;

/// Print counts from the index document; needs no remote configuration
pub async fn status_command(project: PathBuf) -> Result<()> {
    let project = project.canonicalize().unwrap_or(project);
    let store_file = IndexStoreFile::for_project(&project);
    let store = store_file.load().await;

    print_status(&project, store_file.path(), &store);
    Ok(())
}
