//! Prompt enhancement command

use super::Engine;
use crate::config::CliConfigLoader;
use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

/// Rewrite a prompt using the committed index as context
pub async fn enhance_command(
    loader: CliConfigLoader,
    project: PathBuf,
    prompt: &str,
) -> Result<()> {
    let engine = Engine::load(&loader, &project).await?;

    let store = engine.reconciler().load_index().await;
    if store.is_empty() {
        eprintln!(
            "{}",
            "Project is not indexed; enhancing without codebase context.".yellow()
        );
    }
    debug!("Enhancing prompt with {} blobs", store.blob_count());

    let enhanced = engine
        .remote
        .enhance_prompt(prompt, store.blob_name_list())
        .await?;
    println!("{}", enhanced);
    Ok(())
}
