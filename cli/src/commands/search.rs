//! Codebase retrieval command

use super::Engine;
use crate::config::CliConfigLoader;
use anyhow::Result;
use ctxsync_core::QueryClient;
use std::path::PathBuf;

pub async fn search_command(loader: CliConfigLoader, project: PathBuf, query: &str) -> Result<()> {
    let engine = Engine::load(&loader, &project).await?;
    let client = QueryClient::new(engine.scheduler.clone(), &engine.config);

    let result = client.search(query).await?;
    println!("{}", result);
    Ok(())
}
