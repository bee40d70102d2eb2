//! Watch the project and reindex changed files

use super::Engine;
use crate::config::CliConfigLoader;
use crate::output::{print_outcome, IndexProgressBar};
use anyhow::{anyhow, Context, Result};
use ctxsync_core::index::INDEX_DIR_NAME;
use ctxsync_core::scheduler::ScheduledRun;
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Index the project once, then reindex each file shortly after it changes
pub async fn watch_command(loader: CliConfigLoader, project: PathBuf) -> Result<()> {
    let engine = Engine::load(&loader, &project).await?;
    let root = engine.reconciler().root().to_path_buf();

    let mut progress = IndexProgressBar::new();
    let initial = engine.scheduler.try_index_project(&mut progress).await;
    progress.finish();
    let outcome = initial.ok_or_else(|| anyhow!("Indexing is already in progress"))??;
    print_outcome(&outcome);

    let (event_tx, mut event_rx) = mpsc::channel(1024);
    let _watcher = create_fs_watcher(&root, event_tx)?;
    let mut results = engine.scheduler.subscribe();

    println!("Watching {} (Ctrl-C to stop)", root.display());
    loop {
        tokio::select! {
            Some(event) = event_rx.recv() => {
                for path in changed_paths(&root, event) {
                    debug!("Change detected: {}", path.display());
                    engine.scheduler.schedule_file(path);
                }
            }
            result = results.recv() => match result {
                Ok(ScheduledRun { path, outcome }) => {
                    let shown = path.strip_prefix(&root).unwrap_or(&path);
                    println!("{}", shown.display());
                    print_outcome(&outcome);
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Missed {} reindex results", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Stopping watcher");
                break;
            }
        }
    }

    Ok(())
}

fn create_fs_watcher(
    root: &Path,
    sender: mpsc::Sender<notify::Result<Event>>,
) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = sender.blocking_send(res);
        },
        NotifyConfig::default(),
    )
    .context("Failed to start file watcher")?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;
    Ok(watcher)
}

/// Files touched by an event, minus anything inside the index directory
fn changed_paths(root: &Path, event: notify::Result<Event>) -> Vec<PathBuf> {
    let event = match event {
        Ok(event) => event,
        Err(e) => {
            warn!("Watcher error: {}", e);
            return Vec::new();
        }
    };

    if !matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    ) {
        return Vec::new();
    }

    let index_dir = root.join(INDEX_DIR_NAME);
    event
        .paths
        .into_iter()
        .filter(|path| !path.starts_with(&index_dir))
        .collect()
}
