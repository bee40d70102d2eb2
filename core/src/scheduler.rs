//! Single-flight and debounced scheduling of index runs
//!
//! The index document is read at the start of a run and rewritten at the end, so two runs
//! against one project would race. The scheduler drops any trigger that arrives while a run
//! is in flight and coalesces bursts of per-file triggers into one run after a quiet period.

use crate::error::Result;
use crate::index::{IndexOutcome, ProgressSink, Reconciler};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default quiet period before a changed file is reindexed
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(1);

/// Result of a debounced file run
#[derive(Debug, Clone)]
pub struct ScheduledRun {
    pub path: PathBuf,
    pub outcome: IndexOutcome,
}

/// Clears the in-flight flag when the run ends, including on early return
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct IndexScheduler {
    reconciler: Arc<Reconciler>,
    in_flight: AtomicBool,
    debounce: Duration,
    /// Latest trigger generation per path; a timer only fires if it is still the latest
    generations: Mutex<HashMap<PathBuf, u64>>,
    results: broadcast::Sender<ScheduledRun>,
}

impl IndexScheduler {
    pub fn new(reconciler: Arc<Reconciler>) -> Self {
        let (results, _) = broadcast::channel(64);
        Self {
            reconciler,
            in_flight: AtomicBool::new(false),
            debounce: DEFAULT_DEBOUNCE,
            generations: Mutex::new(HashMap::new()),
            results,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    pub fn is_indexing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Receive outcomes of debounced file runs
    pub fn subscribe(&self) -> broadcast::Receiver<ScheduledRun> {
        self.results.subscribe()
    }

    fn acquire(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard(&self.in_flight))
    }

    /// Run a full reindex unless one is already running; `None` means the trigger was dropped
    pub async fn try_index_project(
        &self,
        progress: &mut dyn ProgressSink,
    ) -> Option<Result<IndexOutcome>> {
        let Some(_guard) = self.acquire() else {
            debug!("Indexing already in progress; project trigger dropped");
            return None;
        };
        Some(self.reconciler.index_project(progress).await)
    }

    /// Reindex one file unless a run is already in flight; `None` means the trigger was dropped
    pub async fn try_index_file(
        &self,
        path: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Option<Result<IndexOutcome>> {
        let Some(_guard) = self.acquire() else {
            debug!(
                "Indexing already in progress; trigger for {} dropped",
                path.display()
            );
            return None;
        };
        Some(self.reconciler.index_file(path, progress).await)
    }

    /// Reindex `path` once no further trigger for it arrived during the debounce period.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule_file(self: &Arc<Self>, path: impl Into<PathBuf>) {
        let path = path.into();
        let generation = {
            let mut generations = match self.generations.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            let entry = generations.entry(path.clone()).or_insert(0);
            *entry += 1;
            *entry
        };

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(scheduler.debounce).await;
            if !scheduler.take_if_latest(&path, generation) {
                return;
            }

            let outcome = match scheduler.try_index_file(&path, &mut ()).await {
                Some(Ok(outcome)) => outcome,
                Some(Err(e)) => {
                    warn!("Reindexing {} failed: {}", path.display(), e);
                    IndexOutcome::error(e.to_string(), Default::default())
                }
                None => return,
            };

            // No subscribers is fine
            let _ = scheduler.results.send(ScheduledRun { path, outcome });
        });
    }

    /// Whether `generation` is still the newest trigger for `path`; if so the entry is cleared
    fn take_if_latest(&self, path: &Path, generation: u64) -> bool {
        let mut generations = match self.generations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if generations.get(path) == Some(&generation) {
            generations.remove(path);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexProgress, IndexStatus};
    use crate::test_support::{test_config, write_file, FakeRemote};
    use tempfile::TempDir;

    fn scheduler(root: &Path, debounce: Duration) -> (Arc<IndexScheduler>, Arc<FakeRemote>) {
        let remote = Arc::new(FakeRemote::new());
        let reconciler = Arc::new(Reconciler::new(root, &test_config(), remote.clone()));
        let scheduler = IndexScheduler::new(reconciler).with_debounce(debounce);
        (Arc::new(scheduler), remote)
    }

    #[tokio::test]
    async fn test_index_project_releases_flag() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.py", "a\n");
        let (scheduler, _remote) = scheduler(temp_dir.path(), DEFAULT_DEBOUNCE);

        let outcome = scheduler.try_index_project(&mut ()).await.unwrap().unwrap();
        assert_eq!(outcome.status, IndexStatus::Success);
        assert!(!scheduler.is_indexing());

        // A second run is accepted once the first finished
        assert!(scheduler.try_index_project(&mut ()).await.is_some());
    }

    #[tokio::test]
    async fn test_trigger_during_run_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.py", "a\n");
        let (scheduler, _remote) = scheduler(temp_dir.path(), DEFAULT_DEBOUNCE);

        let inner = Arc::clone(&scheduler);
        let mut dropped = Vec::new();
        let mut sink = |event: IndexProgress| {
            if event == IndexProgress::Collecting {
                dropped.push(inner.in_flight.load(Ordering::Acquire));
            }
        };
        scheduler.try_index_project(&mut sink).await.unwrap().unwrap();
        assert_eq!(dropped, vec![true]);

        let _guard = scheduler.acquire().unwrap();
        assert!(scheduler.try_index_project(&mut ()).await.is_none());
        assert!(scheduler
            .try_index_file(Path::new("a.py"), &mut ())
            .await
            .is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_triggers_runs_once() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.py", "a\n");
        let (scheduler, remote) = scheduler(temp_dir.path(), Duration::from_millis(500));
        let mut results = scheduler.subscribe();

        for _ in 0..5 {
            scheduler.schedule_file(temp_dir.path().join("a.py"));
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        let run = results.recv().await.unwrap();
        assert!(run.path.ends_with("a.py"));
        assert_eq!(run.outcome.status, IndexStatus::Success);
        assert_eq!(remote.upload_calls(), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(results.try_recv().is_err());
        assert_eq!(remote.upload_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_files_are_debounced_separately() {
        let temp_dir = TempDir::new().unwrap();
        write_file(temp_dir.path(), "a.py", "a\n");
        write_file(temp_dir.path(), "b.py", "b\n");
        let (scheduler, _remote) = scheduler(temp_dir.path(), Duration::from_millis(200));
        let mut results = scheduler.subscribe();

        scheduler.schedule_file(temp_dir.path().join("a.py"));
        let first = results.recv().await.unwrap();
        scheduler.schedule_file(temp_dir.path().join("b.py"));
        let second = results.recv().await.unwrap();
        assert!(first.path.ends_with("a.py"));
        assert!(second.path.ends_with("b.py"));

        let store = scheduler.reconciler().load_index().await;
        assert_eq!(store.file_count(), 2);
    }
}
