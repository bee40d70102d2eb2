//! Full-project and single-file index reconciliation
//!
//! A run reads the index once, diffs freshly hashed blobs against it, uploads only
//! what the remote store lacks, and writes a complete new snapshot once at the end.
//! Runs against the same project must not overlap; see [`crate::scheduler`].

use super::{IndexOutcome, IndexProgress, IndexStats, IndexStore, IndexStoreFile, ProgressSink};
use crate::blob::HashedBlob;
use crate::config::EngineConfig;
use crate::error::{IndexError, Result};
use crate::remote::{upload_batches, RemoteService, RetryPolicy, UploadReport};
use crate::scan::{relative_path, FileCollector};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Blobs of a scan, grouped per file and partitioned against the current index
struct Diff {
    /// Ordered digests per file
    candidate: BTreeMap<String, Vec<String>>,
    /// Digests already known to the remote store
    existing: HashSet<String>,
    /// Blobs to upload, unique by digest
    new: Vec<HashedBlob>,
    stats: IndexStats,
}

impl Diff {
    fn compute(files: Vec<(String, Vec<HashedBlob>)>, previous: &IndexStore) -> Self {
        let mut diff = Diff {
            candidate: BTreeMap::new(),
            existing: HashSet::new(),
            new: Vec::new(),
            stats: IndexStats::default(),
        };
        let mut queued = HashSet::new();

        for (path, blobs) in files {
            diff.candidate
                .insert(path, blobs.iter().map(|b| b.digest.clone()).collect());

            for hashed in blobs {
                diff.stats.total += 1;
                if previous.contains_blob(&hashed.digest) {
                    diff.stats.existing += 1;
                    diff.existing.insert(hashed.digest);
                } else if queued.insert(hashed.digest.clone()) {
                    diff.new.push(hashed);
                }
            }
        }

        diff.stats.new = diff.new.len();
        diff
    }
}

/// Keeps a project's index consistent with the remote blob store
pub struct Reconciler {
    collector: FileCollector,
    store: IndexStoreFile,
    remote: Arc<dyn RemoteService>,
    retry: RetryPolicy,
    batch_size: usize,
    max_lines_per_blob: usize,
}

impl Reconciler {
    pub fn new(root: &Path, config: &EngineConfig, remote: Arc<dyn RemoteService>) -> Self {
        let collector = FileCollector::new(root, config);
        let store = IndexStoreFile::for_project(collector.root());
        Self {
            collector,
            store,
            remote,
            retry: RetryPolicy::from_config(config),
            batch_size: config.batch_size,
            max_lines_per_blob: config.max_lines_per_blob,
        }
    }

    /// Use a different index document location
    pub fn with_store_file(mut self, store: IndexStoreFile) -> Self {
        self.store = store;
        self
    }

    /// Canonical project root
    pub fn root(&self) -> &Path {
        self.collector.root()
    }

    pub fn store_file(&self) -> &IndexStoreFile {
        &self.store
    }

    pub fn remote(&self) -> &Arc<dyn RemoteService> {
        &self.remote
    }

    /// Current committed index
    pub async fn load_index(&self) -> IndexStore {
        self.store.load().await
    }

    fn hash_file(&self, relative_path: &str, content: &str) -> Vec<HashedBlob> {
        crate::blob::split(relative_path, content, self.max_lines_per_blob)
            .into_iter()
            .map(HashedBlob::from)
            .collect()
    }

    async fn upload(&self, blobs: &[HashedBlob], progress: &mut dyn ProgressSink) -> UploadReport {
        if blobs.is_empty() {
            return UploadReport::default();
        }
        upload_batches(
            self.remote.as_ref(),
            blobs,
            self.batch_size,
            &self.retry,
            progress,
        )
        .await
    }

    /// Reindex every file in the project.
    ///
    /// Commits whatever was uploaded even when some batches fail, except on a run with
    /// nothing previously uploaded where every batch failed. Only a failed index write
    /// is returned as `Err`.
    pub async fn index_project(&self, progress: &mut dyn ProgressSink) -> Result<IndexOutcome> {
        info!(
            "Indexing project {} against {}",
            self.root().display(),
            self.remote.service_name()
        );

        // collecting
        progress.progress(IndexProgress::Collecting);
        let files = self.collector.collect_files().await?;
        if files.is_empty() {
            warn!("No indexable files under {}", self.root().display());
            return Ok(IndexOutcome::error(
                IndexError::NoFilesFound.to_string(),
                IndexStats::default(),
            ));
        }

        // hashing
        let file_count = files.len();
        let hashed: Vec<(String, Vec<HashedBlob>)> = files
            .into_iter()
            .map(|file| {
                let blobs = self.hash_file(&file.relative_path, &file.content);
                (file.relative_path, blobs)
            })
            .collect();
        let blob_count = hashed.iter().map(|(_, blobs)| blobs.len()).sum();
        progress.progress(IndexProgress::Collected {
            files: file_count,
            blobs: blob_count,
        });

        // diffing
        let previous = self.store.load().await;
        let diff = Diff::compute(hashed, &previous);
        let mut stats = diff.stats;
        progress.progress(IndexProgress::Diffed {
            existing: stats.existing,
            new: stats.new,
        });
        debug!(
            "Diffed {} blobs: {} existing, {} new",
            stats.total, stats.existing, stats.new
        );

        // uploading
        let report = self.upload(&diff.new, progress).await;
        stats.uploaded = report.uploaded.len();
        stats.failed_batches = report.failed_batches.len();

        if diff.existing.is_empty() && report.all_failed() {
            let reason = report
                .last_error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default();
            warn!("Every upload batch failed; index left unchanged");
            return Ok(IndexOutcome::error(
                format!(
                    "{} {}",
                    IndexError::AllBatchesFailed {
                        batches: report.total_batches
                    },
                    reason
                )
                .trim_end()
                .to_string(),
                stats,
            ));
        }

        // committing
        let mut available = diff.existing;
        available.extend(report.uploaded.iter().cloned());

        let candidate_files = diff.candidate.len();
        let file_map: BTreeMap<String, Vec<String>> = diff
            .candidate
            .into_iter()
            .filter(|(path, digests)| {
                let complete = digests.iter().all(|d| available.contains(d));
                if !complete {
                    debug!("Leaving {} out of the index: upload incomplete", path);
                }
                complete
            })
            .collect();
        let indexed_files = file_map.len();

        let store = IndexStore::from_file_map(file_map);
        self.store.save(&store).await?;
        progress.progress(IndexProgress::Committed {
            files: store.file_count(),
            blobs: store.blob_count(),
        });

        info!(
            "Committed index: {} files, {} blobs ({} existing, {} uploaded, {} failed batches)",
            store.file_count(),
            store.blob_count(),
            stats.existing,
            stats.uploaded,
            stats.failed_batches
        );

        if report.has_failures() {
            let reason = report
                .last_error
                .as_ref()
                .map(|e| format!(": {}", e))
                .unwrap_or_default();
            Ok(IndexOutcome::partial(
                format!(
                    "Indexed {} of {} files; {} of {} upload batches failed{}",
                    indexed_files,
                    candidate_files,
                    report.failed_batches.len(),
                    report.total_batches,
                    reason
                ),
                stats,
            ))
        } else {
            Ok(IndexOutcome::success(
                format!(
                    "Indexed {} files ({} blobs: {} existing, {} new)",
                    indexed_files, stats.total, stats.existing, stats.new
                ),
                stats,
            ))
        }
    }

    /// Reindex a single file after it changed on disk.
    ///
    /// Deleted, excluded and no-longer-allowed files are removed from the index. A file
    /// is only committed once every one of its new blobs has been uploaded.
    pub async fn index_file(
        &self,
        path: &Path,
        progress: &mut dyn ProgressSink,
    ) -> Result<IndexOutcome> {
        let resolved = self.resolve(path).await;
        let Some(relative) = relative_path(self.root(), &resolved) else {
            return Ok(IndexOutcome::skipped(format!(
                "{} is outside the project",
                path.display()
            )));
        };

        let metadata = tokio::fs::metadata(&resolved).await.ok();
        if metadata.as_ref().is_some_and(|m| m.is_dir()) {
            return Ok(IndexOutcome::skipped(format!("{} is a directory", relative)));
        }

        let filter = self.collector.ignore_filter();
        if metadata.is_none()
            || filter.is_excluded_entry(&resolved, false)
            || !self.collector.is_allowed_extension(&resolved)
        {
            return self.remove_file(&relative).await;
        }

        let escapes_root = tokio::fs::canonicalize(&resolved)
            .await
            .map_or(true, |target| !target.starts_with(self.root()));
        if escapes_root {
            debug!("{} resolves outside the project", relative);
            return self.remove_file(&relative).await;
        }

        let Some(file) = self.collector.read_source(&resolved).await else {
            return Ok(IndexOutcome::error(
                format!("Failed to read {}", relative),
                IndexStats::default(),
            ));
        };

        let blobs = self.hash_file(&relative, &file.content);
        let digests: Vec<String> = blobs.iter().map(|b| b.digest.clone()).collect();
        let mut store = self.store.load().await;

        let mut stats = IndexStats {
            total: blobs.len(),
            ..Default::default()
        };

        if store.file_digests(&relative) == Some(digests.as_slice()) {
            stats.existing = stats.total;
            debug!("{} unchanged", relative);
            return Ok(IndexOutcome::success(
                format!("No changes in {}", relative),
                stats,
            ));
        }

        let mut queued = HashSet::new();
        let new: Vec<HashedBlob> = blobs
            .into_iter()
            .filter(|b| !store.contains_blob(&b.digest) && queued.insert(b.digest.clone()))
            .collect();
        stats.new = new.len();
        stats.existing = stats.total - stats.new;
        progress.progress(IndexProgress::Diffed {
            existing: stats.existing,
            new: stats.new,
        });

        let report = self.upload(&new, progress).await;
        stats.uploaded = report.uploaded.len();
        stats.failed_batches = report.failed_batches.len();

        if report.has_failures() {
            let reason = report
                .last_error
                .as_ref()
                .map(|e| format!(": {}", e))
                .unwrap_or_default();
            warn!("Upload failed for {}; index entry left unchanged", relative);
            let failure = IndexError::UploadFailed {
                failed_batches: report.failed_batches.len(),
            };
            return Ok(IndexOutcome::error(
                format!("{} while indexing {}{}", failure, relative, reason),
                stats,
            ));
        }

        store.set_file(relative.clone(), digests);
        self.store.save(&store).await?;
        progress.progress(IndexProgress::Committed {
            files: store.file_count(),
            blobs: store.blob_count(),
        });

        info!(
            "Reindexed {} ({} blobs, {} uploaded)",
            relative, stats.total, stats.uploaded
        );
        Ok(IndexOutcome::success(
            format!("Indexed {} ({} new blobs)", relative, stats.new),
            stats,
        ))
    }

    async fn remove_file(&self, relative: &str) -> Result<IndexOutcome> {
        let mut store = self.store.load().await;
        if !store.remove_file(relative) {
            return Ok(IndexOutcome::success(
                format!("{} is not indexed", relative),
                IndexStats::default(),
            ));
        }

        self.store.save(&store).await?;
        info!("Removed {} from index", relative);
        Ok(IndexOutcome::success(
            format!("Removed {} from index", relative),
            IndexStats::default(),
        ))
    }

    /// Absolute path with its parent directory canonicalized. The file name is kept,
    /// so a symlinked file is keyed by its own path the way a full scan keys it, and a
    /// deleted file still resolves against the canonical root.
    async fn resolve(&self, path: &Path) -> PathBuf {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root().join(path)
        };

        match (absolute.parent(), absolute.file_name()) {
            (Some(parent), Some(name)) => match tokio::fs::canonicalize(parent).await {
                Ok(parent) => parent.join(name),
                Err(_) => absolute,
            },
            _ => absolute,
        }
    }
}
