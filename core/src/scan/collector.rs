//! Project file collection

use super::{decode_text, IgnoreFilter};
use crate::blob::{split, Blob};
use crate::config::EngineConfig;
use crate::error::Result;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// A decoded project file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Project-relative path with forward slashes
    pub relative_path: String,
    pub content: String,
}

impl SourceFile {
    /// Split this file into blobs
    pub fn into_blobs(self, max_lines: usize) -> Vec<Blob> {
        split(&self.relative_path, &self.content, max_lines)
    }
}

/// Project-relative path with `/` separators, or `None` if `path` is outside `root`
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Walks a project tree and produces decoded text files
pub struct FileCollector {
    root: PathBuf,
    extensions: BTreeSet<String>,
    exclude_patterns: Vec<String>,
    max_lines_per_blob: usize,
}

impl FileCollector {
    /// Create a collector for `root`. The root is canonicalized so symlink escapes can be detected.
    pub fn new(root: &Path, config: &EngineConfig) -> Self {
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        Self {
            root,
            extensions: config.text_extensions.clone(),
            exclude_patterns: config.exclude_patterns.clone(),
            max_lines_per_blob: config.max_lines_per_blob,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build a fresh filter; the ignore file is re-read on every call
    pub fn ignore_filter(&self) -> IgnoreFilter {
        IgnoreFilter::new(&self.root, &self.exclude_patterns)
    }

    /// Whether the file's lower-cased extension is in the allow-list
    pub fn is_allowed_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .is_some_and(|ext| self.extensions.contains(&ext))
    }

    /// Collect every indexable file, split into blobs
    pub async fn collect(&self) -> Result<Vec<Blob>> {
        let files = self.collect_files().await?;
        Ok(files
            .into_iter()
            .flat_map(|file| file.into_blobs(self.max_lines_per_blob))
            .collect())
    }

    /// Collect every indexable file as decoded text, in path order
    pub async fn collect_files(&self) -> Result<Vec<SourceFile>> {
        let filter = self.ignore_filter();
        let mut files = Vec::new();

        for path in self.walk(&filter) {
            if let Some(file) = self.read_source(&path).await {
                files.push(file);
            }
        }

        tracing::debug!(
            "Collected {} files under {}",
            files.len(),
            self.root.display()
        );
        Ok(files)
    }

    /// Candidate file paths, pruning excluded directories
    fn walk(&self, filter: &IgnoreFilter) -> Vec<PathBuf> {
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0
                    || !filter.is_excluded_entry(entry.path(), entry.file_type().is_dir())
            });

        let mut paths = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }

            // Symlinks are resolved later; anything else that is not a file is skipped
            if !entry.file_type().is_file() && !entry.path_is_symlink() {
                continue;
            }

            if self.is_allowed_extension(entry.path()) {
                paths.push(entry.into_path());
            }
        }
        paths
    }

    /// Read and decode one file. Returns `None` for anything that is not a readable
    /// regular file inside the project root.
    pub async fn read_source(&self, path: &Path) -> Option<SourceFile> {
        let resolved = match tokio::fs::canonicalize(path).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                return None;
            }
        };

        if !resolved.starts_with(&self.root) {
            tracing::debug!("Skipping {}: resolves outside the project", path.display());
            return None;
        }

        match tokio::fs::metadata(&resolved).await {
            Ok(metadata) if metadata.is_file() => {}
            _ => return None,
        }

        let relative_path = relative_path(&self.root, path)?;

        let bytes = match tokio::fs::read(&resolved).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path.display(), e);
                return None;
            }
        };

        Some(SourceFile {
            relative_path,
            content: decode_text(&bytes),
        })
    }
}
