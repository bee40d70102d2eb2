//! Durable file → blob digest ledger

use crate::error::{IndexError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Hidden directory under the project root holding local state
pub const INDEX_DIR_NAME: &str = ".ctxsync";

/// Index document file name inside [`INDEX_DIR_NAME`]
pub const INDEX_FILE_NAME: &str = "index.json";

/// Current index document format
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Mapping from project files to the ordered digests they decompose into.
///
/// `blob_names` is always the union of every digest list in `file_map`; any
/// mutation made through this type restores that before returning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStore {
    pub version: u32,
    pub blob_names: BTreeSet<String>,
    #[serde(default)]
    pub file_map: BTreeMap<String, Vec<String>>,
}

impl IndexStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            version: INDEX_FORMAT_VERSION,
            blob_names: BTreeSet::new(),
            file_map: BTreeMap::new(),
        }
    }

    /// Build a store whose digest set is derived from `file_map`
    pub fn from_file_map(file_map: BTreeMap<String, Vec<String>>) -> Self {
        let mut store = Self {
            version: INDEX_FORMAT_VERSION,
            blob_names: BTreeSet::new(),
            file_map,
        };
        store.recompute_blob_names();
        store
    }

    pub fn is_empty(&self) -> bool {
        self.blob_names.is_empty()
    }

    pub fn contains_blob(&self, digest: &str) -> bool {
        self.blob_names.contains(digest)
    }

    /// Digests currently recorded for a file
    pub fn file_digests(&self, relative_path: &str) -> Option<&[String]> {
        self.file_map.get(relative_path).map(Vec::as_slice)
    }

    /// Replace one file's digests
    pub fn set_file(&mut self, relative_path: impl Into<String>, digests: Vec<String>) {
        self.file_map.insert(relative_path.into(), digests);
        self.recompute_blob_names();
    }

    /// Drop one file; returns whether it was present
    pub fn remove_file(&mut self, relative_path: &str) -> bool {
        let removed = self.file_map.remove(relative_path).is_some();
        if removed {
            self.recompute_blob_names();
        }
        removed
    }

    /// Rebuild `blob_names` as the union of all file digests
    pub fn recompute_blob_names(&mut self) {
        self.blob_names = self.file_map.values().flatten().cloned().collect();
    }

    /// Whether `blob_names` matches the digests referenced by `file_map`
    pub fn is_consistent(&self) -> bool {
        let referenced: BTreeSet<&String> = self.file_map.values().flatten().collect();
        referenced.len() == self.blob_names.len()
            && referenced.iter().all(|d| self.blob_names.contains(*d))
    }

    pub fn file_count(&self) -> usize {
        self.file_map.len()
    }

    pub fn blob_count(&self) -> usize {
        self.blob_names.len()
    }

    /// All known digests, sorted
    pub fn blob_name_list(&self) -> Vec<String> {
        self.blob_names.iter().cloned().collect()
    }
}

impl Default for IndexStore {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk shapes accepted when loading
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredIndex {
    Current(IndexStore),
    /// Older releases persisted a bare digest array
    Legacy(Vec<String>),
}

/// Persistence for an [`IndexStore`] at `<project>/.ctxsync/index.json`
#[derive(Debug, Clone)]
pub struct IndexStoreFile {
    path: PathBuf,
}

impl IndexStoreFile {
    /// Store file for a project root
    pub fn for_project(root: &Path) -> Self {
        Self {
            path: root.join(INDEX_DIR_NAME).join(INDEX_FILE_NAME),
        }
    }

    /// Store file at an explicit location
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store. Missing or malformed documents yield an empty store.
    pub async fn load(&self) -> IndexStore {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return IndexStore::new(),
            Err(e) => {
                tracing::warn!(
                    "Failed to read index at {}, starting empty: {}",
                    self.path.display(),
                    e
                );
                return IndexStore::new();
            }
        };

        match parse_index(&content) {
            Some(store) => store,
            None => {
                tracing::warn!(
                    "Index at {} is malformed, starting empty",
                    self.path.display()
                );
                IndexStore::new()
            }
        }
    }

    /// Atomically replace the document with `store`
    pub async fn save(&self, store: &IndexStore) -> Result<()> {
        let json = serde_json::to_string_pretty(store)?;
        let path = self.path.clone();

        let written = tokio::task::spawn_blocking(move || write_atomic(&path, json.as_bytes()))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));

        match written.and_then(|inner| inner) {
            Ok(()) => {
                tracing::debug!(
                    "Saved index with {} files and {} blobs to {}",
                    store.file_count(),
                    store.blob_count(),
                    self.path.display()
                );
                Ok(())
            }
            Err(source) => Err(IndexError::Persist {
                path: self.path.clone(),
                source,
            }
            .into()),
        }
    }
}

fn parse_index(content: &str) -> Option<IndexStore> {
    match serde_json::from_str::<StoredIndex>(content).ok()? {
        StoredIndex::Current(store) if store.version == INDEX_FORMAT_VERSION => Some(store),
        StoredIndex::Current(store) => {
            tracing::warn!("Unsupported index version {}", store.version);
            None
        }
        StoredIndex::Legacy(blob_names) => Some(IndexStore {
            version: INDEX_FORMAT_VERSION,
            blob_names: blob_names.into_iter().collect(),
            file_map: Default::default(),
        }),
    }
}

/// Write to a sibling temp file, then rename over the target
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
