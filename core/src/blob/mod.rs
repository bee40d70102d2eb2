//! Content-addressed blobs: splitting file content and computing digests

pub mod hasher;
pub mod splitter;

pub use hasher::digest;
pub use splitter::{split, split_lines};

use serde::{Deserialize, Serialize};

/// An immutable content unit derived from a whole file or a slice of one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    /// Path the digest is computed over; `path#chunk{i}of{n}` for split files
    pub logical_path: String,

    /// Exact slice of the source file, line terminators included
    pub content: String,

    /// Project-relative path of the owning file
    pub source_path: String,
}

impl Blob {
    pub fn new(
        logical_path: impl Into<String>,
        content: impl Into<String>,
        source_path: impl Into<String>,
    ) -> Self {
        Self {
            logical_path: logical_path.into(),
            content: content.into(),
            source_path: source_path.into(),
        }
    }

    /// Content address of this blob
    pub fn digest(&self) -> String {
        digest(&self.logical_path, &self.content)
    }
}

/// A blob paired with its precomputed digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashedBlob {
    pub blob: Blob,
    pub digest: String,
}

impl From<Blob> for HashedBlob {
    fn from(blob: Blob) -> Self {
        let digest = blob.digest();
        Self { blob, digest }
    }
}
