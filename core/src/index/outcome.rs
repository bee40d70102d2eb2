//! Structured results of indexing operations

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatus {
    /// Everything was uploaded and committed
    Success,
    /// Committed, but some upload batches failed
    PartialSuccess,
    /// Nothing was committed
    Error,
    /// The request did not apply (e.g. a path outside the project)
    Skipped,
}

impl IndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexStatus::Success => "success",
            IndexStatus::PartialSuccess => "partial_success",
            IndexStatus::Error => "error",
            IndexStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for IndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Blob counts for one indexing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Blobs produced from the scanned files
    pub total: usize,
    /// Blobs already known to the remote store
    pub existing: usize,
    /// Blobs that needed uploading
    pub new: usize,
    /// New blobs confirmed by the remote store
    pub uploaded: usize,
    pub failed_batches: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub status: IndexStatus,
    pub message: String,
    pub stats: IndexStats,
}

impl IndexOutcome {
    pub fn success(message: impl Into<String>, stats: IndexStats) -> Self {
        Self {
            status: IndexStatus::Success,
            message: message.into(),
            stats,
        }
    }

    pub fn partial(message: impl Into<String>, stats: IndexStats) -> Self {
        Self {
            status: IndexStatus::PartialSuccess,
            message: message.into(),
            stats,
        }
    }

    pub fn error(message: impl Into<String>, stats: IndexStats) -> Self {
        Self {
            status: IndexStatus::Error,
            message: message.into(),
            stats,
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: IndexStatus::Skipped,
            message: message.into(),
            stats: IndexStats::default(),
        }
    }

    /// Whether the run committed a new snapshot (fully or partially)
    pub fn is_committed(&self) -> bool {
        matches!(
            self.status,
            IndexStatus::Success | IndexStatus::PartialSuccess
        )
    }
}

impl fmt::Display for IndexOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.message)
    }
}
