//! Local index state and reconciliation against the remote blob store

pub mod outcome;
pub mod progress;
pub mod reconciler;
pub mod store;

pub use outcome::{IndexOutcome, IndexStats, IndexStatus};
pub use progress::{IndexProgress, ProgressSink};
pub use reconciler::Reconciler;
pub use store::{IndexStore, IndexStoreFile, INDEX_DIR_NAME, INDEX_FILE_NAME, INDEX_FORMAT_VERSION};
