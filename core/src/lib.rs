//! # ctxsync Core
//!
//! Incremental, content-addressed indexing of a project tree against a remote
//! code-retrieval service.
//!
//! Files are split into line-bounded blobs, each addressed by a SHA-256 digest of its
//! logical path and content. A local index records which digests make up each file, so
//! only blobs the remote store has never seen are uploaded. Retrieval queries carry the
//! full set of committed digests.

// Core modules
pub mod blob;
pub mod config;
pub mod error;
pub mod index;
pub mod query;
pub mod remote;
pub mod scan;
pub mod scheduler;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use blob::{digest, split, Blob, HashedBlob};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use index::{
    IndexOutcome, IndexProgress, IndexStats, IndexStatus, IndexStore, IndexStoreFile, Reconciler,
};
pub use query::QueryClient;
pub use remote::{HttpRemoteClient, RemoteService};
pub use scheduler::IndexScheduler;

/// Current version of the ctxsync-core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing on stderr so command output on stdout stays clean
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}
