//! Configuration for the ctxsync engine
//!
//! Only exports pure data types. All discovery and loading logic is in the CLI layer.

pub mod types;

pub use types::{EngineConfig, DEFAULT_EXCLUDE_PATTERNS, DEFAULT_TEXT_EXTENSIONS};
