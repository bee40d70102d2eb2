//! Project scanning: exclusion rules, text decoding and file collection

pub mod collector;
pub mod decode;
pub mod filter;

pub use collector::{relative_path, FileCollector, SourceFile};
pub use decode::decode_text;
pub use filter::{ExcludePattern, IgnoreFilter, IGNORE_FILE_NAME};
