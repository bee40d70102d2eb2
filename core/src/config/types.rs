//! Engine configuration types
//!
//! Core only accepts fully resolved, validated configuration.
//! Every optional field has a default that is applied once, at construction.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Default number of blobs sent per upload request
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default line threshold above which a file is split into chunks
pub const DEFAULT_MAX_LINES_PER_BLOB: usize = 800;

/// Extensions indexed when the configuration does not name any
pub const DEFAULT_TEXT_EXTENSIONS: &[&str] = &[
    ".rs", ".py", ".js", ".jsx", ".ts", ".tsx", ".mjs", ".cjs", ".vue", ".svelte", ".go", ".java",
    ".kt", ".kts", ".scala", ".c", ".h", ".cc", ".cpp", ".cxx", ".hpp", ".cs", ".swift", ".m",
    ".mm", ".rb", ".php", ".lua", ".dart", ".r", ".jl", ".ex", ".exs", ".erl", ".hs", ".ml",
    ".clj", ".sh", ".bash", ".zsh", ".ps1", ".bat", ".sql", ".graphql", ".proto", ".html", ".htm",
    ".css", ".scss", ".sass", ".less", ".json", ".yaml", ".yml", ".toml", ".ini", ".cfg", ".conf",
    ".xml", ".md", ".mdx", ".rst", ".txt", ".gradle", ".cmake", ".makefile", ".dockerfile",
];

/// Glob patterns excluded when the configuration does not name any
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    ".git",
    ".svn",
    ".hg",
    ".ctxsync",
    "node_modules",
    "target",
    "dist",
    "build",
    "out",
    "__pycache__",
    "*.pyc",
    ".venv",
    "venv",
    ".idea",
    ".vscode",
    "*.min.js",
    "*.min.css",
    "*.lock",
    "*.log",
    ".DS_Store",
];

/// A fully resolved engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the remote retrieval service
    pub base_url: String,
    /// Bearer token for the remote service
    pub api_token: String,
    /// Maximum number of blobs per upload request
    pub batch_size: usize,
    /// Files with more lines than this are split into chunks
    pub max_lines_per_blob: usize,
    /// Allowed file extensions, lower-case with a leading dot
    pub text_extensions: BTreeSet<String>,
    /// Glob patterns matched against path segments and the whole relative path
    pub exclude_patterns: Vec<String>,
    /// Free-text guidance appended to retrieval requests (empty means none)
    pub guidance: String,
    /// Attempts per remote call before giving up on transient failures
    pub max_retries: u32,
    /// Delay before the first retry; doubled for each following attempt
    pub retry_base_delay_ms: u64,
    /// Per-request timeout
    pub request_timeout_secs: u64,
}

impl EngineConfig {
    /// Create a configuration with defaults for every optional field
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_lines_per_blob: DEFAULT_MAX_LINES_PER_BLOB,
            text_extensions: DEFAULT_TEXT_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|pattern| pattern.to_string())
                .collect(),
            guidance: String::new(),
            max_retries: 3,
            retry_base_delay_ms: 1000,
            request_timeout_secs: 60,
        }
    }

    /// Set the upload batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the chunking threshold
    pub fn with_max_lines_per_blob(mut self, max_lines: usize) -> Self {
        self.max_lines_per_blob = max_lines;
        self
    }

    /// Replace the extension allow-list; entries are normalized
    pub fn with_text_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.text_extensions = extensions
            .into_iter()
            .map(|ext| normalize_extension(ext.as_ref()))
            .filter(|ext| ext.len() > 1)
            .collect();
        self
    }

    /// Replace the exclude pattern list
    pub fn with_exclude_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Set retrieval guidance
    pub fn with_guidance(mut self, guidance: impl Into<String>) -> Self {
        self.guidance = guidance.into();
        self
    }

    /// Set retry behaviour
    pub fn with_retry(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    /// Base URL without trailing slashes
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether a lower-cased extension (with leading dot) is indexed
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.text_extensions.contains(extension)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.api_token.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "api_token".to_string(),
            }
            .into());
        }

        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "base_url".to_string(),
            }
            .into());
        }

        // Validate URL format
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "base_url".to_string(),
                value: self.base_url.clone(),
            }
            .into());
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "base_url".to_string(),
                value: self.base_url.clone(),
            }
            .into());
        }

        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "batch_size".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        if self.max_lines_per_blob == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_lines_per_blob".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        if self.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_retries".to_string(),
                value: "0".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

/// Lower-case an extension and make sure it starts with a dot
pub fn normalize_extension(extension: &str) -> String {
    let trimmed = extension.trim().to_lowercase();
    if trimmed.starts_with('.') {
        trimmed
    } else {
        format!(".{}", trimmed)
    }
}
