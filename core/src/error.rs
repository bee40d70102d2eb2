//! Error types and handling for ctxsync core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ctxsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ctxsync core
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote service errors
    #[error("{0}")]
    Remote(#[from] RemoteError),

    /// Indexing errors
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },
}

/// Errors raised while talking to the remote retrieval service.
///
/// The `Display` text is the translated, user-facing message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Authentication failed: the API token is invalid. Check the token in your configuration.")]
    Unauthorized,

    #[error("Access denied: the API token has been revoked or banned. Request a new token.")]
    Forbidden,

    #[error("TLS certificate validation failed: {message}. Check proxy or certificate settings.")]
    Tls { message: String },

    #[error("Connection refused: {message}")]
    ConnectionRefused { message: String },

    #[error("Request timed out: {message}")]
    Timeout { message: String },

    #[error("DNS resolution failed: {message}")]
    Dns { message: String },

    #[error("Remote server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {message}. Check your network connection and the configured base URL.")]
    Network { message: String },

    #[error("Request failed: {message}")]
    Transport { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },
}

impl RemoteError {
    /// Whether a failed call may succeed if attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::ConnectionRefused { .. }
                | RemoteError::Timeout { .. }
                | RemoteError::Dns { .. }
                | RemoteError::Server { .. }
        )
    }

    /// Authentication, authorization and certificate failures are never retried
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            RemoteError::Unauthorized | RemoteError::Forbidden | RemoteError::Tls { .. }
        )
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => RemoteError::Unauthorized,
            403 => RemoteError::Forbidden,
            500..=599 => RemoteError::Server { status, message },
            _ => RemoteError::Api { status, message },
        }
    }

    /// Classify a transport-level reqwest failure.
    ///
    /// Only the error's sources are inspected; the top-level message carries the request
    /// URL, whose text says nothing about the failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let message = describe_error_chain(err);

        if err.is_timeout() {
            return RemoteError::Timeout { message };
        }

        let mut source = std::error::Error::source(err);
        while let Some(inner) = source {
            if let Some(io) = inner.downcast_ref::<std::io::Error>() {
                match io.kind() {
                    std::io::ErrorKind::ConnectionRefused => {
                        return RemoteError::ConnectionRefused { message }
                    }
                    std::io::ErrorKind::TimedOut => return RemoteError::Timeout { message },
                    _ => {}
                }
            }
            source = inner.source();
        }

        let causes = std::error::Error::source(err)
            .map(describe_error_chain)
            .unwrap_or_default()
            .to_lowercase();

        if causes.contains("timed out") {
            RemoteError::Timeout { message }
        } else if causes.contains("certificate") || causes.contains("tls") || causes.contains("ssl")
        {
            RemoteError::Tls { message }
        } else if causes.contains("dns")
            || causes.contains("failed to lookup address")
            || causes.contains("name or service not known")
            || causes.contains("no such host")
        {
            RemoteError::Dns { message }
        } else if causes.contains("connection refused") {
            RemoteError::ConnectionRefused { message }
        } else if err.is_decode() {
            RemoteError::Protocol { message }
        } else if err.is_connect() {
            RemoteError::ConnectionRefused { message }
        } else {
            RemoteError::Transport { message }
        }
    }
}

/// Flatten an error and its sources into a single line
fn describe_error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

/// Indexing errors
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("No files found to index")]
    NoFilesFound,

    #[error("All {batches} upload batches failed; nothing was indexed")]
    AllBatchesFailed { batches: usize },

    #[error("Upload failed for {failed_batches} batch(es)")]
    UploadFailed { failed_batches: usize },

    #[error("Failed to write index to {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
