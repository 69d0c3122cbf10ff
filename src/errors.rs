//! Error types for mirrorcache
//!
//! Each part of the engine has its own error enum so callers can react to the
//! failure class that matters to them. `FetchError` is the one the HTTP layer
//! maps to client statuses; it keeps the upstream status code reachable even
//! when the same failure is shared between several tee consumers.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::constants::MIRROR_FAILURE_STATUSES;

/// Upstream fetch, tee and passthrough errors
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error on a cache file or client sink
    #[error("I/O error during transfer: {0}")]
    Io(#[from] std::io::Error),

    /// Upstream answered with a non-success status
    #[error("Upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Upstream did not send response headers in time
    #[error("Upstream did not answer within {seconds} seconds: {url}")]
    HeaderTimeout { seconds: u64, url: String },

    /// No bytes arrived within the per-chunk inactivity timeout
    #[error("Transfer stalled: no data for {seconds} seconds")]
    Stalled { seconds: u64 },

    /// Content-Range header could not be parsed
    #[error("Invalid Content-Range header: {value}")]
    InvalidContentRange { value: String },

    /// Stream ended before the announced size was reached
    #[error("Incomplete download: received {received} bytes, expected {expected} bytes")]
    IncompleteDownload { received: u64, expected: u64 },

    /// Remote artifact changed size while resuming, even after a restart
    #[error("Upstream size changed during resume. Expected: {expected} bytes, got: {actual} bytes")]
    SizeChanged { expected: u64, actual: u64 },

    /// The fetch was cancelled after its last consumer left
    #[error("Transfer cancelled")]
    Cancelled,

    /// Neither the partial nor the full file could be opened for streaming
    #[error("Resource is no longer available in the cache: {resource}")]
    ResourceUnavailable { resource: String },

    /// The background fetch task ended abnormally
    #[error("Fetch task failed: {reason}")]
    TaskFailed { reason: String },

    /// A failure observed by one fetch and handed to every consumer
    #[error(transparent)]
    Shared(#[from] Arc<FetchError>),
}

impl FetchError {
    /// HTTP status carried by this error, looking through shared wrappers
    pub fn status_code(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            FetchError::Http(error) => error.status().map(|status| status.as_u16()),
            FetchError::Shared(inner) => inner.status_code(),
            _ => None,
        }
    }

    /// Whether the status asks for another mirror to be selected
    pub fn is_mirror_failure(&self) -> bool {
        self.status_code()
            .map(|status| MIRROR_FAILURE_STATUSES.contains(&status))
            .unwrap_or(false)
    }

    /// Whether a retry against the same or another mirror may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            FetchError::Http(_)
            | FetchError::HeaderTimeout { .. }
            | FetchError::Stalled { .. }
            | FetchError::IncompleteDownload { .. }
            | FetchError::SizeChanged { .. } => true,
            FetchError::Status { .. } => self.is_mirror_failure(),
            FetchError::Shared(inner) => inner.is_recoverable(),
            _ => false,
        }
    }

    /// Shares this error, or reuses the shared allocation it already wraps
    pub fn into_shared(self) -> Arc<FetchError> {
        match self {
            FetchError::Shared(inner) => inner,
            other => Arc::new(other),
        }
    }
}

/// Cache storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// Cache directory not found or inaccessible
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// I/O error on a cache file
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A handle from another storage backend was passed to a move
    #[error("Storage handle {name} has no filesystem location")]
    ForeignHandle { name: String },

    /// Request path does not name a repository, architecture and file
    #[error("Invalid resource path: {path}. Expected /<repository>/.../<architecture>/<file>")]
    InvalidResourcePath { path: String },

    /// Cache verification failed
    #[error("Cache verification failed for {files_failed} files")]
    VerificationFailed { files_failed: usize },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be rendered
    #[error("Could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// Speed string did not match the speed grammar
    #[error("Invalid speed '{input}'. Expected values like '10 Mibps', '1 MB' or 'unlimited'")]
    InvalidSpeed { input: String },

    /// Checksum string is not a hex digest of the expected algorithm
    #[error("Invalid {algorithm} checksum: {checksum}")]
    InvalidChecksum { algorithm: String, checksum: String },

    /// I/O error reading or writing the configuration file
    #[error("Configuration file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Storage error
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(error) => error.is_recoverable(),
            AppError::Storage(_) | AppError::Config(_) | AppError::Generic { .. } => false,
            AppError::Io(_) => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(FetchError::Status { .. }) => "upstream",
            AppError::Fetch(_) => "fetch",
            AppError::Storage(_) => "storage",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Storage result type alias
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

impl From<StorageError> for FetchError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Io(io) => FetchError::Io(io),
            other => FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                other.to_string(),
            )),
        }
    }
}
