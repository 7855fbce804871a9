//! Error types for the paperwatch pipeline.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering feed fetching, PDF retrieval, and configuration. Failures are
//! contained at the smallest unit that can continue: one page, one search,
//! one download task.

use std::path::PathBuf;

/// Top-level error type for the paperwatch core library.
#[derive(Debug, thiserror::Error)]
pub enum PaperwatchError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Download error: {0}")]
    Download(#[from] DownloadError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the feed fetch/search path.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },

    #[error("all {tried} endpoints failed, last error: {last}")]
    EndpointsExhausted { tried: usize, last: String },
}

impl FetchError {
    /// Whether this error should be retried against the same endpoint.
    ///
    /// Transient statuses mirror the transport retry set: 429 and the
    /// common 5xx gateway/overload responses. Transport-level failures
    /// (connect/read) are always retryable.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Request { .. } => true,
            FetchError::Status { status, .. } => {
                matches!(*status, 429 | 500 | 502 | 503 | 504)
            }
            FetchError::EndpointsExhausted { .. } => false,
        }
    }
}

/// Errors from a single PDF download attempt.
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Expected during candidate-URL fallback; advances to the next
    /// candidate rather than failing the entry.
    #[error("{url} not found")]
    NotFound { url: String },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid pattern for organization '{organization}': {message}")]
    InvalidPattern {
        organization: String,
        message: String,
    },

    #[error("unknown timezone: {name}")]
    UnknownTimezone { name: String },

    #[error("invalid value for {field}: {message}")]
    Invalid { field: String, message: String },

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("failed to build HTTP client: {message}")]
    HttpClient { message: String },
}

/// A type alias for results using the top-level `PaperwatchError`.
pub type Result<T> = std::result::Result<T, PaperwatchError>;
