//! Error types for fetch-dl
//!
//! Only configuration misuse and run-level failures surface as errors. Per-item
//! network and validation failures are absorbed by the engine and end up as
//! [`FetchResult::Failed`](crate::FetchResult::Failed) or
//! [`FetchResult::Skipped`](crate::FetchResult::Skipped).

use thiserror::Error;

/// Result type alias for fetch-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for fetch-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Builder or configuration misuse, raised at the offending call
    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        /// Human-readable description of the problem
        message: String,
        /// The setting that was rejected (e.g., "batch_size")
        key: Option<String>,
    },

    /// Cache prefix or TTL read from a task built without `cache(...)`
    #[error("cache parameters not set")]
    MissingCacheConfiguration,

    /// The transport could not set up its concurrent dispatch context.
    ///
    /// Fatal for the whole `execute` call.
    #[error("transport initialization failed: {0}")]
    TransportInit(String),

    /// Content read from a result that is not successful
    #[error("trying to read empty content")]
    EmptyContent,

    /// Cache store failure
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Shorthand for an [`Error::InvalidConfiguration`] tied to a setting
    pub fn invalid(key: &str, message: impl Into<String>) -> Self {
        Error::InvalidConfiguration {
            message: message.into(),
            key: Some(key.to_string()),
        }
    }

    /// Machine-readable error code, stable across message wording changes
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration { .. } => "invalid_configuration",
            Error::MissingCacheConfiguration => "missing_cache_configuration",
            Error::TransportInit(_) => "transport_init_failed",
            Error::EmptyContent => "empty_content_access",
            Error::Cache(_) => "cache_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}

/// Cache backend errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to open or connect to the backing store
    #[error("failed to connect to cache store: {0}")]
    ConnectionFailed(String),

    /// Failed to create the cache schema
    #[error("failed to prepare cache schema: {0}")]
    MigrationFailed(String),

    /// Read or write failed
    #[error("cache query failed: {0}")]
    QueryFailed(String),
}
