//! Sumi-Harvest: a polite page asset harvester
//!
//! This crate fetches a single seed page, discovers every static resource it
//! references (images, scripts, stylesheets, fonts, media) and downloads them
//! under bounded concurrency and a global request-rate ceiling.

pub mod config;
pub mod crawler;
pub mod jobs;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use state::ErrorKind;
use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job not found: {0}")]
    NotFound(jobs::JobId),

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Response from {url} exceeds the {limit} byte limit")]
    ResourceTooLarge { url: String, limit: u64 },

    #[error("Network error for {url}: {message}")]
    NetworkTransient { url: String, message: String },

    #[error("HTTP {status} for {url}")]
    HttpClientError { url: String, status: u16 },

    #[error("HTTP {status} from server for {url}")]
    HttpServerError { url: String, status: u16 },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Invalid save path: {0}")]
    InvalidPath(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarvestError {
    /// Maps the error onto the taxonomy recorded on resource records
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::InvalidInput(_) | Self::NotFound(_) | Self::UrlError(_) => {
                ErrorKind::InvalidInput
            }
            // redirect limits, client construction: never retried
            Self::Http { .. } | Self::Reqwest(_) => ErrorKind::InvalidInput,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::ResourceTooLarge { .. } => ErrorKind::ResourceTooLarge,
            Self::NetworkTransient { .. } => ErrorKind::NetworkTransient,
            Self::HttpClientError { .. } => ErrorKind::HttpClientError,
            Self::HttpServerError { .. } => ErrorKind::HttpServerError,
            Self::InvalidPath(_) => ErrorKind::InvalidPath,
            Self::Storage(StorageError::OutsideRoot(_)) => ErrorKind::InvalidPath,
            Self::Storage(_) | Self::Io(_) => ErrorKind::Io,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Returns true if another attempt may succeed
    ///
    /// Only connection-level failures, timeouts and 5xx responses qualify.
    /// Client errors, size violations and malformed URLs are terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::NetworkTransient { .. } | Self::HttpServerError { .. }
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, JobConfig};
pub use jobs::{CrawlJob, Engine, JobId, JobProgress};
pub use state::{JobStatus, Outcome, ResourceKind, ResourceRecord};
pub use storage::StorageError;
pub use url::{normalize_url, validate_seed_url};
