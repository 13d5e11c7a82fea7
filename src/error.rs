//! Error types for mtgogetter

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Unified error type for mtgogetter operations
#[derive(Debug, Error)]
pub enum GetterError {
    /// File create/read/write failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// State log on disk is not valid TOML or doesn't match the schema
    #[error("Failed to decode state log: {0}")]
    Decode(#[from] toml::de::Error),
    /// State log could not be serialized
    #[error("Failed to encode state log: {0}")]
    Encode(#[from] toml::ser::Error),
    /// Failed to parse a JSON payload from a provider
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    /// Provider response parsed but didn't contain what we expected
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
    /// A `YYYY-MM-DD` release date failed to parse
    #[error("Invalid release date '{value}': {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// An RFC 3339 timestamp failed to parse
    #[error("Invalid timestamp '{value}': {source}")]
    InvalidTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// HTTP request failed (network error, timeout, etc.)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP error status code
    #[error("HTTP error {status} from {url}")]
    HttpStatus {
        status: reqwest::StatusCode,
        url: String,
    },
    /// Downloaded archive could not be read
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    /// Downloaded archive has no entries
    #[error("Archive contains no files")]
    EmptyArchive,
    /// No set with an MTGO code is released at or after the given time
    #[error("No releases with an MTGO code are upcoming after {after}")]
    NoUpcomingRelease { after: DateTime<Utc> },
    /// A refresh task panicked or was aborted
    #[error("Refresh task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    /// Invalid combination of command line arguments
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result alias for mtgogetter operations
pub type Result<T> = std::result::Result<T, GetterError>;
