//! Custom error types for episciences_front.
//!
//! This module defines all error types used throughout the crate.
//! All functions return `Result<T, EpisciencesError>` instead of using `unwrap()`.

use thiserror::Error;

/// Main error type for episciences_front operations.
///
/// Uses `thiserror` for ergonomic error handling and automatic `Display` implementation.
#[derive(Debug, Error)]
pub enum EpisciencesError {
    /// Network/HTTP request error
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Upstream API answered with a non-2xx status
    #[error("API error: {code} - {message}")]
    Api {
        /// HTTP status code
        code: u16,
        /// Error message (status line and response body)
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV writer error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid URL built from configuration
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// A raw record could not be turned into a display model
    #[error("Normalize error: {0}")]
    Normalize(#[from] NormalizeError),
}

/// Why a raw record could not be normalized at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// The raw record was null or empty
    #[error("empty record")]
    Empty,

    /// Neither a journal article nor a conference paper block is present
    #[error("record {0:?} has no article content")]
    MissingContent(Option<u64>),

    /// The record is not shaped like the expected resource
    #[error("malformed record: {0}")]
    Malformed(String),
}

/// Result type alias using `EpisciencesError`
pub type Result<T> = std::result::Result<T, EpisciencesError>;

/// Extension trait for adding context to Option types
pub trait OptionExt<T> {
    /// Convert Option to Result with a config error message
    fn ok_or_config(self, msg: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_config(self, msg: &str) -> Result<T> {
        self.ok_or_else(|| EpisciencesError::Config(msg.to_string()))
    }
}
