// src/error.rs

//! Unified error handling for the radar feed.

use std::fmt;

use thiserror::Error;

/// Result type alias for radar feed operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed at the transport level
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Retry budget spent without a successful response
    #[error("Gave up on {url} after {attempts} attempts: {last_error}")]
    RetryExhausted {
        url: String,
        attempts: u32,
        last_error: String,
    },

    /// Response body did not have the expected shape
    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Regex compilation failed
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A single discovery strategy failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Every discovery strategy failed and no cached bulletin exists
    #[error("No bulletin found: all discovery strategies failed and the cache is empty")]
    DiscoveryExhausted,

    /// The bulletin could not be decoded
    #[error("Corrupt document: {0}")]
    DocumentCorrupt(String),

    /// Every geocoding mirror failed
    #[error("Geocoding backend unavailable ({mirrors} mirrors tried)")]
    BackendUnavailable { mirrors: usize },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a discovery error.
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery(message.into())
    }

    /// Create a document corruption error.
    pub fn corrupt(message: impl fmt::Display) -> Self {
        Self::DocumentCorrupt(message.to_string())
    }

    /// Create an invalid-response error with context.
    pub fn invalid_response(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::InvalidResponse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Whether this error is fatal for the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DiscoveryExhausted | Self::DocumentCorrupt(_))
    }
}
