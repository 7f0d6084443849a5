//! Error types for the player core
//!
//! Every playback error is non-fatal to the application: the controller
//! records it on the session, notifies the user and stays usable.

use thiserror::Error;

use crate::model::ContentType;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// Content-type tag that no backend can handle
    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    /// No resolution rule matched the record
    #[error("Could not determine content type for content {0}")]
    UnresolvedType(String),

    /// Native media handle or source rejected during initialization
    #[error("Failed to initialize {content_type} playback: {reason}")]
    BackendInitFailed {
        content_type: ContentType,
        reason: String,
    },

    /// Mid-playback backend error
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    /// Reporting or persistence failure, always swallowed by callers
    #[error("Telemetry failed: {0}")]
    TelemetryFailed(String),

    #[error("Invalid seek position: {0}")]
    InvalidSeek(f64),

    #[error("Queue index {index} out of range for queue of {len}")]
    InvalidQueueIndex { index: usize, len: usize },

    #[error("No content loaded")]
    NoActiveContent,
}

impl PlayerError {
    /// Short message suitable for a transient user notification
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::UnsupportedContentType(_) | PlayerError::UnresolvedType(_) => {
                "This content type is not supported".to_string()
            }
            PlayerError::BackendInitFailed { content_type, .. } => {
                format!("Could not load {}", content_type)
            }
            PlayerError::PlaybackFailed(_) => "Playback failed".to_string(),
            PlayerError::NoActiveContent => "Nothing is playing".to_string(),
            other => other.to_string(),
        }
    }
}

/// Errors from the REST backend client
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request was not successful: {0}")]
    Envelope(String),

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, PlayerError>;
