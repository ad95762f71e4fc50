//! Error types for spotify-backup
//!
//! Errors fall into three groups, matching how the run reacts to them:
//! - setup errors (config, auth, missing tools) abort before any playlist is touched
//! - per-playlist errors are logged by the snapshot builder and the playlist is skipped
//! - publication errors abort the run after the snapshot has been built

use std::time::Duration;
use thiserror::Error;

/// Result type alias for spotify-backup operations
pub type Result<T> = std::result::Result<T, BackupError>;

#[derive(Debug, Error)]
pub enum BackupError {
    /// Invalid or missing configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Token exchange or authorization flow failed
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The authorization step did not finish in time
    #[error("authentication timed out after {0:?}")]
    AuthTimeout(Duration),

    /// OAuth callback carried a state token that does not belong to this run
    #[error("authorization state mismatch")]
    StateMismatch,

    /// Required external binary is not on PATH
    #[error("required tool not found: {0}")]
    ToolMissing(&'static str),

    /// A playlist reference that cannot be turned into an identifier
    #[error("malformed playlist reference {reference:?}: {reason}")]
    MalformedReference { reference: String, reason: String },

    /// The remote service does not know the requested resource
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other error reported by the Spotify Web API client
    #[error("spotify API error: {0}")]
    Remote(String),

    /// A page's continuation marker did not move past the current offset
    #[error("pagination of {collection} stalled at offset {offset}")]
    StalledPagination { collection: String, offset: u32 },

    /// The run was cancelled while an operation was in flight
    #[error("operation cancelled")]
    Cancelled,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A git step failed
    #[error("git {step} failed: {message}")]
    Vcs { step: &'static str, message: String },
}

impl BackupError {
    pub fn malformed(reference: &str, reason: impl Into<String>) -> Self {
        Self::MalformedReference {
            reference: reference.to_string(),
            reason: reason.into(),
        }
    }

    /// Error for a non-success HTTP status returned by the Spotify API
    pub fn from_status(status: u16, resource: &str) -> Self {
        match status {
            404 => Self::NotFound(resource.to_string()),
            _ => Self::Remote(format!("HTTP {status} from {resource}")),
        }
    }

    pub fn vcs(step: &'static str, message: impl Into<String>) -> Self {
        Self::Vcs {
            step,
            message: message.into(),
        }
    }
}

impl From<rspotify::ClientError> for BackupError {
    fn from(err: rspotify::ClientError) -> Self {
        if let rspotify::ClientError::Http(http) = &err {
            if let rspotify::http::HttpError::StatusCode(response) = http.as_ref() {
                return Self::from_status(response.status().as_u16(), response.url().as_str());
            }
        }
        Self::Remote(err.to_string())
    }
}

impl From<config::ConfigError> for BackupError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
