use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::transport::TransportError;

/// Application-level error type.
/// Per-message handlers return `Result<T, AppError>`; the poll loop logs and isolates them.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error at {path:?}: {source}")]
    Storage { path: PathBuf, source: io::Error },

    #[error("JSON document error at {path:?}: {source}")]
    Serialization {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Malformed session state: {0}")]
    MalformedState(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    /// Wraps an I/O failure with the path it happened on, for use with `map_err`.
    pub fn storage(path: &Path) -> impl FnOnce(io::Error) -> AppError {
        let path = path.to_path_buf();
        move |source| AppError::Storage { path, source }
    }

    pub fn serialization(path: &Path) -> impl FnOnce(serde_json::Error) -> AppError {
        let path = path.to_path_buf();
        move |source| AppError::Serialization { path, source }
    }

    /// Text sent to the submitter when a step fails because of this error.
    pub fn user_notice(&self) -> &'static str {
        match self {
            AppError::Transport(_) => {
                "Could not fetch your photo from the chat service. Please send it again."
            }
            AppError::Storage { .. } | AppError::Serialization { .. } => {
                "Something went wrong while saving your submission. Please try again."
            }
            AppError::MalformedState(_) => {
                "Your previous submission could not be resumed and was discarded. Send a photo to start over."
            }
            AppError::Configuration(_) => "The service is misconfigured.",
        }
    }
}
