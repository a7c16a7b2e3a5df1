use thiserror::Error;

use crate::{cache::CacheError, errors::DiscoveryError};

/// Errors surfaced to the command line
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Operation cancelled by user")]
    UserCancelled,

    #[error("Note not found: {note}")]
    NoteNotFound { note: String },

    #[error("Discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("Cache operation failed: {0}")]
    Cache(#[from] CacheError),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CliError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn note_not_found(note: impl Into<String>) -> Self {
        Self::NoteNotFound { note: note.into() }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: format!("{err:#}"),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput {
            message: format!("JSON error: {}", err),
        }
    }
}
