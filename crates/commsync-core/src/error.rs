//! Error types for commsync-core

use thiserror::Error;

use crate::sync::{SessionError, SyncAuthError, TransportError};

/// Result type alias using commsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in commsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input or configuration
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Sync authentication error
    #[error(transparent)]
    SyncAuth(#[from] SyncAuthError),

    /// Sync transport error
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Sync session error
    #[error(transparent)]
    Session(#[from] SessionError),
}
