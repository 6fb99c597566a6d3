use std::io;

use commsync_core::sync::{SessionError, SyncAuthError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] commsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    SyncAuth(#[from] SyncAuthError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Failed to read {path}: {message}")]
    InvalidRecordFile { path: String, message: String },
    #[error("Only one input can be read from stdin")]
    StdinReused,
}
