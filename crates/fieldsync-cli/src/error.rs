use std::io;

use fieldsync_core::remote::RemoteError;
use fieldsync_core::SyncError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] fieldsync_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Server error: {0}")]
    Remote(#[from] RemoteError),
    #[error("Sync failed: {0}")]
    Sync(#[from] SyncError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("No {kind} with id {id} is waiting for a retry")]
    NothingToRetry { kind: String, id: String },
    #[error(
        "No server configured. Run `fieldsync config init --server-url <URL>` or set FIELDSYNC_SERVER_URL."
    )]
    ServerNotConfigured,
}
