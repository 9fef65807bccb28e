//! Sync run results, events and errors

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Which phases a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    /// Download, then upload
    Full,
    UploadOnly,
    DownloadOnly,
}

impl SyncKind {
    pub const fn downloads(self) -> bool {
        matches!(self, Self::Full | Self::DownloadOnly)
    }

    pub const fn uploads(self) -> bool {
        matches!(self, Self::Full | Self::UploadOnly)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::UploadOnly => "upload",
            Self::DownloadOnly => "download",
        }
    }
}

impl fmt::Display for SyncKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of the phase currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Server to local
    Download,
    /// Local to server
    Upload,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => f.write_str("download"),
            Self::Upload => f.write_str("upload"),
        }
    }
}

/// Counters and diagnostics of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub uploaded: usize,
    pub downloaded: usize,
    pub conflicts_resolved: usize,
    pub failed: usize,
    /// In the order they happened
    pub errors: Vec<String>,
}

impl SyncResult {
    /// Count a failure and keep its message
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(message.into());
    }

    pub fn summary(&self) -> String {
        format!(
            "uploaded: {}, downloaded: {}, conflicts resolved: {}, failed: {}",
            self.uploaded, self.downloaded, self.conflicts_resolved, self.failed
        )
    }

    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// Run-level failure, delivered as the terminal event
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("no network connection")]
    NoNetwork,
    #[error("not authenticated")]
    Unauthenticated,
    #[error("a sync is already in progress")]
    AlreadyRunning,
    /// Link is up but the server did not answer the probe
    #[error("unable to reach server")]
    ServerUnreachable,
    /// Unexpected failure in the middle of a run
    #[error("sync failed: {0}")]
    Internal(String),
}

/// Notification emitted by a run; exactly one `Completed` or `Failed` ends it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    Started(SyncPhase),
    Progress {
        message: String,
        current: usize,
        total: usize,
    },
    Completed(SyncResult),
    Failed(SyncError),
}

impl SyncEvent {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }
}

/// Result of offering one record to the remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Accepted and marked synced
    Synced,
    /// Accepted, but edited locally meanwhile; stays pending under its server id
    Superseded,
    /// Failed; stays pending for the next run
    Retry(String),
    /// Failed and out of attempts; parked as failed
    Exhausted(String),
}

impl RecordOutcome {
    /// Outcome of a server acceptance, given whether the local write-back applied
    pub(crate) const fn accepted(applied: bool) -> Self {
        if applied {
            Self::Synced
        } else {
            Self::Superseded
        }
    }
}
