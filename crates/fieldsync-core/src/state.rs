//! Persisted process-wide sync state.

use serde::{Deserialize, Serialize};

use crate::connection::ConnectionMode;
use crate::sync::SyncKind;

/// Scalar state surviving restarts: last sync timestamps, connection mode
/// and mirrors of the in-memory single-flight guards.
///
/// Timestamps are Unix milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub last_full_sync: Option<i64>,
    pub last_upload_sync: Option<i64>,
    pub last_download_sync: Option<i64>,
    pub connection_mode: ConnectionMode,
    pub last_online_at: Option<i64>,
    pub sync_in_progress: bool,
    pub detection_in_progress: bool,
}

impl SyncState {
    /// Last completion time of a run of the given kind
    pub const fn last_sync(&self, kind: SyncKind) -> Option<i64> {
        match kind {
            SyncKind::Full => self.last_full_sync,
            SyncKind::UploadOnly => self.last_upload_sync,
            SyncKind::DownloadOnly => self.last_download_sync,
        }
    }

    /// Apply an update in memory, mirroring what the store persists
    pub fn apply(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::SyncFinished { kind, at } => match kind {
                SyncKind::Full => {
                    self.last_full_sync = Some(at);
                    self.last_upload_sync = Some(at);
                    self.last_download_sync = Some(at);
                }
                SyncKind::UploadOnly => self.last_upload_sync = Some(at),
                SyncKind::DownloadOnly => self.last_download_sync = Some(at),
            },
            StateUpdate::ModeChanged { mode, at } => {
                self.connection_mode = mode;
                if mode == ConnectionMode::Online {
                    self.last_online_at = Some(at);
                }
            }
            StateUpdate::SyncInProgress(value) => self.sync_in_progress = value,
            StateUpdate::DetectionInProgress(value) => self.detection_in_progress = value,
            StateUpdate::ClearGuards => {
                self.sync_in_progress = false;
                self.detection_in_progress = false;
            }
        }
    }
}

/// Typed mutation of [`SyncState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateUpdate {
    /// A run drained; a full run also counts as upload and download
    SyncFinished { kind: SyncKind, at: i64 },
    /// Mode transition; entering `Online` refreshes `last_online_at`
    ModeChanged { mode: ConnectionMode, at: i64 },
    SyncInProgress(bool),
    DetectionInProgress(bool),
    /// Drop guard mirrors left behind by a process that did not exit cleanly
    ClearGuards,
}
