//! Bidirectional synchronization between the local store and the remote.

pub mod conflict;
mod engine;
mod progress;
mod result;

pub use conflict::{resolve, Resolution};
pub use engine::{LocalWrite, SyncEngine, SyncRun, SyncSettings, SyncStatusSummary};
pub use progress::{SyncProgress, SyncProgressBroadcaster};
pub use result::{RecordOutcome, SyncError, SyncEvent, SyncKind, SyncPhase, SyncResult};
