//! Identity and sync metadata shared by every syncable record

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::util::local_timestamp_now;

/// Locally-assigned identifier, using UUID v7 (time-sortable, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LocalId(Uuid);

impl LocalId {
    /// Create a new unique local ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for LocalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LocalId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// Identifier assigned by the remote system once it accepts a record.
///
/// Always strictly positive; the remote uses `0` to mean "no id".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct ServerId(i64);

impl ServerId {
    /// Wrap a raw remote id, rejecting non-positive values
    pub const fn new(raw: i64) -> Option<Self> {
        if raw > 0 {
            Some(Self(raw))
        } else {
            None
        }
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for ServerId {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("invalid server id {value}"))
    }
}

impl From<ServerId> for i64 {
    fn from(value: ServerId) -> Self {
        value.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-record replication status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Waiting to be offered to the remote
    #[default]
    Pending,
    /// Accepted by the remote; carries a server id
    Synced,
    /// Retry ceiling reached; needs manual intervention
    Failed,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown sync status '{other}'")),
        }
    }
}

/// Category of syncable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    TimeEntry,
    ProjectNote,
    Project,
    WorkType,
}

impl RecordKind {
    /// Kinds the local user mutates and the engine uploads
    pub const USER_OWNED: [Self; 2] = [Self::TimeEntry, Self::ProjectNote];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimeEntry => "time_entry",
            Self::ProjectNote => "project_note",
            Self::Project => "project",
            Self::WorkType => "work_type",
        }
    }

    /// Reference kinds are replaced wholesale from the remote and never uploaded
    pub const fn is_reference(self) -> bool {
        matches!(self, Self::Project | Self::WorkType)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "time_entry" | "time_entries" | "report" => Ok(Self::TimeEntry),
            "project_note" | "note" | "notes" => Ok(Self::ProjectNote),
            "project" | "projects" => Ok(Self::Project),
            "work_type" | "work_types" => Ok(Self::WorkType),
            other => Err(format!("unknown record kind '{other}'")),
        }
    }
}

/// Replication bookkeeping stored next to every user-owned record
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncMeta {
    pub server_id: Option<ServerId>,
    pub status: SyncStatus,
    /// Failed upload attempts since the last success
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Modification timestamp used for conflict comparison
    pub last_modified: Option<String>,
    /// Local edit counter; sync write-backs only land on the revision they read
    #[serde(default)]
    pub revision: u32,
}

impl SyncMeta {
    /// Metadata for a record just written locally
    #[must_use]
    pub fn local_write() -> Self {
        Self {
            server_id: None,
            status: SyncStatus::Pending,
            attempts: 0,
            last_error: None,
            last_modified: Some(local_timestamp_now()),
            revision: 0,
        }
    }

    /// Metadata for a copy taken verbatim from the remote
    #[must_use]
    pub const fn from_server(server_id: ServerId, last_modified: Option<String>) -> Self {
        Self {
            server_id: Some(server_id),
            status: SyncStatus::Synced,
            attempts: 0,
            last_error: None,
            last_modified,
            revision: 0,
        }
    }

    /// Re-flag after a local edit
    pub fn touch(&mut self) {
        self.status = SyncStatus::Pending;
        self.last_modified = Some(local_timestamp_now());
        self.revision += 1;
    }
}

/// Sync status change applied by the orchestrator after an upload attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncUpdate {
    pub status: SyncStatus,
    pub error: Option<String>,
    pub attempts: u32,
}

/// Anything carrying a modification timestamp the conflict resolver can compare
pub trait Versioned {
    fn last_modified(&self) -> Option<&str>;
}

/// Flat listing row used for failed/pending overviews
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub kind: RecordKind,
    pub local_id: LocalId,
    pub server_id: Option<ServerId>,
    pub status: SyncStatus,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub label: String,
}
