//! Storage boundaries consumed by the sync engine and the mode manager.
//!
//! [`DatabaseService`](crate::services::DatabaseService) implements both
//! traits on top of `SQLite`; tests may substitute their own.

use async_trait::async_trait;

use crate::models::{
    LocalId, Project, ProjectNote, RecordKind, RecordSummary, RemoteTimeEntry, ServerId,
    SyncUpdate, TimeEntry, TimeEntryPayload, WorkType,
};
use crate::state::{StateUpdate, SyncState};
use crate::Result;

/// Durable record store.
///
/// Every method touching a single record updates payload and sync metadata
/// atomically.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Full refresh of the project catalog
    async fn replace_projects(&self, projects: &[Project]) -> Result<()>;
    /// Full refresh of the work type catalog
    async fn replace_work_types(&self, work_types: &[WorkType]) -> Result<()>;
    async fn list_projects(&self) -> Result<Vec<Project>>;
    async fn list_work_types(&self) -> Result<Vec<WorkType>>;

    async fn insert_time_entry(&self, entry: &TimeEntry) -> Result<LocalId>;
    async fn get_time_entry(&self, id: &LocalId) -> Result<Option<TimeEntry>>;
    /// Local edit; re-flags the entry pending, bumps `last_modified` and the revision
    async fn update_time_entry(&self, id: &LocalId, payload: &TimeEntryPayload)
        -> Result<TimeEntry>;
    async fn find_time_entry_by_server_id(&self, server_id: ServerId) -> Result<Option<TimeEntry>>;
    /// Insert a server-originated entry as synced
    async fn insert_server_time_entry(&self, remote: &RemoteTimeEntry) -> Result<LocalId>;
    /// Replace a local copy with the server version, marking it synced.
    /// `false` when the copy moved past `revision` and was left in place.
    async fn overwrite_time_entry(
        &self,
        id: &LocalId,
        remote: &RemoteTimeEntry,
        revision: u32,
    ) -> Result<bool>;
    async fn list_pending_time_entries(&self) -> Result<Vec<TimeEntry>>;
    async fn list_recent_time_entries(&self, limit: usize) -> Result<Vec<TimeEntry>>;

    async fn insert_note(&self, note: &ProjectNote) -> Result<LocalId>;
    async fn get_note(&self, id: &LocalId) -> Result<Option<ProjectNote>>;
    async fn list_pending_notes(&self) -> Result<Vec<ProjectNote>>;
    /// Mark a note synced together with the stored media URL.
    /// `false` when the note moved past `revision`; it then stays pending.
    async fn mark_note_synced(
        &self,
        id: &LocalId,
        server_id: ServerId,
        media_url: Option<&str>,
        revision: u32,
    ) -> Result<bool>;

    async fn update_sync_status(
        &self,
        kind: RecordKind,
        id: &LocalId,
        update: &SyncUpdate,
    ) -> Result<()>;
    /// Conditional on `revision`, like [`LocalStore::mark_note_synced`]
    async fn mark_synced(
        &self,
        kind: RecordKind,
        id: &LocalId,
        server_id: ServerId,
        revision: u32,
    ) -> Result<bool>;
    /// Record a server id while leaving the status untouched
    async fn set_server_id(&self, kind: RecordKind, id: &LocalId, server_id: ServerId)
        -> Result<()>;
    /// Pending records of one kind, or of every user-owned kind when `None`
    async fn pending_count(&self, kind: Option<RecordKind>) -> Result<usize>;
    async fn list_failed(&self, kind: RecordKind) -> Result<Vec<RecordSummary>>;
    /// Reset attempts and re-queue a non-synced record
    async fn reset_for_retry(&self, kind: RecordKind, id: &LocalId) -> Result<bool>;
}

/// Persisted scalar sync state
#[async_trait]
pub trait SyncStateStore: Send + Sync {
    async fn load_state(&self) -> Result<SyncState>;
    async fn apply_state(&self, update: StateUpdate) -> Result<()>;
}
