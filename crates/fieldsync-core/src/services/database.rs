//! Shared database service wrapper used across clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::db::{
    Database, NoteRepository, ReferenceRepository, SqliteNoteRepository,
    SqliteReferenceRepository, SqliteSyncMetadataRepository, SqliteSyncStateRepository,
    SqliteTimeEntryRepository, SyncMetadataRepository, SyncStateRepository, TimeEntryRepository,
};
use crate::models::{
    LocalId, Project, ProjectNote, RecordKind, RecordSummary, RemoteTimeEntry, ServerId,
    SyncStatus, SyncUpdate, TimeEntry, TimeEntryPayload, WorkType,
};
use crate::state::{StateUpdate, SyncState};
use crate::store::{LocalStore, SyncStateStore};
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        Self::clear_stale_guards(&db)?;
        tracing::debug!("Opened local store at {}", db_path.display());
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Location of the backing file, if any.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Guard mirrors are only meaningful while the owning process runs.
    fn clear_stale_guards(db: &Database) -> Result<()> {
        let repo = SqliteSyncStateRepository::new(db.connection());
        let state = repo.load()?;
        if state.sync_in_progress || state.detection_in_progress {
            tracing::warn!(
                "Clearing stale in-flight flags (sync: {}, detection: {})",
                state.sync_in_progress,
                state.detection_in_progress
            );
            repo.apply(StateUpdate::ClearGuards)?;
        }
        Ok(())
    }
}

#[async_trait]
impl LocalStore for DatabaseService {
    async fn replace_projects(&self, projects: &[Project]) -> Result<()> {
        let mut db = self.db.lock().await;
        let mut repo = SqliteReferenceRepository::new(db.connection_mut());
        repo.replace_projects(projects)
    }

    async fn replace_work_types(&self, work_types: &[WorkType]) -> Result<()> {
        let mut db = self.db.lock().await;
        let mut repo = SqliteReferenceRepository::new(db.connection_mut());
        repo.replace_work_types(work_types)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut db = self.db.lock().await;
        let repo = SqliteReferenceRepository::new(db.connection_mut());
        repo.list_projects()
    }

    async fn list_work_types(&self) -> Result<Vec<WorkType>> {
        let mut db = self.db.lock().await;
        let repo = SqliteReferenceRepository::new(db.connection_mut());
        repo.list_work_types()
    }

    async fn insert_time_entry(&self, entry: &TimeEntry) -> Result<LocalId> {
        let db = self.db.lock().await;
        let repo = SqliteTimeEntryRepository::new(db.connection());
        repo.insert(entry)?;
        Ok(entry.local_id)
    }

    async fn get_time_entry(&self, id: &LocalId) -> Result<Option<TimeEntry>> {
        let db = self.db.lock().await;
        let repo = SqliteTimeEntryRepository::new(db.connection());
        repo.get(id)
    }

    async fn update_time_entry(
        &self,
        id: &LocalId,
        payload: &TimeEntryPayload,
    ) -> Result<TimeEntry> {
        let db = self.db.lock().await;
        let repo = SqliteTimeEntryRepository::new(db.connection());
        repo.update_payload(id, payload)
    }

    async fn find_time_entry_by_server_id(&self, server_id: ServerId) -> Result<Option<TimeEntry>> {
        let db = self.db.lock().await;
        let repo = SqliteTimeEntryRepository::new(db.connection());
        repo.find_by_server_id(server_id)
    }

    async fn insert_server_time_entry(&self, remote: &RemoteTimeEntry) -> Result<LocalId> {
        let db = self.db.lock().await;
        let repo = SqliteTimeEntryRepository::new(db.connection());
        repo.insert_server_copy(remote)
    }

    async fn overwrite_time_entry(
        &self,
        id: &LocalId,
        remote: &RemoteTimeEntry,
        revision: u32,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = SqliteTimeEntryRepository::new(db.connection());
        repo.overwrite_with_server_copy(id, remote, revision)
    }

    async fn list_pending_time_entries(&self) -> Result<Vec<TimeEntry>> {
        let db = self.db.lock().await;
        let repo = SqliteTimeEntryRepository::new(db.connection());
        repo.list_pending()
    }

    async fn list_recent_time_entries(&self, limit: usize) -> Result<Vec<TimeEntry>> {
        let db = self.db.lock().await;
        let repo = SqliteTimeEntryRepository::new(db.connection());
        repo.list_recent(limit)
    }

    async fn insert_note(&self, note: &ProjectNote) -> Result<LocalId> {
        let db = self.db.lock().await;
        let repo = SqliteNoteRepository::new(db.connection());
        repo.insert(note)?;
        Ok(note.local_id)
    }

    async fn get_note(&self, id: &LocalId) -> Result<Option<ProjectNote>> {
        let db = self.db.lock().await;
        let repo = SqliteNoteRepository::new(db.connection());
        repo.get(id)
    }

    async fn list_pending_notes(&self) -> Result<Vec<ProjectNote>> {
        let db = self.db.lock().await;
        let repo = SqliteNoteRepository::new(db.connection());
        repo.list_pending()
    }

    async fn mark_note_synced(
        &self,
        id: &LocalId,
        server_id: ServerId,
        media_url: Option<&str>,
        revision: u32,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = SqliteNoteRepository::new(db.connection());
        repo.mark_synced_with_media(id, server_id, media_url, revision)
    }

    async fn update_sync_status(
        &self,
        kind: RecordKind,
        id: &LocalId,
        update: &SyncUpdate,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        repo.update_sync_status(kind, id, update)
    }

    async fn mark_synced(
        &self,
        kind: RecordKind,
        id: &LocalId,
        server_id: ServerId,
        revision: u32,
    ) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        repo.mark_synced(kind, id, server_id, revision)
    }

    async fn set_server_id(
        &self,
        kind: RecordKind,
        id: &LocalId,
        server_id: ServerId,
    ) -> Result<()> {
        let db = self.db.lock().await;
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        repo.set_server_id(kind, id, server_id)
    }

    async fn pending_count(&self, kind: Option<RecordKind>) -> Result<usize> {
        let db = self.db.lock().await;
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        match kind {
            Some(kind) => repo.pending_count(kind),
            None => {
                let mut total = 0;
                for kind in RecordKind::USER_OWNED {
                    total += repo.pending_count(kind)?;
                }
                Ok(total)
            }
        }
    }

    async fn list_failed(&self, kind: RecordKind) -> Result<Vec<RecordSummary>> {
        let db = self.db.lock().await;
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        repo.list_by_status(kind, SyncStatus::Failed)
    }

    async fn reset_for_retry(&self, kind: RecordKind, id: &LocalId) -> Result<bool> {
        let db = self.db.lock().await;
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        repo.reset_for_retry(kind, id)
    }
}

#[async_trait]
impl SyncStateStore for DatabaseService {
    async fn load_state(&self) -> Result<SyncState> {
        let db = self.db.lock().await;
        SqliteSyncStateRepository::new(db.connection()).load()
    }

    async fn apply_state(&self, update: StateUpdate) -> Result<()> {
        let db = self.db.lock().await;
        SqliteSyncStateRepository::new(db.connection()).apply(update)
    }
}
