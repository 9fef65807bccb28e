//! Shared fakes for the integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fieldsync_core::connection::{
    ConnectionModeManager, ModeListener, ProbeReport, ProbeStatus, ReachabilityProbe,
    StaticReachability,
};
use fieldsync_core::models::{
    LocalId, NotePayload, Project, RemoteTimeEntry, ServerId, TimeEntryFilter, TimeEntryPayload,
    WorkType,
};
use fieldsync_core::store::LocalStore;
use fieldsync_core::remote::{
    Accepted, MediaAccepted, MediaUpload, RemoteApi, RemoteError, RemoteResult, StaticCredentials,
};
use fieldsync_core::sync::SyncSettings;
use fieldsync_core::{ConnectionMode, DatabaseService, SyncEngine};
use tokio::sync::Notify;

/// In-process remote answering from scripted collections
#[derive(Default)]
pub struct ScriptedRemote {
    pub projects: Mutex<Vec<Project>>,
    pub work_types: Mutex<Vec<WorkType>>,
    pub time_entries: Mutex<Vec<RemoteTimeEntry>>,
    pub fail_downloads: AtomicBool,
    pub fail_uploads: AtomicBool,
    pub fail_media: AtomicBool,
    pub panic_on_download: AtomicBool,
    /// When set, `list_projects` waits for a permit
    pub gate: Mutex<Option<Arc<Notify>>>,
    /// Local edit applied while the next time entry upload is on the wire
    concurrent_edit: Mutex<Option<(DatabaseService, LocalId, TimeEntryPayload)>>,
    next_id: AtomicI64,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl ScriptedRemote {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1000),
            ..Self::default()
        }
    }

    pub fn with_catalog() -> Self {
        let remote = Self::new();
        *remote.projects.lock().unwrap() = vec![project(1, "Bridge inspection"), project(2, "Depot")];
        *remote.work_types.lock().unwrap() = vec![work_type(10, "Travel"), work_type(11, "On site")];
        remote
    }

    /// Block `list_projects` until the returned handle is notified
    pub fn install_gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Edit `id` in `db` while the next time entry upload is in flight
    pub fn edit_during_upload(
        &self,
        db: &DatabaseService,
        id: LocalId,
        payload: TimeEntryPayload,
    ) {
        *self.concurrent_edit.lock().unwrap() = Some((db.clone(), id, payload));
    }

    async fn apply_concurrent_edit(&self) {
        let edit = self.concurrent_edit.lock().unwrap().take();
        if let Some((db, id, payload)) = edit {
            db.update_time_entry(&id, &payload).await.unwrap();
        }
    }

    pub fn calls(&self, name: &str) -> usize {
        self.calls.lock().unwrap().get(name).copied().unwrap_or(0)
    }

    fn record(&self, name: &'static str) {
        *self.calls.lock().unwrap().entry(name).or_default() += 1;
    }

    fn next_server_id(&self) -> ServerId {
        ServerId::new(self.next_id.fetch_add(1, Ordering::SeqCst)).unwrap()
    }

    fn download_failure(&self) -> RemoteResult<()> {
        if self.panic_on_download.load(Ordering::SeqCst) {
            panic!("scripted download panic");
        }
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection reset".to_string()));
        }
        Ok(())
    }

    fn upload_failure(&self) -> RemoteResult<()> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                code: 503,
                message: "maintenance".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteApi for ScriptedRemote {
    async fn list_projects(&self, _token: &str) -> RemoteResult<Vec<Project>> {
        self.record("list_projects");
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.download_failure()?;
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn list_work_types(&self, _token: &str) -> RemoteResult<Vec<WorkType>> {
        self.record("list_work_types");
        self.download_failure()?;
        Ok(self.work_types.lock().unwrap().clone())
    }

    async fn list_time_entries(
        &self,
        _token: &str,
        _filter: &TimeEntryFilter,
    ) -> RemoteResult<Vec<RemoteTimeEntry>> {
        self.record("list_time_entries");
        self.download_failure()?;
        Ok(self.time_entries.lock().unwrap().clone())
    }

    async fn create_time_entry(
        &self,
        _token: &str,
        _payload: &TimeEntryPayload,
    ) -> RemoteResult<Accepted> {
        self.record("create_time_entry");
        self.upload_failure()?;
        self.apply_concurrent_edit().await;
        Ok(Accepted {
            server_id: self.next_server_id(),
        })
    }

    async fn update_time_entry(
        &self,
        _token: &str,
        server_id: ServerId,
        _payload: &TimeEntryPayload,
    ) -> RemoteResult<Accepted> {
        self.record("update_time_entry");
        self.upload_failure()?;
        self.apply_concurrent_edit().await;
        Ok(Accepted { server_id })
    }

    async fn create_note(&self, _token: &str, _payload: &NotePayload) -> RemoteResult<Accepted> {
        self.record("create_note");
        self.upload_failure()?;
        Ok(Accepted {
            server_id: self.next_server_id(),
        })
    }

    async fn update_note(
        &self,
        _token: &str,
        server_id: ServerId,
        _payload: &NotePayload,
    ) -> RemoteResult<Accepted> {
        self.record("update_note");
        self.upload_failure()?;
        Ok(Accepted { server_id })
    }

    async fn upload_note_media(
        &self,
        _token: &str,
        note_id: ServerId,
        media: MediaUpload,
    ) -> RemoteResult<MediaAccepted> {
        self.record("upload_note_media");
        if self.fail_media.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                code: 500,
                message: "storage unavailable".to_string(),
            });
        }
        Ok(MediaAccepted {
            url: Some(format!("https://files.example.com/{note_id}/{}", media.file_name)),
        })
    }
}

/// Probe with a settable answer that counts how often it was asked
pub struct ScriptedProbe {
    status: Mutex<ProbeStatus>,
    calls: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
}

impl ScriptedProbe {
    pub fn new(status: ProbeStatus) -> Self {
        Self {
            status: Mutex::new(status),
            calls: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }

    /// Hold every probe until the returned handle is notified
    pub fn install_gate(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn set(&self, status: ProbeStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn probe(&self) -> ProbeReport {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let status = *self.status.lock().unwrap();
        ProbeReport {
            status,
            response_time: Some(Duration::from_millis(25)),
            message: format!("scripted {status}"),
        }
    }
}

/// Records every mode transition and sync notification
#[derive(Default)]
pub struct RecordingListener {
    pub transitions: Mutex<Vec<(ConnectionMode, ConnectionMode, String)>>,
    pub syncs_started: AtomicUsize,
    pub syncs_completed: AtomicUsize,
    pub sync_errors: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn modes(&self) -> Vec<ConnectionMode> {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .map(|(_, new, _)| *new)
            .collect()
    }
}

impl ModeListener for RecordingListener {
    fn on_mode_changed(&self, old: ConnectionMode, new: ConnectionMode, reason: &str) {
        self.transitions
            .lock()
            .unwrap()
            .push((old, new, reason.to_string()));
    }

    fn on_sync_started(&self) {
        self.syncs_started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_sync_completed(&self, _synced: usize, _failed: usize) {
        self.syncs_completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_sync_error(&self, message: &str) {
        self.sync_errors.lock().unwrap().push(message.to_string());
    }
}

pub struct PanickingListener;

impl ModeListener for PanickingListener {
    fn on_mode_changed(&self, _old: ConnectionMode, _new: ConnectionMode, _reason: &str) {
        panic!("listener failure");
    }
}

pub struct Harness {
    pub db: DatabaseService,
    pub remote: Arc<ScriptedRemote>,
    pub network: Arc<StaticReachability>,
    pub engine: SyncEngine,
}

pub async fn harness(remote: ScriptedRemote) -> Harness {
    harness_with(remote, Some("field-token"), SyncSettings::default()).await
}

pub async fn harness_with(
    remote: ScriptedRemote,
    token: Option<&str>,
    settings: SyncSettings,
) -> Harness {
    let db = DatabaseService::open_in_memory().await.unwrap();
    let remote = Arc::new(remote);
    let network = Arc::new(StaticReachability::new(true));
    let engine = SyncEngine::new(
        Arc::new(db.clone()),
        Arc::new(db.clone()),
        remote.clone(),
        Arc::new(StaticCredentials::new(token.map(str::to_string))),
        network.clone(),
        settings,
    );
    Harness {
        db,
        remote,
        network,
        engine,
    }
}

pub fn project(id: i64, name: &str) -> Project {
    Project {
        id,
        name: name.to_string(),
        description: None,
        client: Some("City works".to_string()),
        status: 1,
        date_updated: None,
    }
}

pub fn work_type(id: i64, name: &str) -> WorkType {
    WorkType {
        id,
        name: name.to_string(),
        description: None,
        status: 1,
    }
}

pub fn entry_payload(hours: f64, description: &str) -> TimeEntryPayload {
    TimeEntryPayload {
        project_id: 1,
        work_type_id: 10,
        report_date: "2025-03-14".to_string(),
        datetime_from: Some("08:00".to_string()),
        datetime_to: None,
        hours,
        description: Some(description.to_string()),
    }
}

pub fn note_payload(title: &str) -> NotePayload {
    NotePayload {
        project_id: Some(1),
        note_type: "text".to_string(),
        note_group: None,
        title: title.to_string(),
        content: "Expansion joint cracked on the north side".to_string(),
        transcription: None,
        is_important: false,
        tags: vec!["inspection".to_string()],
    }
}

pub fn remote_entry(server_id: i64, payload: TimeEntryPayload, modified: &str) -> RemoteTimeEntry {
    RemoteTimeEntry {
        server_id: ServerId::new(server_id),
        payload,
        last_modified: Some(modified.to_string()),
    }
}

pub async fn manager(h: &Harness, probe: Arc<ScriptedProbe>) -> ConnectionModeManager {
    ConnectionModeManager::load(h.engine.clone(), Arc::new(h.db.clone()), probe)
        .await
        .unwrap()
}
