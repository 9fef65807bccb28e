//! Sync orchestrator.
//!
//! A run checks its preconditions on the caller's task, then executes on a
//! spawned task: download (projects, work types, time entries) before upload
//! (time entries, then project notes). Remote calls are issued one at a time.
//! Callers observe the run through a [`SyncRun`], which yields exactly one
//! terminal event.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use super::conflict::{resolve, Resolution};
use super::progress::SyncProgressBroadcaster;
use super::result::{RecordOutcome, SyncError, SyncEvent, SyncKind, SyncPhase, SyncResult};
use crate::config::EngineConfig;
use crate::connection::NetworkReachability;
use crate::models::{
    LocalId, MediaAttachment, NotePayload, ProjectNote, RecordKind, RecordSummary,
    RemoteTimeEntry, SyncMeta, SyncStatus, SyncUpdate, TimeEntry, TimeEntryFilter,
    TimeEntryPayload,
};
use crate::remote::{CredentialProvider, MediaUpload, RemoteApi, RemoteError};
use crate::state::StateUpdate;
use crate::store::{LocalStore, SyncStateStore};
use crate::util::{local_date_today, unix_timestamp_millis_now};

type EventSender = mpsc::UnboundedSender<SyncEvent>;

/// Tunables of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Days of remote time entries fetched per download
    pub download_window_days: u32,
    /// Attempts before a media-bearing note is parked as failed
    pub media_max_attempts: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            download_window_days: 30,
            media_max_attempts: 3,
        }
    }
}

impl From<&EngineConfig> for SyncSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            download_window_days: config.download_window_days,
            media_max_attempts: config.media_max_attempts.max(1),
        }
    }
}

/// Handle on a started (or refused) run
#[derive(Debug)]
pub struct SyncRun {
    receiver: mpsc::UnboundedReceiver<SyncEvent>,
}

impl SyncRun {
    /// Next event, `None` once the terminal event has been consumed
    pub async fn next_event(&mut self) -> Option<SyncEvent> {
        self.receiver.recv().await
    }

    /// Drain the run to its terminal event
    pub async fn wait(self) -> Result<SyncResult, SyncError> {
        self.wait_with(|_| {}).await
    }

    /// Drain the run, handing every event to `on_event` first
    pub async fn wait_with(
        mut self,
        mut on_event: impl FnMut(&SyncEvent) + Send,
    ) -> Result<SyncResult, SyncError> {
        while let Some(event) = self.receiver.recv().await {
            on_event(&event);
            match event {
                SyncEvent::Completed(result) => return Ok(result),
                SyncEvent::Failed(error) => return Err(error),
                SyncEvent::Started(_) | SyncEvent::Progress { .. } => {}
            }
        }
        Err(SyncError::Internal(
            "sync ended without a result".to_string(),
        ))
    }
}

/// A record saved locally, plus the upload it triggered when connected
#[derive(Debug)]
#[must_use]
pub struct LocalWrite<T> {
    pub record: T,
    /// Upload run started after the write; `None` when offline or already syncing
    pub upload: Option<SyncRun>,
}

impl<T> LocalWrite<T> {
    /// Wait for the triggered upload, if any, and hand back the record
    pub async fn settle(self) -> (T, Option<Result<SyncResult, SyncError>>) {
        let outcome = match self.upload {
            Some(run) => Some(run.wait().await),
            None => None,
        };
        (self.record, outcome)
    }
}

/// Overview of the local sync backlog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStatusSummary {
    pub in_progress: bool,
    pub pending_time_entries: usize,
    pub pending_notes: usize,
    pub last_full_sync: Option<i64>,
    pub last_upload_sync: Option<i64>,
    pub last_download_sync: Option<i64>,
}

impl SyncStatusSummary {
    /// Read the backlog from the stores.
    ///
    /// `in_progress` defaults to the persisted flag when the caller has no
    /// live engine to ask.
    pub async fn collect(
        store: &dyn LocalStore,
        state: &dyn SyncStateStore,
        in_progress: Option<bool>,
    ) -> crate::Result<Self> {
        let persisted = state.load_state().await?;
        Ok(Self {
            in_progress: in_progress.unwrap_or(persisted.sync_in_progress),
            pending_time_entries: store.pending_count(Some(RecordKind::TimeEntry)).await?,
            pending_notes: store.pending_count(Some(RecordKind::ProjectNote)).await?,
            last_full_sync: persisted.last_full_sync,
            last_upload_sync: persisted.last_upload_sync,
            last_download_sync: persisted.last_download_sync,
        })
    }
}

impl fmt::Display for SyncStatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn when(value: Option<i64>) -> String {
            value
                .and_then(chrono::DateTime::from_timestamp_millis)
                .map_or_else(
                    || "never".to_string(),
                    |at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                )
        }

        writeln!(
            f,
            "Sync in progress: {}",
            if self.in_progress { "yes" } else { "no" }
        )?;
        writeln!(f, "Pending time entries: {}", self.pending_time_entries)?;
        writeln!(f, "Pending notes: {}", self.pending_notes)?;
        writeln!(f, "Last full sync: {}", when(self.last_full_sync))?;
        writeln!(f, "Last upload: {}", when(self.last_upload_sync))?;
        write!(f, "Last download: {}", when(self.last_download_sync))
    }
}

/// Bidirectional sync orchestrator; clones share one in-flight guard.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: Arc<dyn LocalStore>,
    state: Arc<dyn SyncStateStore>,
    remote: Arc<dyn RemoteApi>,
    credentials: Arc<dyn CredentialProvider>,
    network: Arc<dyn NetworkReachability>,
    progress: SyncProgressBroadcaster,
    settings: SyncSettings,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when dropped, including on unwind
struct InFlightGuard {
    inner: Arc<EngineInner>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.store(false, Ordering::Release);
    }
}

impl SyncEngine {
    /// Build an engine with its own progress broadcaster
    pub fn new(
        store: Arc<dyn LocalStore>,
        state: Arc<dyn SyncStateStore>,
        remote: Arc<dyn RemoteApi>,
        credentials: Arc<dyn CredentialProvider>,
        network: Arc<dyn NetworkReachability>,
        settings: SyncSettings,
    ) -> Self {
        Self::with_progress(
            store,
            state,
            remote,
            credentials,
            network,
            settings,
            SyncProgressBroadcaster::new(),
        )
    }

    /// Build an engine publishing progress through a shared broadcaster.
    ///
    /// Use this when something outside the engine (a UI, the mode manager)
    /// already holds the broadcaster and subscribes to it.
    #[allow(clippy::too_many_arguments)]
    pub fn with_progress(
        store: Arc<dyn LocalStore>,
        state: Arc<dyn SyncStateStore>,
        remote: Arc<dyn RemoteApi>,
        credentials: Arc<dyn CredentialProvider>,
        network: Arc<dyn NetworkReachability>,
        settings: SyncSettings,
        progress: SyncProgressBroadcaster,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                state,
                remote,
                credentials,
                network,
                progress,
                settings,
                in_flight: AtomicBool::new(false),
            }),
        }
    }

    /// Progress of the current run
    pub fn progress(&self) -> &SyncProgressBroadcaster {
        &self.inner.progress
    }

    /// Reachability source consulted before every run
    pub fn network(&self) -> Arc<dyn NetworkReachability> {
        Arc::clone(&self.inner.network)
    }

    /// Whether a run currently holds the in-flight guard
    pub fn is_running(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Start a download-then-upload run; see [`SyncEngine::start`]
    pub async fn sync_full(&self) -> SyncRun {
        self.start(SyncKind::Full).await
    }

    /// Start a run that only pushes pending records
    pub async fn sync_upload_only(&self) -> SyncRun {
        self.start(SyncKind::UploadOnly).await
    }

    /// Start a run that only refreshes from the server
    pub async fn sync_download_only(&self) -> SyncRun {
        self.start(SyncKind::DownloadOnly).await
    }

    /// Start a run and wait for its result
    pub async fn run(&self, kind: SyncKind) -> Result<SyncResult, SyncError> {
        self.start(kind).await.wait().await
    }

    /// Start a run in the background.
    ///
    /// Precondition failures (no network, no credential, another run in
    /// flight) are queued as the terminal event before this returns, and no
    /// work is spawned.
    pub async fn start(&self, kind: SyncKind) -> SyncRun {
        let (sender, receiver) = mpsc::unbounded_channel();

        match Arc::clone(&self.inner).acquire().await {
            Ok((guard, token)) => {
                tokio::spawn(Arc::clone(&self.inner).drive(kind, token, guard, sender));
            }
            Err(error) => {
                tracing::info!("Sync ({}) not started: {}", kind, error);
                sender.send(SyncEvent::Failed(error)).ok();
            }
        }

        SyncRun { receiver }
    }

    /// Records waiting for upload, of one kind or all user-owned kinds
    pub async fn pending_count(&self, kind: Option<RecordKind>) -> crate::Result<usize> {
        self.inner.store.pending_count(kind).await
    }

    /// Completion time (Unix ms) of the last run of the given kind
    pub async fn last_sync_timestamp(&self, kind: SyncKind) -> crate::Result<Option<i64>> {
        Ok(self.inner.state.load_state().await?.last_sync(kind))
    }

    /// Records parked after exhausting their attempts
    pub async fn list_failed(&self, kind: RecordKind) -> crate::Result<Vec<RecordSummary>> {
        self.inner.store.list_failed(kind).await
    }

    /// Re-queue a parked record with a fresh attempt budget
    pub async fn retry_failed(&self, kind: RecordKind, id: &LocalId) -> crate::Result<bool> {
        let reset = self.inner.store.reset_for_retry(kind, id).await?;
        if reset {
            tracing::info!("Re-queued {} {} for upload", kind, id);
        }
        Ok(reset)
    }

    /// Backlog and timestamps, with the live in-flight flag
    pub async fn status_summary(&self) -> crate::Result<SyncStatusSummary> {
        SyncStatusSummary::collect(
            self.inner.store.as_ref(),
            self.inner.state.as_ref(),
            Some(self.is_running()),
        )
        .await
    }

    /// Save a new time entry locally and offer it upstream when connected
    pub async fn record_time_entry(
        &self,
        payload: TimeEntryPayload,
    ) -> crate::Result<LocalWrite<TimeEntry>> {
        let entry = TimeEntry::new(payload);
        self.inner.store.insert_time_entry(&entry).await?;
        tracing::debug!("Recorded time entry {}", entry.local_id);
        Ok(LocalWrite {
            record: entry,
            upload: self.kick_upload().await,
        })
    }

    /// Apply a local edit and offer it upstream when connected.
    ///
    /// The entry goes back to pending with a new revision, so an upload
    /// already in flight cannot mark the edit as synced.
    pub async fn edit_time_entry(
        &self,
        id: &LocalId,
        payload: &TimeEntryPayload,
    ) -> crate::Result<LocalWrite<TimeEntry>> {
        let entry = self.inner.store.update_time_entry(id, payload).await?;
        tracing::debug!("Edited time entry {} (revision {})", id, entry.sync.revision);
        Ok(LocalWrite {
            record: entry,
            upload: self.kick_upload().await,
        })
    }

    /// Save a new note locally and offer it upstream when connected
    pub async fn record_note(
        &self,
        payload: NotePayload,
        media: Option<MediaAttachment>,
    ) -> crate::Result<LocalWrite<ProjectNote>> {
        let note = ProjectNote::new(payload, media);
        self.inner.store.insert_note(&note).await?;
        tracing::debug!("Recorded note {}", note.local_id);
        Ok(LocalWrite {
            record: note,
            upload: self.kick_upload().await,
        })
    }

    /// Opportunistic upload after a local write; the run proceeds even if
    /// the returned handle is dropped.
    async fn kick_upload(&self) -> Option<SyncRun> {
        if self.is_running() || !self.inner.network.is_network_available().await {
            return None;
        }
        Some(self.sync_upload_only().await)
    }
}

impl EngineInner {
    async fn acquire(self: Arc<Self>) -> Result<(InFlightGuard, String), SyncError> {
        if !self.network.is_network_available().await {
            return Err(SyncError::NoNetwork);
        }

        let token = self
            .credentials
            .access_token()
            .ok_or(SyncError::Unauthenticated)?;

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }

        Ok((InFlightGuard { inner: self }, token))
    }

    async fn drive(
        self: Arc<Self>,
        kind: SyncKind,
        token: String,
        guard: InFlightGuard,
        events: EventSender,
    ) {
        tracing::info!("Starting {} sync", kind);
        self.persist(StateUpdate::SyncInProgress(true)).await;

        let worker = tokio::spawn({
            let inner = Arc::clone(&self);
            let events = events.clone();
            async move { inner.execute(kind, &token, &events).await }
        });

        let outcome = match worker.await {
            Ok(Ok(result)) => {
                self.persist(StateUpdate::SyncFinished {
                    kind,
                    at: unix_timestamp_millis_now(),
                })
                .await;
                Ok(result)
            }
            Ok(Err(error)) => Err(SyncError::Internal(error.to_string())),
            Err(join_error) if join_error.is_panic() => Err(SyncError::Internal(
                "sync task panicked".to_string(),
            )),
            Err(join_error) => Err(SyncError::Internal(join_error.to_string())),
        };

        self.persist(StateUpdate::SyncInProgress(false)).await;
        self.progress.end_sync();
        drop(guard);

        let terminal = match outcome {
            Ok(result) => {
                tracing::info!("{} sync finished: {}", kind, result.summary());
                SyncEvent::Completed(result)
            }
            Err(error) => {
                tracing::error!("{} sync aborted: {}", kind, error);
                SyncEvent::Failed(error)
            }
        };
        events.send(terminal).ok();
    }

    async fn execute(
        &self,
        kind: SyncKind,
        token: &str,
        events: &EventSender,
    ) -> crate::Result<SyncResult> {
        let mut result = SyncResult::default();

        if kind.downloads() {
            self.download(token, &mut result, events).await?;
        }
        if kind.uploads() {
            self.upload(token, &mut result, events).await?;
        }

        Ok(result)
    }

    async fn persist(&self, update: StateUpdate) {
        if let Err(error) = self.state.apply_state(update).await {
            tracing::warn!("Failed to persist sync state {:?}: {}", update, error);
        }
    }

    fn report(&self, events: &EventSender, message: String, current: usize, total: usize) {
        self.progress.update_progress(current);
        events
            .send(SyncEvent::Progress {
                message,
                current,
                total,
            })
            .ok();
    }

    // -----------------------------------------------------------------------
    // Download
    // -----------------------------------------------------------------------

    async fn download(
        &self,
        token: &str,
        result: &mut SyncResult,
        events: &EventSender,
    ) -> crate::Result<()> {
        const STEPS: usize = 3;

        events.send(SyncEvent::Started(SyncPhase::Download)).ok();
        self.progress.start_sync(STEPS);

        self.report(events, "Downloading projects".to_string(), 1, STEPS);
        match self.remote.list_projects(token).await {
            Ok(projects) => {
                self.store.replace_projects(&projects).await?;
                result.downloaded += projects.len();
                tracing::debug!("Downloaded {} projects", projects.len());
            }
            Err(error) => Self::kind_failed(result, "projects", &error),
        }

        self.report(events, "Downloading work types".to_string(), 2, STEPS);
        match self.remote.list_work_types(token).await {
            Ok(work_types) => {
                self.store.replace_work_types(&work_types).await?;
                result.downloaded += work_types.len();
                tracing::debug!("Downloaded {} work types", work_types.len());
            }
            Err(error) => Self::kind_failed(result, "work types", &error),
        }

        self.report(events, "Downloading time entries".to_string(), 3, STEPS);
        let filter = TimeEntryFilter::trailing_days(
            local_date_today(),
            self.settings.download_window_days,
        );
        match self.remote.list_time_entries(token, &filter).await {
            Ok(entries) => {
                result.downloaded += entries.len();
                let conflicts = self.reconcile_time_entries(&entries).await?;
                result.conflicts_resolved += conflicts;
                tracing::debug!(
                    "Downloaded {} time entries ({} conflicts resolved)",
                    entries.len(),
                    conflicts
                );
            }
            Err(error) => Self::kind_failed(result, "time entries", &error),
        }

        Ok(())
    }

    fn kind_failed(result: &mut SyncResult, what: &str, error: &RemoteError) {
        tracing::warn!("Downloading {} failed: {}", what, error);
        result.record_failure(format!("{what} download failed: {error}"));
    }

    /// Merge server time entries into the store; returns how many diverging
    /// local copies were overwritten by the server.
    async fn reconcile_time_entries(&self, entries: &[RemoteTimeEntry]) -> crate::Result<usize> {
        let mut conflicts = 0;

        for remote in entries {
            let Some(server_id) = remote.server_id else {
                tracing::debug!("Skipping server time entry without id");
                continue;
            };

            let Some(local) = self.store.find_time_entry_by_server_id(server_id).await? else {
                self.store.insert_server_time_entry(remote).await?;
                continue;
            };

            match resolve(remote, &local) {
                Resolution::ServerWins => {
                    let diverged =
                        local.payload != remote.payload || local.sync.status != SyncStatus::Synced;
                    let applied = self
                        .store
                        .overwrite_time_entry(&local.local_id, remote, local.sync.revision)
                        .await?;
                    if !applied {
                        tracing::debug!(
                            "Time entry #{} edited during download; keeping the local copy",
                            server_id
                        );
                    } else if diverged {
                        conflicts += 1;
                        tracing::debug!("Server copy of time entry #{} wins", server_id);
                    }
                }
                Resolution::LocalWins => {
                    tracing::debug!(
                        "Local copy of time entry #{} is newer; queued for upload",
                        server_id
                    );
                    self.store
                        .update_sync_status(
                            RecordKind::TimeEntry,
                            &local.local_id,
                            &SyncUpdate {
                                status: SyncStatus::Pending,
                                error: local.sync.last_error.clone(),
                                attempts: local.sync.attempts,
                            },
                        )
                        .await?;
                }
            }
        }

        Ok(conflicts)
    }

    // -----------------------------------------------------------------------
    // Upload
    // -----------------------------------------------------------------------

    async fn upload(
        &self,
        token: &str,
        result: &mut SyncResult,
        events: &EventSender,
    ) -> crate::Result<()> {
        events.send(SyncEvent::Started(SyncPhase::Upload)).ok();

        let entries = self.store.list_pending_time_entries().await?;
        self.progress.start_sync(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            self.report(
                events,
                format!("Uploading time entry {}/{}", index + 1, entries.len()),
                index + 1,
                entries.len(),
            );
            let outcome = self.offer_time_entry(token, entry).await?;
            Self::tally(result, RecordKind::TimeEntry, &entry.local_id, outcome);
        }

        let notes = self.store.list_pending_notes().await?;
        self.progress.start_sync(notes.len());
        for (index, note) in notes.iter().enumerate() {
            self.report(
                events,
                format!("Uploading note {}/{}", index + 1, notes.len()),
                index + 1,
                notes.len(),
            );
            let outcome = self.offer_note(token, note).await?;
            Self::tally(result, RecordKind::ProjectNote, &note.local_id, outcome);
        }

        Ok(())
    }

    fn tally(result: &mut SyncResult, kind: RecordKind, id: &LocalId, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Synced => result.uploaded += 1,
            RecordOutcome::Superseded => {
                tracing::debug!("{} {} changed during upload; queued again", kind, id);
                result.uploaded += 1;
            }
            RecordOutcome::Retry(error) => {
                tracing::warn!("Upload of {} {} failed: {}", kind, id, error);
                result.record_failure(format!("{kind} {id}: {error}"));
            }
            RecordOutcome::Exhausted(error) => {
                tracing::warn!(
                    "Upload of {} {} failed for the last time, parking it: {}",
                    kind,
                    id,
                    error
                );
                result.record_failure(format!("{kind} {id} (gave up): {error}"));
            }
        }
    }

    async fn offer_time_entry(&self, token: &str, entry: &TimeEntry) -> crate::Result<RecordOutcome> {
        let response = match entry.sync.server_id {
            Some(server_id) => {
                self.remote
                    .update_time_entry(token, server_id, &entry.payload)
                    .await
            }
            None => self.remote.create_time_entry(token, &entry.payload).await,
        };

        match response {
            Ok(accepted) => {
                let applied = self
                    .store
                    .mark_synced(
                        RecordKind::TimeEntry,
                        &entry.local_id,
                        accepted.server_id,
                        entry.sync.revision,
                    )
                    .await?;
                Ok(RecordOutcome::accepted(applied))
            }
            Err(error) => {
                self.record_attempt_failure(
                    RecordKind::TimeEntry,
                    &entry.local_id,
                    &entry.sync,
                    error.to_string(),
                    None,
                )
                .await
            }
        }
    }

    /// Metadata first, then the file; the note is synced only when both land.
    async fn offer_note(&self, token: &str, note: &ProjectNote) -> crate::Result<RecordOutcome> {
        let ceiling = note
            .has_media()
            .then_some(self.settings.media_max_attempts);

        let upload = match &note.media {
            Some(media) if !media.is_uploaded() => match read_media(media).await {
                Ok(upload) => Some(upload),
                Err(message) => {
                    return self
                        .record_attempt_failure(
                            RecordKind::ProjectNote,
                            &note.local_id,
                            &note.sync,
                            message,
                            ceiling,
                        )
                        .await;
                }
            },
            _ => None,
        };

        let response = match note.sync.server_id {
            Some(server_id) => self.remote.update_note(token, server_id, &note.payload).await,
            None => self.remote.create_note(token, &note.payload).await,
        };
        let accepted = match response {
            Ok(accepted) => accepted,
            Err(error) => {
                return self
                    .record_attempt_failure(
                        RecordKind::ProjectNote,
                        &note.local_id,
                        &note.sync,
                        error.to_string(),
                        ceiling,
                    )
                    .await;
            }
        };

        let Some(upload) = upload else {
            let applied = self
                .store
                .mark_note_synced(&note.local_id, accepted.server_id, None, note.sync.revision)
                .await?;
            return Ok(RecordOutcome::accepted(applied));
        };

        match self
            .remote
            .upload_note_media(token, accepted.server_id, upload)
            .await
        {
            Ok(stored) => {
                let applied = self
                    .store
                    .mark_note_synced(
                        &note.local_id,
                        accepted.server_id,
                        stored.url.as_deref(),
                        note.sync.revision,
                    )
                    .await?;
                Ok(RecordOutcome::accepted(applied))
            }
            Err(error) => {
                // Keep the accepted id so the retry updates instead of duplicating
                if note.sync.server_id != Some(accepted.server_id) {
                    self.store
                        .set_server_id(RecordKind::ProjectNote, &note.local_id, accepted.server_id)
                        .await?;
                }
                self.record_attempt_failure(
                    RecordKind::ProjectNote,
                    &note.local_id,
                    &note.sync,
                    format!("media upload failed: {error}"),
                    ceiling,
                )
                .await
            }
        }
    }

    /// Bump the attempt counter; park the record once `ceiling` is reached.
    async fn record_attempt_failure(
        &self,
        kind: RecordKind,
        id: &LocalId,
        meta: &SyncMeta,
        message: String,
        ceiling: Option<u32>,
    ) -> crate::Result<RecordOutcome> {
        let attempts = meta.attempts.saturating_add(1);
        let exhausted = ceiling.is_some_and(|max| attempts >= max);
        let status = if exhausted {
            SyncStatus::Failed
        } else {
            SyncStatus::Pending
        };

        self.store
            .update_sync_status(
                kind,
                id,
                &SyncUpdate {
                    status,
                    error: Some(message.clone()),
                    attempts,
                },
            )
            .await?;

        Ok(if exhausted {
            RecordOutcome::Exhausted(message)
        } else {
            RecordOutcome::Retry(message)
        })
    }
}

async fn read_media(media: &MediaAttachment) -> Result<MediaUpload, String> {
    let path = Path::new(&media.local_file_path);
    let bytes = tokio::fs::read(path).await.map_err(|error| {
        if error.kind() == std::io::ErrorKind::NotFound {
            format!("media file not found: {}", path.display())
        } else {
            format!("cannot read media file {}: {error}", path.display())
        }
    })?;

    let file_name = path
        .file_name()
        .map_or_else(|| "media".to_string(), |name| name.to_string_lossy().to_string());
    let mime_type = media
        .mime_type
        .clone()
        .unwrap_or_else(|| guess_mime_type(path).to_string());

    Ok(MediaUpload {
        file_name,
        mime_type,
        bytes,
    })
}

fn guess_mime_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("m4a" | "mp4a") => "audio/mp4",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("3gp") => "audio/3gpp",
        Some("mp4") => "video/mp4",
        _ => "application/octet-stream",
    }
}
