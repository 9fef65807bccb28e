//! Connection mode state machine.
//!
//! Tracks whether the client is online, offline or syncing, probes the
//! server on demand, and starts an automatic full sync whenever the server
//! becomes reachable.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::reachability::ReachabilityProbe;
use super::ConnectionMode;
use crate::state::StateUpdate;
use crate::store::SyncStateStore;
use crate::sync::{SyncEngine, SyncError, SyncEvent, SyncResult};
use crate::util::unix_timestamp_millis_now;

/// Observer of mode transitions and automatic sync runs.
///
/// Callbacks run on the notifying task; a panicking listener is logged and
/// skipped.
pub trait ModeListener: Send + Sync {
    fn on_mode_changed(&self, old: ConnectionMode, new: ConnectionMode, reason: &str);

    fn on_sync_started(&self) {}

    fn on_sync_progress(&self, _message: &str) {}

    /// `synced` counts uploaded plus downloaded records
    fn on_sync_completed(&self, _synced: usize, _failed: usize) {}

    fn on_sync_error(&self, _message: &str) {}
}

/// Registration handle returned by [`ConnectionModeManager::add_mode_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Automatic full sync started in the background
#[derive(Debug)]
pub struct AutoSync {
    handle: JoinHandle<Result<SyncResult, SyncError>>,
}

impl AutoSync {
    /// Wait for the run; dropping the handle instead leaves it running
    pub async fn wait(self) -> Result<SyncResult, SyncError> {
        self.handle
            .await
            .unwrap_or_else(|error| Err(SyncError::Internal(error.to_string())))
    }
}

/// Outcome of a connection detection
#[derive(Debug)]
pub struct Detection {
    pub online: bool,
    pub message: String,
    /// Set when the detection went online and started a sync
    pub auto_sync: Option<AutoSync>,
}

impl Detection {
    fn offline(message: impl Into<String>) -> Self {
        Self {
            online: false,
            message: message.into(),
            auto_sync: None,
        }
    }
}

/// Owns the connection mode; clones share state.
#[derive(Clone)]
pub struct ConnectionModeManager {
    pub(super) inner: Arc<ManagerInner>,
}

pub(super) struct ManagerInner {
    engine: SyncEngine,
    state: Arc<dyn SyncStateStore>,
    probe: Arc<dyn ReachabilityProbe>,
    mode: Mutex<ConnectionMode>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn ModeListener>)>>,
    next_listener_id: AtomicU64,
    detecting: AtomicBool,
    auto_syncing: AtomicBool,
    /// Reachability seen by the last probe, `None` before the first one
    pub(super) last_reachable: Mutex<Option<bool>>,
    pub(super) monitor: Mutex<Option<JoinHandle<()>>>,
}

struct FlagGuard<'a>(&'a AtomicBool);

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Auto-sync slot held by the spawned run
struct AutoSyncSlot {
    inner: Arc<ManagerInner>,
}

impl Drop for AutoSyncSlot {
    fn drop(&mut self) {
        self.inner.auto_syncing.store(false, Ordering::Release);
    }
}

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ConnectionModeManager {
    /// Build a manager whose initial mode is the persisted one.
    ///
    /// A persisted `Syncing` is left over from an interrupted run and is
    /// restored as `Online`.
    pub async fn load(
        engine: SyncEngine,
        state: Arc<dyn SyncStateStore>,
        probe: Arc<dyn ReachabilityProbe>,
    ) -> crate::Result<Self> {
        let persisted = state.load_state().await?.connection_mode;
        let mode = match persisted {
            ConnectionMode::Syncing => ConnectionMode::Online,
            other => other,
        };
        tracing::debug!("Connection mode manager initialized in {} mode", mode);

        Ok(Self {
            inner: Arc::new(ManagerInner {
                engine,
                state,
                probe,
                mode: Mutex::new(mode),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(1),
                detecting: AtomicBool::new(false),
                auto_syncing: AtomicBool::new(false),
                last_reachable: Mutex::new(None),
                monitor: Mutex::new(None),
            }),
        })
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.inner.engine
    }

    pub fn probe(&self) -> Arc<dyn ReachabilityProbe> {
        Arc::clone(&self.inner.probe)
    }

    pub fn get_current_mode(&self) -> ConnectionMode {
        *lock(&self.inner.mode)
    }

    /// Online or syncing
    pub fn is_online(&self) -> bool {
        self.get_current_mode().is_online()
    }

    pub fn is_offline(&self) -> bool {
        self.get_current_mode() == ConnectionMode::Offline
    }

    pub fn is_syncing(&self) -> bool {
        self.get_current_mode() == ConnectionMode::Syncing
    }

    pub fn add_mode_listener(&self, listener: Arc<dyn ModeListener>) -> ListenerId {
        let id = ListenerId(self.inner.next_listener_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, listener));
        id
    }

    pub fn remove_mode_listener(&self, id: ListenerId) -> bool {
        let mut listeners = lock(&self.inner.listeners);
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    /// Check the link, then probe the server.
    ///
    /// Going online starts an automatic full sync without waiting for it.
    /// While another detection runs, returns the current mode immediately.
    pub async fn detect_connection_mode(&self) -> Detection {
        if self
            .inner
            .detecting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Connection detection already running");
            return Detection {
                online: self.is_online(),
                message: "Detection in progress".to_string(),
                auto_sync: None,
            };
        }
        let _detecting = FlagGuard(&self.inner.detecting);

        self.persist(StateUpdate::DetectionInProgress(true)).await;
        let detection = self.run_detection().await;
        self.persist(StateUpdate::DetectionInProgress(false)).await;
        detection
    }

    async fn run_detection(&self) -> Detection {
        tracing::debug!("Detecting connection mode");

        if !self.inner.engine.network().is_network_available().await {
            *lock(&self.inner.last_reachable) = Some(false);
            self.change_mode(ConnectionMode::Offline, "No network connection")
                .await;
            return Detection::offline("No network connection");
        }

        let report = self.inner.probe.probe().await;
        *lock(&self.inner.last_reachable) = Some(report.is_reachable());

        if report.is_reachable() {
            tracing::info!("Server reachable: {}", report.message);
            self.change_mode(ConnectionMode::Online, "Server reachable")
                .await;
            Detection {
                online: true,
                message: report.message,
                auto_sync: self.start_auto_sync().await,
            }
        } else {
            tracing::info!("Server unreachable: {}", report.message);
            self.change_mode(ConnectionMode::Offline, "Server unreachable")
                .await;
            Detection::offline(report.message)
        }
    }

    /// Operator-requested re-detection
    pub async fn retry_connection(&self) -> Detection {
        tracing::info!("Connection retry requested");
        self.detect_connection_mode().await
    }

    /// User-requested full sync; detects the connection first when not online
    pub async fn manual_sync(&self) -> Result<SyncResult, SyncError> {
        tracing::info!("Manual sync requested");

        if !self.is_online() {
            let detection = self.detect_connection_mode().await;
            if !detection.online {
                return Err(SyncError::ServerUnreachable);
            }
            if let Some(auto_sync) = detection.auto_sync {
                return auto_sync.wait().await;
            }
        }

        match self.start_auto_sync().await {
            Some(auto_sync) => auto_sync.wait().await,
            None if self.is_online() => Err(SyncError::AlreadyRunning),
            None => Err(SyncError::ServerUnreachable),
        }
    }

    pub async fn force_offline(&self) {
        self.change_mode(ConnectionMode::Offline, "Offline mode forced")
            .await;
    }

    pub async fn force_online(&self) {
        self.change_mode(ConnectionMode::Online, "Online mode forced")
            .await;
    }

    /// Time since the mode last entered `Online`, `None` if it never did
    pub async fn time_since_last_online(&self) -> crate::Result<Option<Duration>> {
        let state = self.inner.state.load_state().await?;
        Ok(state.last_online_at.map(|at| {
            let elapsed = unix_timestamp_millis_now().saturating_sub(at).max(0);
            Duration::from_millis(u64::try_from(elapsed).unwrap_or_default())
        }))
    }

    /// Human readable mode line, with the backlog when offline
    pub async fn status_message(&self) -> crate::Result<String> {
        let mode = self.get_current_mode();
        if mode != ConnectionMode::Offline {
            return Ok(mode.message().to_string());
        }

        let pending = self.inner.engine.pending_count(None).await?;
        Ok(if pending > 0 {
            format!("{} ({pending} pending)", mode.message())
        } else {
            mode.message().to_string()
        })
    }

    /// React to a reachability transition seen by the monitor
    pub async fn handle_status_change(
        &self,
        was_reachable: bool,
        is_reachable: bool,
    ) -> Option<AutoSync> {
        match (was_reachable, is_reachable) {
            (false, true) => {
                tracing::info!("Reconnection detected");
                self.change_mode(ConnectionMode::Online, "Reconnection detected")
                    .await;
                self.start_auto_sync().await
            }
            (true, false) => {
                tracing::warn!("Connection to server lost");
                self.change_mode(ConnectionMode::Offline, "Connection lost")
                    .await;
                None
            }
            _ => None,
        }
    }

    /// Start the automatic full sync unless one is already running
    async fn start_auto_sync(&self) -> Option<AutoSync> {
        if self
            .inner
            .auto_syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Automatic sync already running");
            return None;
        }
        let slot = AutoSyncSlot {
            inner: Arc::clone(&self.inner),
        };

        if !self.is_online() {
            tracing::debug!("Not online, automatic sync skipped");
            return None;
        }

        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let outcome = manager.auto_sync().await;
            drop(slot);
            outcome
        });
        Some(AutoSync { handle })
    }

    async fn auto_sync(&self) -> Result<SyncResult, SyncError> {
        tracing::info!("Starting automatic sync");
        self.change_mode(ConnectionMode::Syncing, "Synchronizing")
            .await;
        self.notify("sync start", |listener| listener.on_sync_started());

        let run = self.inner.engine.sync_full().await;
        let outcome = run
            .wait_with(|event| {
                if let SyncEvent::Progress { message, .. } = event {
                    self.notify("sync progress", |listener| {
                        listener.on_sync_progress(message);
                    });
                }
            })
            .await;

        match &outcome {
            Ok(result) => {
                self.change_mode(ConnectionMode::Online, "Synchronization finished")
                    .await;
                let synced = result.uploaded + result.downloaded;
                self.notify("sync completion", |listener| {
                    listener.on_sync_completed(synced, result.failed);
                });
            }
            Err(error) => {
                tracing::warn!("Automatic sync failed: {}", error);
                // Another run holding the engine means the link is fine
                let next = if *error == SyncError::AlreadyRunning {
                    ConnectionMode::Online
                } else {
                    ConnectionMode::Offline
                };
                self.change_mode(next, "Synchronization failed").await;
                let message = error.to_string();
                self.notify("sync error", |listener| listener.on_sync_error(&message));
            }
        }

        outcome
    }

    async fn change_mode(&self, new_mode: ConnectionMode, reason: &str) {
        let old_mode = {
            let mut mode = lock(&self.inner.mode);
            if *mode == new_mode {
                return;
            }
            std::mem::replace(&mut *mode, new_mode)
        };

        tracing::info!("Connection mode {} -> {} ({})", old_mode, new_mode, reason);
        self.persist(StateUpdate::ModeChanged {
            mode: new_mode,
            at: unix_timestamp_millis_now(),
        })
        .await;
        self.notify("mode change", |listener| {
            listener.on_mode_changed(old_mode, new_mode, reason);
        });
    }

    fn notify(&self, what: &str, call: impl Fn(&dyn ModeListener)) {
        let listeners: Vec<Arc<dyn ModeListener>> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            if catch_unwind(AssertUnwindSafe(|| call(listener.as_ref()))).is_err() {
                tracing::error!("Mode listener panicked while handling {}", what);
            }
        }
    }

    async fn persist(&self, update: StateUpdate) {
        if let Err(error) = self.inner.state.apply_state(update).await {
            tracing::warn!("Failed to persist connection state {:?}: {}", update, error);
        }
    }
}

/// "just now", "5 min ago", "3h ago", "2 days ago"
pub fn format_elapsed(elapsed: Option<Duration>) -> String {
    let Some(elapsed) = elapsed else {
        return "never".to_string();
    };

    let minutes = elapsed.as_secs() / 60;
    let hours = minutes / 60;
    let days = hours / 24;
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} min ago")
    } else if hours < 24 {
        format!("{hours}h ago")
    } else {
        format!("{days} day{} ago", if days > 1 { "s" } else { "" })
    }
}
