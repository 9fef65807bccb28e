//! Sync state repository implementation

use crate::connection::ConnectionMode;
use crate::error::Result;
use crate::state::{StateUpdate, SyncState};
use crate::sync::SyncKind;
use rusqlite::{params, Connection, OptionalExtension};

const KEY_LAST_FULL_SYNC: &str = "last_full_sync";
const KEY_LAST_UPLOAD_SYNC: &str = "last_upload_sync";
const KEY_LAST_DOWNLOAD_SYNC: &str = "last_download_sync";
const KEY_CONNECTION_MODE: &str = "connection_mode";
const KEY_LAST_ONLINE_AT: &str = "last_online_at";
const KEY_SYNC_IN_PROGRESS: &str = "sync_in_progress";
const KEY_DETECTION_IN_PROGRESS: &str = "detection_in_progress";

/// Trait for persisted sync state operations
pub trait SyncStateRepository {
    /// Load the state, falling back to defaults for missing keys
    fn load(&self) -> Result<SyncState>;

    /// Apply one update atomically
    fn apply(&self, update: StateUpdate) -> Result<()>;
}

/// `SQLite` implementation of `SyncStateRepository`
pub struct SqliteSyncStateRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncStateRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn get_value(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row(
                "SELECT value FROM sync_state WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn get_timestamp(&self, key: &str) -> Result<Option<i64>> {
        Ok(self
            .get_value(key)?
            .and_then(|value| value.trim().parse::<i64>().ok())
            .filter(|value| *value > 0))
    }

    fn get_flag(&self, key: &str) -> Result<bool> {
        Ok(self.get_value(key)?.is_some_and(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        }))
    }

    fn set_value(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT OR REPLACE INTO sync_state (key, value) VALUES (?, ?)",
            params![key, value],
        )?;
        Ok(())
    }

    fn flag(value: bool) -> &'static str {
        if value {
            "true"
        } else {
            "false"
        }
    }
}

impl SyncStateRepository for SqliteSyncStateRepository<'_> {
    fn load(&self) -> Result<SyncState> {
        let connection_mode = match self.get_value(KEY_CONNECTION_MODE)? {
            Some(value) => value.parse().unwrap_or_else(|error| {
                tracing::warn!("Ignoring persisted connection mode: {}", error);
                ConnectionMode::Unknown
            }),
            None => ConnectionMode::Unknown,
        };

        Ok(SyncState {
            last_full_sync: self.get_timestamp(KEY_LAST_FULL_SYNC)?,
            last_upload_sync: self.get_timestamp(KEY_LAST_UPLOAD_SYNC)?,
            last_download_sync: self.get_timestamp(KEY_LAST_DOWNLOAD_SYNC)?,
            connection_mode,
            last_online_at: self.get_timestamp(KEY_LAST_ONLINE_AT)?,
            sync_in_progress: self.get_flag(KEY_SYNC_IN_PROGRESS)?,
            detection_in_progress: self.get_flag(KEY_DETECTION_IN_PROGRESS)?,
        })
    }

    fn apply(&self, update: StateUpdate) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;

        match update {
            StateUpdate::SyncFinished { kind, at } => {
                let at = at.to_string();
                let keys: &[&str] = match kind {
                    SyncKind::Full => &[
                        KEY_LAST_FULL_SYNC,
                        KEY_LAST_UPLOAD_SYNC,
                        KEY_LAST_DOWNLOAD_SYNC,
                    ],
                    SyncKind::UploadOnly => &[KEY_LAST_UPLOAD_SYNC],
                    SyncKind::DownloadOnly => &[KEY_LAST_DOWNLOAD_SYNC],
                };
                for key in keys {
                    Self::set_value(&tx, key, &at)?;
                }
            }
            StateUpdate::ModeChanged { mode, at } => {
                Self::set_value(&tx, KEY_CONNECTION_MODE, mode.as_str())?;
                if mode == ConnectionMode::Online {
                    Self::set_value(&tx, KEY_LAST_ONLINE_AT, &at.to_string())?;
                }
            }
            StateUpdate::SyncInProgress(value) => {
                Self::set_value(&tx, KEY_SYNC_IN_PROGRESS, Self::flag(value))?;
            }
            StateUpdate::DetectionInProgress(value) => {
                Self::set_value(&tx, KEY_DETECTION_IN_PROGRESS, Self::flag(value))?;
            }
            StateUpdate::ClearGuards => {
                Self::set_value(&tx, KEY_SYNC_IN_PROGRESS, Self::flag(false))?;
                Self::set_value(&tx, KEY_DETECTION_IN_PROGRESS, Self::flag(false))?;
            }
        }

        tx.commit()?;
        Ok(())
    }
}
