//! Sync metadata operations shared by every user-owned record table

use crate::error::{Error, Result};
use crate::models::{LocalId, RecordKind, RecordSummary, ServerId, SyncStatus, SyncUpdate};
use rusqlite::{params, Connection};

use super::conversion_error;

/// Trait for per-record sync bookkeeping, keyed by record kind
pub trait SyncMetadataRepository {
    /// Overwrite status, error and attempt counter of one record
    fn update_sync_status(&self, kind: RecordKind, id: &LocalId, update: &SyncUpdate)
        -> Result<()>;

    /// Mark a record accepted by the remote, provided it is still at `revision`.
    ///
    /// A record edited since then keeps its pending status and only gains
    /// the server id; the call then returns `false`.
    fn mark_synced(
        &self,
        kind: RecordKind,
        id: &LocalId,
        server_id: ServerId,
        revision: u32,
    ) -> Result<bool>;

    /// Persist a server id without changing the sync status
    fn set_server_id(&self, kind: RecordKind, id: &LocalId, server_id: ServerId) -> Result<()>;

    /// Count records waiting for upload
    fn pending_count(&self, kind: RecordKind) -> Result<usize>;

    /// List records in the given status
    fn list_by_status(&self, kind: RecordKind, status: SyncStatus) -> Result<Vec<RecordSummary>>;

    /// Put a non-synced record back in the queue with a fresh attempt budget
    fn reset_for_retry(&self, kind: RecordKind, id: &LocalId) -> Result<bool>;
}

/// `SQLite` implementation of `SyncMetadataRepository`
pub struct SqliteSyncMetadataRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncMetadataRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn table(kind: RecordKind) -> Result<&'static str> {
        match kind {
            RecordKind::TimeEntry => Ok("time_entries"),
            RecordKind::ProjectNote => Ok("project_notes"),
            RecordKind::Project | RecordKind::WorkType => Err(Error::InvalidInput(format!(
                "{kind} records carry no sync metadata"
            ))),
        }
    }

    fn label_expression(kind: RecordKind) -> &'static str {
        match kind {
            RecordKind::ProjectNote => "title",
            _ => "report_date || ' ' || printf('%.2f', hours) || 'h project #' || project_id",
        }
    }

    fn expect_row(rows: usize, id: &LocalId) -> Result<()> {
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl SyncMetadataRepository for SqliteSyncMetadataRepository<'_> {
    fn update_sync_status(
        &self,
        kind: RecordKind,
        id: &LocalId,
        update: &SyncUpdate,
    ) -> Result<()> {
        if update.status == SyncStatus::Synced {
            return Err(Error::InvalidInput(
                "use mark_synced to record a server id".to_string(),
            ));
        }

        let table = Self::table(kind)?;
        let rows = self.conn.execute(
            &format!(
                "UPDATE {table} SET sync_status = ?, sync_error = ?, sync_attempts = ?
                 WHERE local_id = ?"
            ),
            params![
                update.status.as_str(),
                update.error,
                update.attempts,
                id.as_str()
            ],
        )?;
        Self::expect_row(rows, id)
    }

    fn mark_synced(
        &self,
        kind: RecordKind,
        id: &LocalId,
        server_id: ServerId,
        revision: u32,
    ) -> Result<bool> {
        let table = Self::table(kind)?;
        let rows = self.conn.execute(
            &format!(
                "UPDATE {table}
                 SET server_id = ?, sync_status = 'synced', sync_attempts = 0, sync_error = NULL
                 WHERE local_id = ? AND revision = ?"
            ),
            params![server_id.get(), id.as_str(), revision],
        )?;
        if rows == 1 {
            return Ok(true);
        }

        self.set_server_id(kind, id, server_id)?;
        tracing::debug!("{} {} edited during upload, leaving it pending", kind, id);
        Ok(false)
    }

    fn set_server_id(&self, kind: RecordKind, id: &LocalId, server_id: ServerId) -> Result<()> {
        let table = Self::table(kind)?;
        let rows = self.conn.execute(
            &format!("UPDATE {table} SET server_id = ? WHERE local_id = ?"),
            params![server_id.get(), id.as_str()],
        )?;
        Self::expect_row(rows, id)
    }

    fn pending_count(&self, kind: RecordKind) -> Result<usize> {
        let table = Self::table(kind)?;
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE sync_status = 'pending'"),
            [],
            |row| row.get::<_, usize>(0),
        )?;
        Ok(count)
    }

    fn list_by_status(&self, kind: RecordKind, status: SyncStatus) -> Result<Vec<RecordSummary>> {
        let table = Self::table(kind)?;
        let label = Self::label_expression(kind);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT local_id, server_id, sync_status, sync_attempts, sync_error, {label}
             FROM {table}
             WHERE sync_status = ?
             ORDER BY created_at ASC, local_id ASC"
        ))?;

        let records = stmt
            .query_map(params![status.as_str()], |row| {
                let local_id: String = row.get(0)?;
                let status: String = row.get(2)?;
                Ok(RecordSummary {
                    kind,
                    local_id: local_id.parse().map_err(|e| conversion_error(0, e))?,
                    server_id: row.get::<_, Option<i64>>(1)?.and_then(ServerId::new),
                    status: status.parse().map_err(|e: String| conversion_error(2, e))?,
                    attempts: row.get(3)?,
                    last_error: row.get(4)?,
                    label: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn reset_for_retry(&self, kind: RecordKind, id: &LocalId) -> Result<bool> {
        let table = Self::table(kind)?;
        let rows = self.conn.execute(
            &format!(
                "UPDATE {table}
                 SET sync_status = 'pending', sync_attempts = 0, sync_error = NULL
                 WHERE local_id = ? AND sync_status <> 'synced'"
            ),
            params![id.as_str()],
        )?;
        Ok(rows > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteTimeEntryRepository, TimeEntryRepository};
    use crate::models::{TimeEntry, TimeEntryPayload};
    use pretty_assertions::assert_eq;

    fn insert_entry(db: &Database) -> TimeEntry {
        let entry = TimeEntry::new(TimeEntryPayload {
            project_id: 4,
            work_type_id: 2,
            report_date: "2024-06-01".to_string(),
            datetime_from: None,
            datetime_to: None,
            hours: 2.5,
            description: None,
        });
        SqliteTimeEntryRepository::new(db.connection())
            .insert(&entry)
            .unwrap();
        entry
    }

    #[test]
    fn test_failure_then_success_resets_attempts() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        let entry = insert_entry(&db);

        repo.update_sync_status(
            RecordKind::TimeEntry,
            &entry.local_id,
            &SyncUpdate {
                status: SyncStatus::Pending,
                error: Some("HTTP 502".to_string()),
                attempts: 1,
            },
        )
        .unwrap();
        assert_eq!(repo.pending_count(RecordKind::TimeEntry).unwrap(), 1);

        let applied = repo
            .mark_synced(
                RecordKind::TimeEntry,
                &entry.local_id,
                ServerId::new(300).unwrap(),
                entry.sync.revision,
            )
            .unwrap();
        assert!(applied);

        let stored = SqliteTimeEntryRepository::new(db.connection())
            .get(&entry.local_id)
            .unwrap()
            .unwrap();
        assert_eq!(stored.sync.status, SyncStatus::Synced);
        assert_eq!(stored.sync.attempts, 0);
        assert_eq!(stored.sync.last_error, None);
        assert_eq!(stored.sync.server_id, ServerId::new(300));
        assert_eq!(repo.pending_count(RecordKind::TimeEntry).unwrap(), 0);
    }

    #[test]
    fn test_mark_synced_after_local_edit_only_stores_server_id() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        let entries = SqliteTimeEntryRepository::new(db.connection());
        let entry = insert_entry(&db);

        let mut edited = entry.payload.clone();
        edited.hours = 9.0;
        entries.update_payload(&entry.local_id, &edited).unwrap();

        let applied = repo
            .mark_synced(
                RecordKind::TimeEntry,
                &entry.local_id,
                ServerId::new(301).unwrap(),
                entry.sync.revision,
            )
            .unwrap();

        let stored = entries.get(&entry.local_id).unwrap().unwrap();
        assert!(!applied);
        assert!((stored.payload.hours - 9.0).abs() < f64::EPSILON);
        assert_eq!(stored.sync.status, SyncStatus::Pending);
        assert_eq!(stored.sync.server_id, ServerId::new(301));
        assert_eq!(repo.pending_count(RecordKind::TimeEntry).unwrap(), 1);
    }

    #[test]
    fn test_mark_synced_missing_record_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        let result = repo.mark_synced(
            RecordKind::TimeEntry,
            &LocalId::new(),
            ServerId::new(302).unwrap(),
            0,
        );
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_sync_status_refuses_synced_without_id() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        let entry = insert_entry(&db);

        let result = repo.update_sync_status(
            RecordKind::TimeEntry,
            &entry.local_id,
            &SyncUpdate {
                status: SyncStatus::Synced,
                error: None,
                attempts: 0,
            },
        );
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_failed_listing_and_reset() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        let entry = insert_entry(&db);

        repo.update_sync_status(
            RecordKind::TimeEntry,
            &entry.local_id,
            &SyncUpdate {
                status: SyncStatus::Failed,
                error: Some("rejected".to_string()),
                attempts: 3,
            },
        )
        .unwrap();

        let failed = repo
            .list_by_status(RecordKind::TimeEntry, SyncStatus::Failed)
            .unwrap();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].attempts, 3);
        assert_eq!(failed[0].label, "2024-06-01 2.50h project #4");

        assert!(repo
            .reset_for_retry(RecordKind::TimeEntry, &entry.local_id)
            .unwrap());
        assert!(repo
            .list_by_status(RecordKind::TimeEntry, SyncStatus::Failed)
            .unwrap()
            .is_empty());
        assert_eq!(repo.pending_count(RecordKind::TimeEntry).unwrap(), 1);
    }

    #[test]
    fn test_reference_kinds_are_rejected() {
        let db = Database::open_in_memory().unwrap();
        let repo = SqliteSyncMetadataRepository::new(db.connection());
        assert!(repo.pending_count(RecordKind::Project).is_err());
    }
}
