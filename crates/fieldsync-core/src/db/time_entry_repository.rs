//! Time entry repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::{Error, Result};
use crate::models::{
    LocalId, RemoteTimeEntry, ServerId, SyncMeta, SyncStatus, TimeEntry, TimeEntryPayload,
};
use crate::util::{local_timestamp_now, unix_timestamp_millis_now};
use rusqlite::{params, Connection, OptionalExtension};

use super::conversion_error;

const SELECT_COLUMNS: &str = "SELECT local_id, server_id, project_id, work_type_id, report_date,
        datetime_from, datetime_to, hours, description,
        sync_status, sync_attempts, sync_error, last_modified, revision
     FROM time_entries";

/// Trait for time entry storage operations
pub trait TimeEntryRepository {
    /// Insert a locally-authored entry
    fn insert(&self, entry: &TimeEntry) -> Result<()>;

    /// Get an entry by local ID
    fn get(&self, id: &LocalId) -> Result<Option<TimeEntry>>;

    /// Find the local copy of a server record
    fn find_by_server_id(&self, server_id: ServerId) -> Result<Option<TimeEntry>>;

    /// Apply a local edit: replace the payload and re-flag the entry pending
    fn update_payload(&self, id: &LocalId, payload: &TimeEntryPayload) -> Result<TimeEntry>;

    /// Insert a server-originated entry as synced
    fn insert_server_copy(&self, remote: &RemoteTimeEntry) -> Result<LocalId>;

    /// Overwrite a local copy with the server version and mark it synced.
    ///
    /// Only applies while the row is still at `revision`; returns `false` and
    /// leaves the row alone when a local edit landed in between.
    fn overwrite_with_server_copy(
        &self,
        id: &LocalId,
        remote: &RemoteTimeEntry,
        revision: u32,
    ) -> Result<bool>;

    /// Entries waiting for upload, oldest first
    fn list_pending(&self) -> Result<Vec<TimeEntry>>;

    /// Most recent entries by report date
    fn list_recent(&self, limit: usize) -> Result<Vec<TimeEntry>>;
}

/// `SQLite` implementation of `TimeEntryRepository`
pub struct SqliteTimeEntryRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteTimeEntryRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a time entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimeEntry> {
        let local_id: String = row.get(0)?;
        let status: String = row.get(9)?;
        Ok(TimeEntry {
            local_id: local_id.parse().map_err(|e| conversion_error(0, e))?,
            payload: TimeEntryPayload {
                project_id: row.get(2)?,
                work_type_id: row.get(3)?,
                report_date: row.get(4)?,
                datetime_from: row.get(5)?,
                datetime_to: row.get(6)?,
                hours: row.get(7)?,
                description: row.get(8)?,
            },
            sync: SyncMeta {
                server_id: row.get::<_, Option<i64>>(1)?.and_then(ServerId::new),
                status: status.parse().map_err(|e: String| conversion_error(9, e))?,
                attempts: row.get(10)?,
                last_error: row.get(11)?,
                last_modified: row.get(12)?,
                revision: row.get(13)?,
            },
        })
    }

    fn query_one(&self, filter: &str, param: &dyn rusqlite::ToSql) -> Result<Option<TimeEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE {filter}");
        Ok(self
            .conn
            .query_row(&sql, [param], Self::parse_entry)
            .optional()?)
    }
}

impl TimeEntryRepository for SqliteTimeEntryRepository<'_> {
    fn insert(&self, entry: &TimeEntry) -> Result<()> {
        let payload = &entry.payload;
        self.conn.execute(
            "INSERT INTO time_entries
             (local_id, server_id, project_id, work_type_id, report_date, datetime_from,
              datetime_to, hours, description, sync_status, sync_attempts, sync_error,
              last_modified, revision, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.local_id.as_str(),
                entry.sync.server_id.map(ServerId::get),
                payload.project_id,
                payload.work_type_id,
                payload.report_date,
                payload.datetime_from,
                payload.datetime_to,
                payload.hours,
                payload.description,
                entry.sync.status.as_str(),
                entry.sync.attempts,
                entry.sync.last_error,
                entry.sync.last_modified,
                entry.sync.revision,
                unix_timestamp_millis_now(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &LocalId) -> Result<Option<TimeEntry>> {
        self.query_one("local_id = ?", &id.as_str())
    }

    fn find_by_server_id(&self, server_id: ServerId) -> Result<Option<TimeEntry>> {
        self.query_one("server_id = ?", &server_id.get())
    }

    fn update_payload(&self, id: &LocalId, payload: &TimeEntryPayload) -> Result<TimeEntry> {
        let rows = self.conn.execute(
            "UPDATE time_entries
             SET project_id = ?, work_type_id = ?, report_date = ?, datetime_from = ?,
                 datetime_to = ?, hours = ?, description = ?,
                 sync_status = 'pending', last_modified = ?, revision = revision + 1
             WHERE local_id = ?",
            params![
                payload.project_id,
                payload.work_type_id,
                payload.report_date,
                payload.datetime_from,
                payload.datetime_to,
                payload.hours,
                payload.description,
                local_timestamp_now(),
                id.as_str(),
            ],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        self.get(id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn insert_server_copy(&self, remote: &RemoteTimeEntry) -> Result<LocalId> {
        let server_id = remote.server_id.ok_or_else(|| {
            Error::InvalidInput("server time entry without server id".to_string())
        })?;
        let entry = TimeEntry {
            local_id: LocalId::new(),
            payload: remote.payload.clone(),
            sync: SyncMeta::from_server(server_id, remote.last_modified.clone()),
        };
        self.insert(&entry)?;
        Ok(entry.local_id)
    }

    fn overwrite_with_server_copy(
        &self,
        id: &LocalId,
        remote: &RemoteTimeEntry,
        revision: u32,
    ) -> Result<bool> {
        let server_id = remote.server_id.ok_or_else(|| {
            Error::InvalidInput("server time entry without server id".to_string())
        })?;
        let payload = &remote.payload;
        let rows = self.conn.execute(
            "UPDATE time_entries
             SET server_id = ?, project_id = ?, work_type_id = ?, report_date = ?,
                 datetime_from = ?, datetime_to = ?, hours = ?, description = ?,
                 sync_status = ?, sync_attempts = 0, sync_error = NULL, last_modified = ?
             WHERE local_id = ? AND revision = ?",
            params![
                server_id.get(),
                payload.project_id,
                payload.work_type_id,
                payload.report_date,
                payload.datetime_from,
                payload.datetime_to,
                payload.hours,
                payload.description,
                SyncStatus::Synced.as_str(),
                remote.last_modified,
                id.as_str(),
                revision,
            ],
        )?;

        if rows == 0 {
            if self.get(id)?.is_none() {
                return Err(Error::NotFound(id.to_string()));
            }
            return Ok(false);
        }
        Ok(true)
    }

    fn list_pending(&self) -> Result<Vec<TimeEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE sync_status = ? ORDER BY created_at ASC, local_id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![SyncStatus::Pending.as_str()], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<TimeEntry>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY report_date DESC, created_at DESC LIMIT ?");
        let mut stmt = self.conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![limit as i64], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn payload(hours: f64) -> TimeEntryPayload {
        TimeEntryPayload {
            project_id: 3,
            work_type_id: 1,
            report_date: "2024-04-10".to_string(),
            datetime_from: Some("2024-04-10 08:00:00".to_string()),
            datetime_to: None,
            hours,
            description: Some("Trenching".to_string()),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup();
        let repo = SqliteTimeEntryRepository::new(db.connection());

        let entry = TimeEntry::new(payload(4.0));
        repo.insert(&entry).unwrap();

        let fetched = repo.get(&entry.local_id).unwrap().unwrap();
        assert_eq!(fetched, entry);
    }

    #[test]
    fn test_list_pending_excludes_synced() {
        let db = setup();
        let repo = SqliteTimeEntryRepository::new(db.connection());

        let pending = TimeEntry::new(payload(1.0));
        repo.insert(&pending).unwrap();
        repo.insert_server_copy(&RemoteTimeEntry {
            server_id: ServerId::new(9),
            payload: payload(2.0),
            last_modified: Some("2024-04-10 09:00:00".to_string()),
        })
        .unwrap();

        let listed = repo.list_pending().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].local_id, pending.local_id);
    }

    #[test]
    fn test_overwrite_with_server_copy_marks_synced() {
        let db = setup();
        let repo = SqliteTimeEntryRepository::new(db.connection());

        let mut entry = TimeEntry::new(payload(1.0));
        entry.sync.server_id = ServerId::new(42);
        entry.sync.attempts = 2;
        entry.sync.last_error = Some("timeout".to_string());
        repo.insert(&entry).unwrap();

        let remote = RemoteTimeEntry {
            server_id: ServerId::new(42),
            payload: payload(6.5),
            last_modified: Some("2024-04-11 10:00:00".to_string()),
        };
        let applied = repo
            .overwrite_with_server_copy(&entry.local_id, &remote, entry.sync.revision)
            .unwrap();
        assert!(applied);

        let fetched = repo.find_by_server_id(ServerId::new(42).unwrap()).unwrap().unwrap();
        assert_eq!(fetched.payload, remote.payload);
        assert_eq!(fetched.sync.status, SyncStatus::Synced);
        assert_eq!(fetched.sync.attempts, 0);
        assert_eq!(fetched.sync.last_error, None);
        assert_eq!(fetched.sync.last_modified, remote.last_modified);
    }

    #[test]
    fn test_overwrite_skips_entry_edited_since_read() {
        let db = setup();
        let repo = SqliteTimeEntryRepository::new(db.connection());

        let local_id = repo
            .insert_server_copy(&RemoteTimeEntry {
                server_id: ServerId::new(42),
                payload: payload(1.0),
                last_modified: Some("2024-04-10 09:00:00".to_string()),
            })
            .unwrap();
        let snapshot = repo.get(&local_id).unwrap().unwrap();
        repo.update_payload(&local_id, &payload(7.0)).unwrap();

        let remote = RemoteTimeEntry {
            server_id: ServerId::new(42),
            payload: payload(2.0),
            last_modified: Some("2024-04-11 10:00:00".to_string()),
        };
        let applied = repo
            .overwrite_with_server_copy(&local_id, &remote, snapshot.sync.revision)
            .unwrap();

        let fetched = repo.get(&local_id).unwrap().unwrap();
        assert!(!applied);
        assert_eq!(fetched.payload, payload(7.0));
        assert_eq!(fetched.sync.status, SyncStatus::Pending);
        assert_eq!(fetched.sync.revision, snapshot.sync.revision + 1);
    }

    #[test]
    fn test_overwrite_missing_entry_is_not_found() {
        let db = setup();
        let repo = SqliteTimeEntryRepository::new(db.connection());
        let remote = RemoteTimeEntry {
            server_id: ServerId::new(42),
            payload: payload(2.0),
            last_modified: None,
        };
        let result = repo.overwrite_with_server_copy(&LocalId::new(), &remote, 0);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_update_payload_repends_entry() {
        let db = setup();
        let repo = SqliteTimeEntryRepository::new(db.connection());

        let local_id = repo
            .insert_server_copy(&RemoteTimeEntry {
                server_id: ServerId::new(5),
                payload: payload(1.0),
                last_modified: Some("2000-01-01 00:00:00".to_string()),
            })
            .unwrap();

        let updated = repo.update_payload(&local_id, &payload(3.0)).unwrap();
        assert_eq!(updated.sync.status, SyncStatus::Pending);
        assert_eq!(updated.sync.revision, 1);
        assert!(updated.payload.hours > 2.9);
        assert_ne!(
            updated.sync.last_modified.as_deref(),
            Some("2000-01-01 00:00:00")
        );
    }

    #[test]
    fn test_update_missing_entry_is_not_found() {
        let db = setup();
        let repo = SqliteTimeEntryRepository::new(db.connection());
        let result = repo.update_payload(&LocalId::new(), &payload(1.0));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
