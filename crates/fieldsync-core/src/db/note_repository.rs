//! Project note repository implementation

use crate::error::{Error, Result};
use crate::models::{
    LocalId, MediaAttachment, NotePayload, ProjectNote, ServerId, SyncMeta, SyncStatus,
};
use crate::util::unix_timestamp_millis_now;
use rusqlite::{params, Connection, OptionalExtension};

use super::conversion_error;

const SELECT_COLUMNS: &str = "SELECT local_id, server_id, project_id, note_type, note_group,
        title, content, transcription, is_important, tags,
        local_file_path, mime_type, server_url,
        sync_status, sync_attempts, sync_error, last_modified, revision
     FROM project_notes";

/// Trait for project note storage operations
pub trait NoteRepository {
    /// Insert a locally-authored note
    fn insert(&self, note: &ProjectNote) -> Result<()>;

    /// Get a note by local ID
    fn get(&self, id: &LocalId) -> Result<Option<ProjectNote>>;

    /// Notes waiting for upload, oldest first
    fn list_pending(&self) -> Result<Vec<ProjectNote>>;

    /// Mark a note synced, recording the stored media URL in the same statement.
    ///
    /// When the note moved past `revision` meanwhile, only the server id and
    /// URL are stored, the note stays pending and `false` is returned.
    fn mark_synced_with_media(
        &self,
        id: &LocalId,
        server_id: ServerId,
        media_url: Option<&str>,
        revision: u32,
    ) -> Result<bool>;
}

/// `SQLite` implementation of `NoteRepository`
pub struct SqliteNoteRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteNoteRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a note from a database row
    fn parse_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProjectNote> {
        let local_id: String = row.get(0)?;
        let tags: String = row.get(9)?;
        let local_file_path: Option<String> = row.get(10)?;
        let status: String = row.get(13)?;

        let media = match local_file_path {
            Some(local_file_path) => Some(MediaAttachment {
                local_file_path,
                mime_type: row.get(11)?,
                server_url: row.get(12)?,
            }),
            None => None,
        };

        Ok(ProjectNote {
            local_id: local_id.parse().map_err(|e| conversion_error(0, e))?,
            payload: NotePayload {
                project_id: row.get(2)?,
                note_type: row.get(3)?,
                note_group: row.get(4)?,
                title: row.get(5)?,
                content: row.get(6)?,
                transcription: row.get(7)?,
                is_important: row.get::<_, i32>(8)? != 0,
                tags: serde_json::from_str(&tags).map_err(|e| conversion_error(9, e))?,
            },
            media,
            sync: SyncMeta {
                server_id: row.get::<_, Option<i64>>(1)?.and_then(ServerId::new),
                status: status.parse().map_err(|e: String| conversion_error(13, e))?,
                attempts: row.get(14)?,
                last_error: row.get(15)?,
                last_modified: row.get(16)?,
                revision: row.get(17)?,
            },
        })
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn insert(&self, note: &ProjectNote) -> Result<()> {
        let payload = &note.payload;
        let media = note.media.as_ref();
        self.conn.execute(
            "INSERT INTO project_notes
             (local_id, server_id, project_id, note_type, note_group, title, content,
              transcription, is_important, tags, local_file_path, mime_type, server_url,
              sync_status, sync_attempts, sync_error, last_modified, revision, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                note.local_id.as_str(),
                note.sync.server_id.map(ServerId::get),
                payload.project_id,
                payload.note_type,
                payload.note_group,
                payload.title,
                payload.content,
                payload.transcription,
                i32::from(payload.is_important),
                serde_json::to_string(&payload.tags)?,
                media.map(|media| media.local_file_path.as_str()),
                media.and_then(|media| media.mime_type.as_deref()),
                media.and_then(|media| media.server_url.as_deref()),
                note.sync.status.as_str(),
                note.sync.attempts,
                note.sync.last_error,
                note.sync.last_modified,
                note.sync.revision,
                unix_timestamp_millis_now(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &LocalId) -> Result<Option<ProjectNote>> {
        let sql = format!("{SELECT_COLUMNS} WHERE local_id = ?");
        Ok(self
            .conn
            .query_row(&sql, params![id.as_str()], Self::parse_note)
            .optional()?)
    }

    fn list_pending(&self) -> Result<Vec<ProjectNote>> {
        let sql = format!("{SELECT_COLUMNS} WHERE sync_status = ? ORDER BY created_at ASC, local_id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let notes = stmt
            .query_map(params![SyncStatus::Pending.as_str()], Self::parse_note)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(notes)
    }

    fn mark_synced_with_media(
        &self,
        id: &LocalId,
        server_id: ServerId,
        media_url: Option<&str>,
        revision: u32,
    ) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE project_notes
             SET server_id = ?, server_url = COALESCE(?, server_url),
                 sync_status = 'synced', sync_attempts = 0, sync_error = NULL
             WHERE local_id = ? AND revision = ?",
            params![server_id.get(), media_url, id.as_str(), revision],
        )?;
        if rows == 1 {
            return Ok(true);
        }

        let rows = self.conn.execute(
            "UPDATE project_notes SET server_id = ?, server_url = COALESCE(?, server_url)
             WHERE local_id = ?",
            params![server_id.get(), media_url, id.as_str()],
        )?;
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        tracing::debug!("Note {} changed during upload, leaving it pending", id);
        Ok(false)
    }
}
