//! Database layer for fieldsync

mod connection;
mod migrations;
mod note_repository;
mod reference_repository;
mod state_repository;
mod sync_metadata_repository;
mod time_entry_repository;

pub use connection::Database;
pub use note_repository::{NoteRepository, SqliteNoteRepository};
pub use reference_repository::{ReferenceRepository, SqliteReferenceRepository};
pub use state_repository::{SqliteSyncStateRepository, SyncStateRepository};
pub use sync_metadata_repository::{SqliteSyncMetadataRepository, SyncMetadataRepository};
pub use time_entry_repository::{SqliteTimeEntryRepository, TimeEntryRepository};

/// Map a parse failure inside a row mapper onto a rusqlite conversion error
pub(crate) fn conversion_error(
    column: usize,
    error: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, error.into())
}
