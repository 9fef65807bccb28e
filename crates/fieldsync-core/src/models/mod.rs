//! Data models for fieldsync

mod note;
mod record;
mod reference;
mod time_entry;

pub use note::{MediaAttachment, NotePayload, ProjectNote};
pub use record::{
    LocalId, RecordKind, RecordSummary, ServerId, SyncMeta, SyncStatus, SyncUpdate, Versioned,
};
pub use reference::{Project, WorkType};
pub use time_entry::{RemoteTimeEntry, TimeEntry, TimeEntryFilter, TimeEntryPayload};
