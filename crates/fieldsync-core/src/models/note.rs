//! Project note model

use serde::{Deserialize, Serialize};

use super::record::{LocalId, SyncMeta, Versioned};

/// Domain fields of a project note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePayload {
    /// `None` for personal notes
    #[serde(default)]
    pub project_id: Option<i64>,
    /// text, audio, dictation, image, video
    pub note_type: String,
    #[serde(default)]
    pub note_group: Option<String>,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub transcription: Option<String>,
    #[serde(default)]
    pub is_important: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// File attached to a note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    pub local_file_path: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Set once the remote has stored the file
    #[serde(default)]
    pub server_url: Option<String>,
}

impl MediaAttachment {
    pub fn new(local_file_path: impl Into<String>, mime_type: Option<String>) -> Self {
        Self {
            local_file_path: local_file_path.into(),
            mime_type,
            server_url: None,
        }
    }

    pub const fn is_uploaded(&self) -> bool {
        self.server_url.is_some()
    }
}

/// A project note in the local store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectNote {
    pub local_id: LocalId,
    pub payload: NotePayload,
    pub media: Option<MediaAttachment>,
    pub sync: SyncMeta,
}

impl ProjectNote {
    /// Create a new locally-authored note, pending upload
    #[must_use]
    pub fn new(payload: NotePayload, media: Option<MediaAttachment>) -> Self {
        Self {
            local_id: LocalId::new(),
            payload,
            media,
            sync: SyncMeta::local_write(),
        }
    }

    pub const fn has_media(&self) -> bool {
        self.media.is_some()
    }

    #[must_use]
    pub fn label(&self) -> String {
        if self.payload.title.trim().is_empty() {
            format!("({} note)", self.payload.note_type)
        } else {
            self.payload.title.clone()
        }
    }
}

impl Versioned for ProjectNote {
    fn last_modified(&self) -> Option<&str> {
        self.sync.last_modified.as_deref()
    }
}
