//! Remote system-of-record boundary.
//!
//! The engine talks to the server only through [`RemoteApi`]; every call
//! carries the caller-supplied access token and returns either a typed
//! payload or a [`RemoteError`].

mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{
    NotePayload, Project, RemoteTimeEntry, ServerId, TimeEntryFilter, TimeEntryPayload, WorkType,
};

pub use http::HttpRemoteApi;
pub(crate) use http::normalize_base_url;

/// Failure of a single remote call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Connection, DNS, TLS or timeout failure
    #[error("transport error: {0}")]
    Transport(String),
    /// Non-success HTTP status
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },
    /// The server answered but refused the request
    #[error("rejected by server: {0}")]
    Rejected(String),
    /// Response body could not be interpreted
    #[error("invalid response: {0}")]
    InvalidPayload(String),
    #[error("credential rejected by server")]
    Unauthorized,
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Acknowledgement of a create/update; a record is never marked synced without one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    pub server_id: ServerId,
}

/// File content sent alongside a note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Acknowledgement of a stored file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAccepted {
    pub url: Option<String>,
}

/// Typed request/response operations over the remote record kinds
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn list_projects(&self, token: &str) -> RemoteResult<Vec<Project>>;

    async fn list_work_types(&self, token: &str) -> RemoteResult<Vec<WorkType>>;

    async fn list_time_entries(
        &self,
        token: &str,
        filter: &TimeEntryFilter,
    ) -> RemoteResult<Vec<RemoteTimeEntry>>;

    async fn create_time_entry(
        &self,
        token: &str,
        payload: &TimeEntryPayload,
    ) -> RemoteResult<Accepted>;

    async fn update_time_entry(
        &self,
        token: &str,
        server_id: ServerId,
        payload: &TimeEntryPayload,
    ) -> RemoteResult<Accepted>;

    async fn create_note(&self, token: &str, payload: &NotePayload) -> RemoteResult<Accepted>;

    async fn update_note(
        &self,
        token: &str,
        server_id: ServerId,
        payload: &NotePayload,
    ) -> RemoteResult<Accepted>;

    /// Attach a file to an already-accepted note
    async fn upload_note_media(
        &self,
        token: &str,
        note_id: ServerId,
        media: MediaUpload,
    ) -> RemoteResult<MediaAccepted>;
}

/// Source of the access token; the engine never issues or refreshes credentials
pub trait CredentialProvider: Send + Sync {
    fn access_token(&self) -> Option<String>;
}

/// Fixed token, e.g. from the environment
#[derive(Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: crate::util::normalize_text_option(token),
        }
    }
}

impl std::fmt::Debug for StaticCredentials {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("StaticCredentials")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl CredentialProvider for StaticCredentials {
    fn access_token(&self) -> Option<String> {
        self.token.clone()
    }
}
