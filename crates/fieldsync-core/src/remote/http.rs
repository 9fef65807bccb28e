//! HTTP implementation of the remote API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{
    Accepted, MediaAccepted, MediaUpload, RemoteApi, RemoteError, RemoteResult,
};
use crate::models::{
    NotePayload, Project, RemoteTimeEntry, ServerId, TimeEntryFilter, TimeEntryPayload, WorkType,
};
use crate::util::{compact_text, is_http_url, normalize_text_option};

const PROJECTS_PATH: &str = "projects.php";
const WORK_TYPES_PATH: &str = "work-types.php";
const REPORTS_PATH: &str = "reports.php";
const TIME_ENTRY_PATH: &str = "time-entry.php";
const PROJECT_NOTES_PATH: &str = "project-notes.php";
const UPLOAD_MEDIA_PATH: &str = "upload-media.php";

/// `reqwest` client for the time-tracking API
#[derive(Clone)]
pub struct HttpRemoteApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRemoteApi {
    /// Build a client; `timeout` bounds every request so a stalled call
    /// surfaces as a per-record failure.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> RemoteResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        token: &str,
    ) -> RemoteResult<T> {
        let response = request
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(transport_error)?;
        read_json(response).await
    }

    async fn submit_note(
        &self,
        token: &str,
        server_id: Option<ServerId>,
        payload: &NotePayload,
    ) -> RemoteResult<Accepted> {
        let tags = serde_json::to_string(&payload.tags)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        let mut form = Form::new()
            .text(
                "project_id",
                payload.project_id.unwrap_or_default().to_string(),
            )
            .text("note_type", payload.note_type.clone())
            .text(
                "note_group",
                payload
                    .note_group
                    .clone()
                    .unwrap_or_else(|| "project".to_string()),
            )
            .text("title", payload.title.clone())
            .text("content", payload.content.clone())
            .text(
                "transcription",
                payload.transcription.clone().unwrap_or_default(),
            )
            .text("is_important", if payload.is_important { "1" } else { "0" })
            .text("tags", tags);
        if let Some(server_id) = server_id {
            form = form.text("note_id", server_id.to_string());
        }

        let response: NoteResponse = self
            .send_json(
                self.client.post(self.endpoint(PROJECT_NOTES_PATH)).multipart(form),
                token,
            )
            .await?;
        response.into_accepted(server_id)
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn list_projects(&self, token: &str) -> RemoteResult<Vec<Project>> {
        let response: ProjectsResponse = self
            .send_json(self.client.get(self.endpoint(PROJECTS_PATH)), token)
            .await?;
        if !response.success {
            return Err(RemoteError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "project list refused".to_string()),
            ));
        }
        Ok(response.projects)
    }

    async fn list_work_types(&self, token: &str) -> RemoteResult<Vec<WorkType>> {
        self.send_json(self.client.get(self.endpoint(WORK_TYPES_PATH)), token)
            .await
    }

    async fn list_time_entries(
        &self,
        token: &str,
        filter: &TimeEntryFilter,
    ) -> RemoteResult<Vec<RemoteTimeEntry>> {
        let mut query = vec![
            ("date_from", filter.date_from_param()),
            ("date_to", filter.date_to_param()),
        ];
        if let Some(project_id) = filter.project_id {
            query.push(("project_id", project_id.to_string()));
        }

        let entries: Vec<WireTimeEntry> = self
            .send_json(
                self.client.get(self.endpoint(REPORTS_PATH)).query(&query),
                token,
            )
            .await?;
        Ok(entries.into_iter().map(RemoteTimeEntry::from).collect())
    }

    async fn create_time_entry(
        &self,
        token: &str,
        payload: &TimeEntryPayload,
    ) -> RemoteResult<Accepted> {
        let body = TimeEntryRequest { id: None, payload };
        let response: ApiResponse = self
            .send_json(
                self.client.post(self.endpoint(TIME_ENTRY_PATH)).json(&body),
                token,
            )
            .await?;
        response.into_accepted()
    }

    async fn update_time_entry(
        &self,
        token: &str,
        server_id: ServerId,
        payload: &TimeEntryPayload,
    ) -> RemoteResult<Accepted> {
        let body = TimeEntryRequest {
            id: Some(server_id.get()),
            payload,
        };
        let response: ApiResponse = self
            .send_json(
                self.client.post(self.endpoint(TIME_ENTRY_PATH)).json(&body),
                token,
            )
            .await?;
        response.into_accepted()
    }

    async fn create_note(&self, token: &str, payload: &NotePayload) -> RemoteResult<Accepted> {
        self.submit_note(token, None, payload).await
    }

    async fn update_note(
        &self,
        token: &str,
        server_id: ServerId,
        payload: &NotePayload,
    ) -> RemoteResult<Accepted> {
        self.submit_note(token, Some(server_id), payload).await
    }

    async fn upload_note_media(
        &self,
        token: &str,
        note_id: ServerId,
        media: MediaUpload,
    ) -> RemoteResult<MediaAccepted> {
        let part = Part::bytes(media.bytes)
            .file_name(media.file_name)
            .mime_str(&media.mime_type)
            .map_err(|error| RemoteError::InvalidPayload(error.to_string()))?;
        let form = Form::new()
            .text("note_id", note_id.to_string())
            .part("media_file", part);

        let response: NoteResponse = self
            .send_json(
                self.client.post(self.endpoint(UPLOAD_MEDIA_PATH)).multipart(form),
                token,
            )
            .await?;
        if !response.success {
            return Err(RemoteError::Rejected(
                response
                    .message
                    .unwrap_or_else(|| "media upload refused".to_string()),
            ));
        }
        Ok(MediaAccepted {
            url: normalize_text_option(response.file_url),
        })
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Numbers the API sometimes encodes as strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Lenient {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Lenient {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(value) => Some(*value as i64),
            Self::Text(value) => value.trim().parse().ok(),
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(value) => value.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ProjectsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    projects: Vec<Project>,
}

#[derive(Debug, Deserialize)]
struct WireTimeEntry {
    #[serde(default)]
    id: Option<Lenient>,
    project_id: Lenient,
    work_type_id: Lenient,
    report_date: String,
    #[serde(default)]
    datetime_from: Option<String>,
    #[serde(default)]
    datetime_to: Option<String>,
    hours: Lenient,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    date_updated: Option<String>,
}

impl From<WireTimeEntry> for RemoteTimeEntry {
    fn from(value: WireTimeEntry) -> Self {
        Self {
            server_id: value
                .id
                .as_ref()
                .and_then(Lenient::as_i64)
                .and_then(ServerId::new),
            payload: TimeEntryPayload {
                project_id: value.project_id.as_i64().unwrap_or_default(),
                work_type_id: value.work_type_id.as_i64().unwrap_or_default(),
                report_date: value.report_date,
                datetime_from: value.datetime_from,
                datetime_to: value.datetime_to,
                hours: value.hours.as_f64().unwrap_or_default(),
                description: value.description,
            },
            last_modified: normalize_text_option(value.date_updated),
        }
    }
}

#[derive(Debug, Serialize)]
struct TimeEntryRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    #[serde(flatten)]
    payload: &'a TimeEntryPayload,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl ApiResponse {
    fn into_accepted(self) -> RemoteResult<Accepted> {
        if !self.success {
            return Err(RemoteError::Rejected(
                self.message
                    .unwrap_or_else(|| "request refused".to_string()),
            ));
        }

        let server_id = self
            .data
            .as_ref()
            .and_then(|data| data.get("id"))
            .and_then(|id| match id {
                serde_json::Value::Number(number) => number.as_i64(),
                serde_json::Value::String(text) => text.trim().parse().ok(),
                _ => None,
            })
            .and_then(ServerId::new)
            .ok_or_else(|| {
                RemoteError::InvalidPayload("response did not include a server id".to_string())
            })?;
        Ok(Accepted { server_id })
    }
}

#[derive(Debug, Deserialize)]
struct NoteResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "noteId")]
    note_id: Option<Lenient>,
    #[serde(default, alias = "fileUrl")]
    file_url: Option<String>,
}

impl NoteResponse {
    /// Updates may omit the id; fall back to the one the request targeted
    fn into_accepted(self, requested: Option<ServerId>) -> RemoteResult<Accepted> {
        if !self.success {
            return Err(RemoteError::Rejected(
                self.message.unwrap_or_else(|| "note refused".to_string()),
            ));
        }

        self.note_id
            .as_ref()
            .and_then(Lenient::as_i64)
            .and_then(ServerId::new)
            .or(requested)
            .map(|server_id| Accepted { server_id })
            .ok_or_else(|| {
                RemoteError::InvalidPayload("response did not include a note id".to_string())
            })
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> RemoteResult<T> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(RemoteError::Unauthorized);
    }
    if !status.is_success() {
        return Err(RemoteError::Status {
            code: status.as_u16(),
            message: parse_api_error(&body),
        });
    }

    serde_json::from_str(&body).map_err(|error| {
        RemoteError::InvalidPayload(format!("{error} in '{}'", compact_text(&body)))
    })
}

fn parse_api_error(body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed
    }
}

fn transport_error(error: reqwest::Error) -> RemoteError {
    RemoteError::Transport(error.to_string())
}

pub(crate) fn normalize_base_url(raw: String) -> RemoteResult<String> {
    let base_url = normalize_text_option(Some(raw)).ok_or_else(|| {
        RemoteError::InvalidPayload("server URL must not be empty".to_string())
    })?;
    if !is_http_url(&base_url) {
        return Err(RemoteError::InvalidPayload(format!(
            "server URL must start with http:// or https:// (got '{base_url}')"
        )));
    }
    if base_url.ends_with('/') {
        Ok(base_url)
    } else {
        Ok(format!("{base_url}/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalize_base_url_appends_slash() {
        assert_eq!(
            normalize_base_url(" https://time.example.com/api ".to_string()).unwrap(),
            "https://time.example.com/api/"
        );
        assert_eq!(
            normalize_base_url("http://localhost/api/".to_string()).unwrap(),
            "http://localhost/api/"
        );
        assert!(normalize_base_url("time.example.com".to_string()).is_err());
        assert!(normalize_base_url("  ".to_string()).is_err());
    }

    #[test]
    fn api_response_extracts_server_id() {
        let response: ApiResponse =
            serde_json::from_str(r#"{"success":true,"data":{"id":"512"}}"#).unwrap();
        assert_eq!(
            response.into_accepted().unwrap().server_id,
            ServerId::new(512).unwrap()
        );
    }

    #[test]
    fn api_response_without_id_is_invalid() {
        let response: ApiResponse =
            serde_json::from_str(r#"{"success":true,"data":{"id":0}}"#).unwrap();
        assert!(matches!(
            response.into_accepted(),
            Err(RemoteError::InvalidPayload(_))
        ));
    }

    #[test]
    fn api_response_failure_is_rejected() {
        let response: ApiResponse =
            serde_json::from_str(r#"{"success":false,"message":"Project closed"}"#).unwrap();
        assert_eq!(
            response.into_accepted(),
            Err(RemoteError::Rejected("Project closed".to_string()))
        );
    }

    #[test]
    fn note_response_falls_back_to_requested_id() {
        let response: NoteResponse =
            serde_json::from_str(r#"{"success":true,"message":"updated"}"#).unwrap();
        let accepted = response.into_accepted(ServerId::new(8)).unwrap();
        assert_eq!(accepted.server_id, ServerId::new(8).unwrap());

        let response: NoteResponse =
            serde_json::from_str(r#"{"success":true,"noteId":41,"fileUrl":"u"}"#).unwrap();
        assert_eq!(
            response.into_accepted(None).unwrap().server_id,
            ServerId::new(41).unwrap()
        );
    }

    #[test]
    fn wire_time_entry_accepts_string_numbers() {
        let wire: WireTimeEntry = serde_json::from_str(
            r#"{
                "id": "42",
                "project_id": "3",
                "work_type_id": 2,
                "report_date": "2024-05-01",
                "hours": "7.50",
                "description": null,
                "date_updated": "2024-05-01 17:02:11"
            }"#,
        )
        .unwrap();
        let entry = RemoteTimeEntry::from(wire);
        assert_eq!(entry.server_id, ServerId::new(42));
        assert_eq!(entry.payload.project_id, 3);
        assert!((entry.payload.hours - 7.5).abs() < f64::EPSILON);
        assert_eq!(entry.last_modified.as_deref(), Some("2024-05-01 17:02:11"));
    }

    #[test]
    fn time_entry_request_flattens_payload() {
        let payload = TimeEntryPayload {
            project_id: 1,
            work_type_id: 2,
            report_date: "2024-01-01".to_string(),
            datetime_from: None,
            datetime_to: None,
            hours: 1.5,
            description: None,
        };
        let value = serde_json::to_value(TimeEntryRequest {
            id: Some(9),
            payload: &payload,
        })
        .unwrap();
        assert_eq!(value["id"], 9);
        assert_eq!(value["project_id"], 1);
        assert_eq!(value["hours"], 1.5);
    }

    #[test]
    fn api_error_prefers_message_field() {
        assert_eq!(parse_api_error(r#"{"error":"bad token"}"#), "bad token");
        assert_eq!(parse_api_error("  "), "empty response body");
        assert_eq!(parse_api_error("Gateway Timeout"), "Gateway Timeout");
    }
}
