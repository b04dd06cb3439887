//! REST gateway to the attendance backend.

use crate::capture::CapturedImage;
use crate::model::{
    AttendanceRecord, Classroom, ClassroomId, MarkAttendanceRequest, MarkAttendanceResponse, Student,
};
use crate::recognition::MarkFaceResponse;
use crate::session::UserProfile;
use reqwest::blocking::{multipart, Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("attendd/", env!("CARGO_PKG_VERSION"));

/// Error-body keys for recognition and read endpoints, which report `error`.
pub const ERROR_FIRST: &[&str] = &["error", "message"];
/// The save endpoint reports `message`; `error` is a fallback.
pub const MESSAGE_FIRST: &[&str] = &["message", "error"];

#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP 429. Carries the backend's `error` text when present.
    #[error("rate limited: {}", detail(.message))]
    RateLimited { message: Option<String> },

    #[error("unauthorized")]
    Unauthorized,

    #[error("API error {status}: {}", detail(.message))]
    Api { status: u16, message: Option<String> },

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

fn detail(message: &Option<String>) -> &str {
    message.as_deref().unwrap_or("no detail")
}

impl BackendError {
    /// Backend-provided text, if the failure carried any.
    pub fn backend_message(&self) -> Option<&str> {
        match self {
            BackendError::RateLimited { message } | BackendError::Api { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserProfile,
}

pub trait Backend {
    fn set_token(&mut self, token: Option<String>);

    fn login(&self, email: &str, password: &str) -> Result<LoginResponse, BackendError>;

    fn list_classrooms(&self) -> Result<Vec<Classroom>, BackendError>;

    fn list_students(&self, classroom_id: ClassroomId) -> Result<Vec<Student>, BackendError>;

    fn attendance_for_date(
        &self,
        classroom_id: ClassroomId,
        date: &str,
    ) -> Result<Vec<AttendanceRecord>, BackendError>;

    fn mark_face(
        &self,
        image: &CapturedImage,
        classroom_id: ClassroomId,
        date: &str,
    ) -> Result<MarkFaceResponse, BackendError>;

    fn mark_attendance(&self, req: &MarkAttendanceRequest) -> Result<MarkAttendanceResponse, BackendError>;

    fn base_url(&self) -> &str;
}

pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, BackendError> {
        self.send_reading(req, ERROR_FIRST)
    }

    fn send_reading<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        error_keys: &[&str],
    ) -> Result<T, BackendError> {
        let resp = self
            .authed(req)
            .send()
            .map_err(|e| BackendError::Network(e.to_string()))?;
        decode(resp, error_keys)
    }
}

fn decode<T: DeserializeOwned>(resp: Response, error_keys: &[&str]) -> Result<T, BackendError> {
    let status = resp.status();
    if status.is_success() {
        return resp.json().map_err(|e| BackendError::Decode(e.to_string()));
    }
    let body = resp.text().unwrap_or_default();
    let message = error_text(&body, error_keys);
    debug!(status = status.as_u16(), body = %body, "backend returned error");
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => BackendError::RateLimited { message },
        StatusCode::UNAUTHORIZED => BackendError::Unauthorized,
        _ => BackendError::Api {
            status: status.as_u16(),
            message,
        },
    })
}

/// Pulls the first string field named in `keys` out of a JSON error body.
pub fn error_text(body: &str, keys: &[&str]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    keys.iter()
        .find_map(|k| value.get(*k).and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

impl Backend for HttpBackend {
    fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    fn login(&self, email: &str, password: &str) -> Result<LoginResponse, BackendError> {
        let body = serde_json::json!({ "email": email, "password": password });
        self.send(self.client.post(self.url("/auth/login")).json(&body))
    }

    fn list_classrooms(&self) -> Result<Vec<Classroom>, BackendError> {
        self.send(self.client.get(self.url("/classrooms")))
    }

    fn list_students(&self, classroom_id: ClassroomId) -> Result<Vec<Student>, BackendError> {
        self.send(
            self.client
                .get(self.url(&format!("/students/classroom/{}", classroom_id))),
        )
    }

    fn attendance_for_date(
        &self,
        classroom_id: ClassroomId,
        date: &str,
    ) -> Result<Vec<AttendanceRecord>, BackendError> {
        self.send(
            self.client
                .get(self.url(&format!("/attendance/{}", classroom_id)))
                .query(&[("date", date)]),
        )
    }

    fn mark_face(
        &self,
        image: &CapturedImage,
        classroom_id: ClassroomId,
        date: &str,
    ) -> Result<MarkFaceResponse, BackendError> {
        let part = multipart::Part::bytes(image.bytes.clone())
            .file_name(image.file_name.clone())
            .mime_str(&image.mime)
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        let form = multipart::Form::new()
            .part("image", part)
            .text("classroom_id", classroom_id.to_string())
            .text("date", date.to_string());
        info!(classroom_id = %classroom_id, date, bytes = image.bytes.len(), "submitting photo for recognition");
        self.send(
            self.client
                .post(self.url("/attendance/mark_face"))
                .multipart(form),
        )
    }

    fn mark_attendance(&self, req: &MarkAttendanceRequest) -> Result<MarkAttendanceResponse, BackendError> {
        self.send_reading(
            self.client.post(self.url("/attendance/mark")).json(req),
            MESSAGE_FIRST,
        )
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
