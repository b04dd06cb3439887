//! Error taxonomy for the attendance orchestrator.
//!
//! Every variant is recovered at the request that triggered it; the sidecar
//! turns it into an IPC error object via [`AttendError::code`] and the
//! `Display` message.

use thiserror::Error;

/// Static guidance shown alongside the backend's rate-limit message.
pub const RATE_LIMIT_GUIDANCE: &str = "Face recognition is limited per teacher per hour to keep the \
server responsive for everyone. Typical usage is 10-15 recognitions a day. \
Please wait and try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFault {
    NotFound,
    Busy,
    Other,
}

#[derive(Debug, Error)]
pub enum AttendError {
    #[error("{0}")]
    Validation(String),

    #[error("camera permission was blocked")]
    Permission,

    #[error("{}", device_message(.fault, .detail))]
    Device { fault: DeviceFault, detail: String },

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("{message}")]
    RateLimitExceeded { message: String },

    #[error("{message}")]
    RecognitionFailed { message: String },

    #[error("{message}")]
    PersistenceFailed { message: String },

    #[error("{0} already in progress")]
    Busy(&'static str),

    #[error("session expired, sign in again")]
    Unauthorized,

    #[error("{0}")]
    Backend(String),

    #[error("workspace store error: {0}")]
    Store(String),
}

fn device_message(fault: &DeviceFault, detail: &str) -> String {
    match fault {
        DeviceFault::NotFound => "no camera detected on this device".to_string(),
        DeviceFault::Busy => "camera is busy or unavailable".to_string(),
        DeviceFault::Other => format!("unexpected camera error: {}", detail),
    }
}

impl AttendError {
    pub fn validation(message: impl Into<String>) -> Self {
        AttendError::Validation(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            AttendError::Validation(_) => "validation",
            AttendError::Permission => "camera_permission",
            AttendError::Device {
                fault: DeviceFault::NotFound,
                ..
            } => "camera_not_found",
            AttendError::Device {
                fault: DeviceFault::Busy,
                ..
            } => "camera_busy",
            AttendError::Device {
                fault: DeviceFault::Other,
                ..
            } => "camera_error",
            AttendError::Capture(_) => "capture_failed",
            AttendError::RateLimitExceeded { .. } => "rate_limited",
            AttendError::RecognitionFailed { .. } => "recognition_failed",
            AttendError::PersistenceFailed { .. } => "persistence_failed",
            AttendError::Busy(_) => "busy",
            AttendError::Unauthorized => "unauthorized",
            AttendError::Backend(_) => "backend_error",
            AttendError::Store(_) => "db_error",
        }
    }

    /// Operator-facing troubleshooting text, distinct per camera failure class.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            AttendError::Permission => Some(
                "Allow this app to use the camera in the system privacy settings, \
                 make sure the camera spool directory is readable by this app, \
                 then try again.",
            ),
            AttendError::Device {
                fault: DeviceFault::NotFound,
                ..
            } => Some(
                "Check that a camera is connected, its drivers are installed, \
                 and it is not claimed by another application.",
            ),
            AttendError::Device {
                fault: DeviceFault::Busy,
                ..
            } => Some(
                "Close other applications using the camera, restart the app, \
                 and confirm the camera works elsewhere.",
            ),
            AttendError::Device {
                fault: DeviceFault::Other,
                ..
            } => Some("Retry opening the camera, or upload a photo instead."),
            AttendError::RateLimitExceeded { .. } => Some(RATE_LIMIT_GUIDANCE),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, AttendError>;
