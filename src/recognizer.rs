//! One-shot submission of a captured photo to the recognition endpoint.

use crate::backend::{Backend, BackendError};
use crate::busy::BusyFlag;
use crate::capture::CapturedImage;
use crate::error::{AttendError, Result};
use crate::model::ClassroomId;
use crate::recognition::{QuotaLevel, QuotaMarks, RateLimitSnapshot, RecognitionResult};
use tracing::{info, warn};

const DEFAULT_RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded";
const GENERIC_RECOGNITION_FAILURE: &str = "Recognition failed";

#[derive(Debug, Default)]
pub struct RecognitionClient {
    recognizing: BusyFlag,
    marks: QuotaMarks,
    last_rate_limit: Option<RateLimitSnapshot>,
}

impl RecognitionClient {
    pub fn new(marks: QuotaMarks) -> Self {
        Self {
            marks,
            ..Self::default()
        }
    }

    pub fn is_recognizing(&self) -> bool {
        self.recognizing.is_active()
    }

    /// Last quota snapshot, for passive display only.
    pub fn rate_limit(&self) -> Option<RateLimitSnapshot> {
        self.last_rate_limit
    }

    pub fn quota_level(&self) -> Option<QuotaLevel> {
        self.last_rate_limit.map(|r| r.level(&self.marks))
    }

    pub fn recognize(
        &mut self,
        backend: &dyn Backend,
        image: Option<&CapturedImage>,
        classroom_id: Option<ClassroomId>,
        date: &str,
    ) -> Result<RecognitionResult> {
        let Some(image) = image else {
            return Err(AttendError::validation("No image selected"));
        };
        let Some(classroom_id) = classroom_id else {
            return Err(AttendError::validation("Please select a classroom first"));
        };
        let Some(_guard) = self.recognizing.enter() else {
            return Err(AttendError::Busy("recognition"));
        };

        info!(classroom_id = %classroom_id, date, sha256 = %image.sha256, "starting face recognition");
        match backend.mark_face(image, classroom_id, date) {
            Ok(wire) => {
                let result = RecognitionResult::from_wire(wire);
                if let Some(rl) = result.rate_limit {
                    info!(remaining = rl.remaining, limit = rl.limit, "recognition quota");
                    self.last_rate_limit = Some(rl);
                }
                info!(
                    high_confidence = result.high_confidence.len(),
                    uncertain = result.uncertain.len(),
                    unknown = result.unknown_faces.len(),
                    "recognition complete"
                );
                Ok(result)
            }
            Err(BackendError::RateLimited { message }) => {
                warn!("recognition rate limit exceeded");
                Err(AttendError::RateLimitExceeded {
                    message: message.unwrap_or_else(|| DEFAULT_RATE_LIMIT_MESSAGE.to_string()),
                })
            }
            Err(BackendError::Unauthorized) => Err(AttendError::Unauthorized),
            Err(e) => {
                warn!(error = %e, "recognition failed");
                let message = match &e {
                    BackendError::Network(m) => m.clone(),
                    other => other
                        .backend_message()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| GENERIC_RECOGNITION_FAILURE.to_string()),
                };
                Err(AttendError::RecognitionFailed { message })
            }
        }
    }
}
