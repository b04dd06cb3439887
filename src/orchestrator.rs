//! Ties the capture, recognition, review and persistence steps together
//! around one roster.
//!
//! The orchestrator owns every piece of mutable workflow state. Nothing here
//! spawns threads; each public method runs one user action to completion.

use crate::backend::{Backend, BackendError};
use crate::capture::{CameraDevice, CapturePhase, CaptureController, CapturedImage};
use crate::error::{AttendError, Result};
use crate::model::{parse_attendance_date, AttendanceStatus, Classroom, ClassroomId, StudentId};
use crate::persistence::{Confirm, PersistenceGateway, SaveOutcome};
use crate::recognition::{
    QuotaLevel, QuotaMarks, RateLimitSnapshot, RecognitionSummary, ReviewTier, UncertainMatch,
    UnknownFace,
};
use crate::recognizer::RecognitionClient;
use crate::review::{likely_tier2, KeyOutcome, Resolution, ReviewKeys, ReviewSession};
use crate::roster::Roster;
use crate::session::{start_session, Clock, SessionContext, SessionStorage};
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowSettings {
    pub review_keys: ReviewKeys,
    pub quota: QuotaMarks,
}

/// What one recognition pass did to the roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecognitionReport {
    pub applied_high_confidence: usize,
    pub queued_for_review: usize,
    pub unknown_faces: Vec<UnknownFace>,
    pub summary: RecognitionSummary,
    pub rate_limit: Option<RateLimitSnapshot>,
    pub quota_level: Option<QuotaLevel>,
}

/// Where the roster came from on the last load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RosterSource {
    SavedRecords,
    Enrollment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusyFlags {
    pub camera: bool,
    pub recognizing: bool,
    pub saving: bool,
}

pub struct AttendanceOrchestrator {
    backend: Box<dyn Backend>,
    capture: CaptureController,
    recognizer: RecognitionClient,
    review: ReviewSession,
    persistence: PersistenceGateway,
    roster: Roster,
    session: Option<SessionContext>,
    classroom_id: Option<ClassroomId>,
    date: String,
    unknown_faces: Vec<UnknownFace>,
    last_summary: Option<RecognitionSummary>,
}

impl AttendanceOrchestrator {
    pub fn new(
        backend: Box<dyn Backend>,
        camera: Box<dyn CameraDevice>,
        settings: WorkflowSettings,
        today: &str,
    ) -> Self {
        Self {
            backend,
            capture: CaptureController::new(camera),
            recognizer: RecognitionClient::new(settings.quota),
            review: ReviewSession::new(settings.review_keys),
            persistence: PersistenceGateway::default(),
            roster: Roster::default(),
            session: None,
            classroom_id: None,
            date: today.to_string(),
            unknown_faces: Vec::new(),
            last_summary: None,
        }
    }

    pub fn backend_url(&self) -> &str {
        self.backend.base_url()
    }

    // ---- session ----

    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    /// Picks up a session persisted by an earlier run.
    pub fn restore_session(&mut self, storage: &dyn SessionStorage) -> anyhow::Result<bool> {
        let Some(session) = storage.load()? else {
            return Ok(false);
        };
        info!(user = %session.user.email, "restored session");
        self.backend.set_token(Some(session.token.clone()));
        self.session = Some(session);
        Ok(true)
    }

    pub fn login(
        &mut self,
        email: &str,
        password: &str,
        storage: &dyn SessionStorage,
        clock: &dyn Clock,
    ) -> Result<&SessionContext> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AttendError::validation("Email and password are required"));
        }
        let resp = self
            .backend
            .login(email.trim(), password)
            .map_err(|e| match e {
                BackendError::Unauthorized => AttendError::validation("Invalid email or password"),
                other => load_error(other, "Login failed"),
            })?;
        let session = start_session(resp.access_token, resp.user, clock);
        if !session.is_teacher() {
            warn!(role = %session.role, "signed in with a non-teacher role");
        }
        storage
            .store(&session)
            .map_err(|e| AttendError::Store(e.to_string()))?;
        self.backend.set_token(Some(session.token.clone()));
        info!(user = %session.user.email, "signed in");
        let session = self.session.insert(session);
        Ok(&*session)
    }

    /// Signs out and drops all workflow state tied to the previous user.
    pub fn logout(&mut self, storage: &dyn SessionStorage) -> Result<()> {
        self.clear_session(storage)?;
        self.reset_workflow();
        self.roster = Roster::default();
        self.classroom_id = None;
        info!("signed out");
        Ok(())
    }

    /// Clears a session the backend no longer accepts.
    pub fn expire_session(&mut self, storage: &dyn SessionStorage) -> Result<()> {
        if self.session.is_some() {
            warn!("backend rejected the session token, signing out");
        }
        self.clear_session(storage)
    }

    fn clear_session(&mut self, storage: &dyn SessionStorage) -> Result<()> {
        self.session = None;
        self.backend.set_token(None);
        storage
            .clear()
            .map_err(|e| AttendError::Store(e.to_string()))
    }

    // ---- roster ----

    pub fn list_classrooms(&self) -> Result<Vec<Classroom>> {
        self.backend
            .list_classrooms()
            .map_err(|e| load_error(e, "Failed to load classrooms"))
    }

    pub fn classroom_id(&self) -> Option<ClassroomId> {
        self.classroom_id
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Selects a classroom and date and rebuilds the roster: saved records
    /// for that date if any, otherwise every enrolled student absent. Any
    /// pending review and captured still are discarded.
    pub fn load_roster(&mut self, classroom_id: ClassroomId, date: &str) -> Result<RosterSource> {
        if parse_attendance_date(date).is_none() {
            return Err(AttendError::validation(format!(
                "invalid date {:?}, expected YYYY-MM-DD",
                date
            )));
        }
        self.classroom_id = Some(classroom_id);
        self.date = date.trim().to_string();
        self.reset_workflow();
        self.fetch_roster()
    }

    fn fetch_roster(&mut self) -> Result<RosterSource> {
        let Some(classroom_id) = self.classroom_id else {
            return Err(AttendError::validation("Please select a classroom first"));
        };
        let date = self.date.clone();
        info!(classroom_id = %classroom_id, date = %date, "loading attendance");

        match self.backend.attendance_for_date(classroom_id, &date) {
            Ok(records) if !records.is_empty() => {
                info!(records = records.len(), "found saved attendance");
                self.roster = Roster::from_records(classroom_id, date, records);
                return Ok(RosterSource::SavedRecords);
            }
            Ok(_) => info!("no saved attendance, loading enrolled students"),
            Err(BackendError::Unauthorized) => return Err(AttendError::Unauthorized),
            Err(e) => warn!(error = %e, "failed to load attendance, falling back to enrolled students"),
        }

        match self.backend.list_students(classroom_id) {
            Ok(students) => {
                self.roster = Roster::from_students(classroom_id, date, students);
                Ok(RosterSource::Enrollment)
            }
            Err(e) => {
                self.roster = Roster::new(classroom_id, date, Vec::new());
                Err(load_error(e, "Failed to load students"))
            }
        }
    }

    pub fn toggle(&mut self, student_id: StudentId) -> Result<AttendanceStatus> {
        self.roster
            .toggle_manual(student_id)
            .ok_or_else(|| AttendError::validation(format!("student {} is not on the roster", student_id)))
    }

    pub fn mark_all(&mut self, status: AttendanceStatus) {
        self.roster.mark_all(status);
    }

    // ---- capture ----

    pub fn capture_phase(&self) -> CapturePhase {
        self.capture.phase()
    }

    pub fn captured(&self) -> Option<&CapturedImage> {
        self.capture.captured()
    }

    pub fn start_camera(&mut self) -> Result<()> {
        self.capture.start_camera()
    }

    pub fn stop_camera(&mut self) -> bool {
        self.capture.stop_camera()
    }

    pub fn capture_photo(&mut self) -> Result<&CapturedImage> {
        self.capture.capture_photo()
    }

    pub fn upload_bytes(&mut self, file_name: &str, bytes: Vec<u8>) -> Result<&CapturedImage> {
        self.capture.upload_bytes(file_name, bytes)
    }

    pub fn upload_file(&mut self, path: &Path) -> Result<&CapturedImage> {
        self.capture.upload_file(path)
    }

    pub fn retake(&mut self) {
        self.capture.retake();
    }

    // ---- recognition ----

    pub fn rate_limit(&self) -> Option<RateLimitSnapshot> {
        self.recognizer.rate_limit()
    }

    pub fn quota_level(&self) -> Option<QuotaLevel> {
        self.recognizer.quota_level()
    }

    pub fn unknown_faces(&self) -> &[UnknownFace] {
        &self.unknown_faces
    }

    pub fn last_summary(&self) -> Option<RecognitionSummary> {
        self.last_summary
    }

    /// Recognizes the current still, merges tier-1 matches into the roster
    /// and opens a review session for tier 2/3.
    pub fn run_recognition(&mut self) -> Result<RecognitionReport> {
        let result = self.recognizer.recognize(
            self.backend.as_ref(),
            self.capture.captured(),
            self.classroom_id,
            &self.date,
        )?;

        let applied_high_confidence = self.roster.apply_high_confidence(&result.high_confidence);
        let queued_for_review = result.uncertain.len();
        self.review.begin(result.uncertain);
        self.unknown_faces = result.unknown_faces.clone();
        self.last_summary = Some(result.summary);

        Ok(RecognitionReport {
            applied_high_confidence,
            queued_for_review,
            unknown_faces: result.unknown_faces,
            summary: result.summary,
            rate_limit: result.rate_limit,
            quota_level: self.recognizer.quota_level(),
        })
    }

    // ---- review ----

    pub fn review(&self) -> &ReviewSession {
        &self.review
    }

    pub fn review_current(&self) -> Option<&UncertainMatch> {
        self.review.current()
    }

    pub fn approve(&mut self, student_id: StudentId) -> Option<Resolution> {
        let resolution = self.review.approve(student_id)?;
        self.record(&resolution);
        Some(resolution)
    }

    pub fn reject(&mut self, student_id: StudentId) -> Option<Resolution> {
        let resolution = self.review.reject(student_id)?;
        self.record(&resolution);
        Some(resolution)
    }

    /// Approves every tier-2 match above the bulk-approve threshold.
    pub fn bulk_approve_likely(&mut self) -> Vec<Resolution> {
        let resolutions = self.review.bulk_approve(likely_tier2);
        resolutions.iter().for_each(|r| self.record(r));
        info!(approved = resolutions.len(), "bulk approve");
        resolutions
    }

    pub fn bulk_reject(&mut self, tier: ReviewTier) -> Vec<Resolution> {
        let resolutions = self.review.bulk_reject(tier);
        resolutions.iter().for_each(|r| self.record(r));
        info!(rejected = resolutions.len(), tier = tier.number(), "bulk reject");
        resolutions
    }

    pub fn review_key(&mut self, key: &str) -> KeyOutcome {
        let outcome = self.review.handle_key(key);
        if let KeyOutcome::Resolved(resolution) = &outcome {
            self.record(resolution);
        }
        outcome
    }

    pub fn dismiss_review(&mut self) -> usize {
        let left = self.review.dismiss();
        if left > 0 {
            info!(unresolved = left, "review closed with unresolved matches");
        }
        left
    }

    fn record(&mut self, resolution: &Resolution) {
        if !self.roster.apply_review_decision(resolution.student_id(), resolution.decision) {
            warn!(student_id = %resolution.student_id(), "reviewed student is not on the roster");
        }
    }

    // ---- persistence ----

    /// Saves the roster. After a successful save the still is discarded and
    /// the roster reloaded from the backend; a failed reload is logged and
    /// does not turn the save into a failure.
    pub fn save(&mut self, confirm: &mut dyn Confirm) -> Result<SaveOutcome> {
        let outcome = self.persistence.save(
            self.backend.as_ref(),
            self.classroom_id,
            &self.date,
            &self.roster,
            confirm,
        )?;
        if let SaveOutcome::Saved { .. } = outcome {
            self.capture.retake();
            if let Err(e) = self.fetch_roster() {
                warn!(error = %e, "roster reload after save failed");
            }
        }
        Ok(outcome)
    }

    /// Snapshot of in-flight work. Requests are served one at a time and the
    /// recognizing/saving guards drop before a call returns, so those two
    /// read `false` in every response; they only matter to code that runs
    /// while a request is still inside recognition or save.
    pub fn busy(&self) -> BusyFlags {
        BusyFlags {
            camera: self.capture.phase() == CapturePhase::CameraActive,
            recognizing: self.recognizer.is_recognizing(),
            saving: self.persistence.is_saving(),
        }
    }

    fn reset_workflow(&mut self) {
        self.review.dismiss();
        self.capture.stop_camera();
        self.capture.retake();
        self.unknown_faces.clear();
        self.last_summary = None;
    }
}

/// Maps a backend failure outside recognition and save.
fn load_error(e: BackendError, fallback: &str) -> AttendError {
    match e {
        BackendError::Unauthorized => AttendError::Unauthorized,
        BackendError::Network(m) => AttendError::Backend(m),
        other => AttendError::Backend(
            other
                .backend_message()
                .map(|s| s.to_string())
                .unwrap_or_else(|| fallback.to_string()),
        ),
    }
}
