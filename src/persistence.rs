//! Save gateway for the final roster.

use crate::backend::{Backend, BackendError};
use crate::busy::BusyFlag;
use crate::error::{AttendError, Result};
use crate::model::{ClassroomId, MarkAttendanceRequest};
use crate::roster::Roster;
use serde::Serialize;
use tracing::{info, warn};

const GENERIC_SAVE_FAILURE: &str = "Failed to save attendance";

/// Asked before saving a roster where nobody is present.
pub trait Confirm {
    fn confirm_empty_save(&mut self, total: usize) -> bool;
}

impl<F: FnMut(usize) -> bool> Confirm for F {
    fn confirm_empty_save(&mut self, total: usize) -> bool {
        self(total)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SaveOutcome {
    #[serde(rename_all = "camelCase")]
    Saved {
        marked: u32,
        updated: u32,
        present: usize,
        absent: usize,
    },
    Cancelled,
}

#[derive(Debug, Default)]
pub struct PersistenceGateway {
    saving: BusyFlag,
}

impl PersistenceGateway {
    pub fn is_saving(&self) -> bool {
        self.saving.is_active()
    }

    pub fn save(
        &self,
        backend: &dyn Backend,
        classroom_id: Option<ClassroomId>,
        date: &str,
        roster: &Roster,
        confirm: &mut dyn Confirm,
    ) -> Result<SaveOutcome> {
        if roster.is_empty() {
            return Err(AttendError::validation("No attendance data to save"));
        }
        let Some(classroom_id) = classroom_id else {
            return Err(AttendError::validation("Please select a classroom first"));
        };
        let counts = roster.counts();
        if counts.present == 0 && !confirm.confirm_empty_save(counts.total) {
            info!(classroom_id = %classroom_id, date, "all-absent save declined");
            return Ok(SaveOutcome::Cancelled);
        }

        let Some(_guard) = self.saving.enter() else {
            return Err(AttendError::Busy("save"));
        };
        let req = MarkAttendanceRequest {
            classroom_id,
            date: date.to_string(),
            attendance: roster.to_save_records(),
        };
        info!(
            classroom_id = %classroom_id,
            date,
            present = counts.present,
            total = counts.total,
            "saving attendance"
        );
        match backend.mark_attendance(&req) {
            Ok(resp) => {
                info!(marked = resp.marked, updated = resp.updated, "attendance saved");
                Ok(SaveOutcome::Saved {
                    marked: resp.marked,
                    updated: resp.updated,
                    present: counts.present,
                    absent: counts.absent,
                })
            }
            Err(BackendError::Unauthorized) => Err(AttendError::Unauthorized),
            Err(e) => {
                warn!(error = %e, "attendance save failed");
                let message = match &e {
                    BackendError::Network(m) => m.clone(),
                    other => other
                        .backend_message()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| GENERIC_SAVE_FAILURE.to_string()),
                };
                Err(AttendError::PersistenceFailed { message })
            }
        }
    }
}
