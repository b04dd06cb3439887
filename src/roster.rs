//! The attendance roster and the only operations allowed to mutate it.

use crate::model::{
    AttendanceRecord, AttendanceStatus, ClassroomId, RosterEntry, SaveRecord, Student, StudentId,
};
use crate::recognition::HighConfidenceMatch;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReviewDecision {
    Approve { confidence: f64, distance: Option<f64> },
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterCounts {
    pub present: usize,
    pub absent: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Roster {
    classroom_id: Option<ClassroomId>,
    date: String,
    entries: Vec<RosterEntry>,
}

impl Roster {
    pub fn new(classroom_id: ClassroomId, date: impl Into<String>, entries: Vec<RosterEntry>) -> Self {
        Self {
            classroom_id: Some(classroom_id),
            date: date.into(),
            entries,
        }
    }

    /// Fresh roster for an unsaved date: every enrolled student absent.
    pub fn from_students(classroom_id: ClassroomId, date: impl Into<String>, students: Vec<Student>) -> Self {
        let entries = students
            .into_iter()
            .map(|s| RosterEntry::absent(s.id, s.name, s.roll_no))
            .collect();
        Self::new(classroom_id, date, entries)
    }

    /// Roster rebuilt from previously saved records.
    pub fn from_records(
        classroom_id: ClassroomId,
        date: impl Into<String>,
        records: Vec<AttendanceRecord>,
    ) -> Self {
        let entries = records
            .into_iter()
            .map(|r| {
                let status = AttendanceStatus::parse(&r.status).unwrap_or_else(|| {
                    warn!(student_id = %r.student_id, status = %r.status, "unknown saved status, treating as absent");
                    AttendanceStatus::Absent
                });
                RosterEntry {
                    student_id: r.student_id,
                    name: r.student_name,
                    roll_number: r.roll_no,
                    status,
                    confidence: r.confidence,
                    distance: r.distance,
                }
            })
            .collect();
        Self::new(classroom_id, date, entries)
    }

    pub fn classroom_id(&self) -> Option<ClassroomId> {
        self.classroom_id
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, student_id: StudentId) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| e.student_id == student_id)
    }

    fn get_mut(&mut self, student_id: StudentId) -> Option<&mut RosterEntry> {
        self.entries.iter_mut().find(|e| e.student_id == student_id)
    }

    pub fn counts(&self) -> RosterCounts {
        let present = self.entries.iter().filter(|e| e.is_present()).count();
        RosterCounts {
            present,
            absent: self.entries.len() - present,
            total: self.entries.len(),
        }
    }

    /// Tier-1 merge. Entries without a match keep their status.
    pub fn apply_high_confidence(&mut self, matches: &[HighConfidenceMatch]) -> usize {
        let mut applied = 0;
        for m in matches {
            match self.get_mut(m.student_id) {
                Some(entry) => {
                    entry.status = AttendanceStatus::Present;
                    entry.confidence = Some(m.confidence);
                    entry.distance = m.distance;
                    applied += 1;
                }
                None => {
                    warn!(student_id = %m.student_id, "high-confidence match for student not on roster");
                }
            }
        }
        debug!(applied, "applied high-confidence matches");
        applied
    }

    /// Reject never changes status; it only dismisses the review item.
    pub fn apply_review_decision(&mut self, student_id: StudentId, decision: ReviewDecision) -> bool {
        let ReviewDecision::Approve {
            confidence,
            distance,
        } = decision
        else {
            return false;
        };
        let Some(entry) = self.get_mut(student_id) else {
            warn!(student_id = %student_id, "approved match for student not on roster");
            return false;
        };
        entry.status = AttendanceStatus::Present;
        entry.confidence = Some(confidence);
        entry.distance = distance;
        true
    }

    pub fn toggle_manual(&mut self, student_id: StudentId) -> Option<AttendanceStatus> {
        let entry = self.get_mut(student_id)?;
        entry.status = entry.status.toggled();
        entry.confidence = None;
        entry.distance = None;
        Some(entry.status)
    }

    pub fn mark_all(&mut self, status: AttendanceStatus) {
        for entry in &mut self.entries {
            entry.status = status;
            entry.confidence = None;
            entry.distance = None;
        }
    }

    pub fn to_save_records(&self) -> Vec<SaveRecord> {
        self.entries
            .iter()
            .map(|e| SaveRecord {
                student_id: e.student_id,
                status: e.status,
            })
            .collect()
    }
}
