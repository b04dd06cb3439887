use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StudentId(pub i64);

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassroomId(pub i64);

impl fmt::Display for ClassroomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    #[default]
    Absent,
}

impl AttendanceStatus {
    pub fn toggled(self) -> Self {
        match self {
            AttendanceStatus::Present => AttendanceStatus::Absent,
            AttendanceStatus::Absent => AttendanceStatus::Present,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: StudentId,
    pub name: String,
    pub roll_number: Option<String>,
    pub status: AttendanceStatus,
    pub confidence: Option<f64>,
    pub distance: Option<f64>,
}

impl RosterEntry {
    pub fn absent(student_id: StudentId, name: impl Into<String>, roll_number: Option<String>) -> Self {
        Self {
            student_id,
            name: name.into(),
            roll_number,
            status: AttendanceStatus::Absent,
            confidence: None,
            distance: None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.status == AttendanceStatus::Present
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classroom {
    pub id: ClassroomId,
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Enrolled student as listed by the backend for a classroom.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    #[serde(default)]
    pub roll_no: Option<String>,
}

/// Previously saved attendance row for a classroom and date.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: StudentId,
    pub student_name: String,
    #[serde(default)]
    pub roll_no: Option<String>,
    pub status: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SaveRecord {
    pub student_id: StudentId,
    pub status: AttendanceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkAttendanceRequest {
    pub classroom_id: ClassroomId,
    pub date: String,
    pub attendance: Vec<SaveRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MarkAttendanceResponse {
    #[serde(default)]
    pub marked: u32,
    #[serde(default)]
    pub updated: u32,
}

/// Parses a `YYYY-MM-DD` attendance date.
pub fn parse_attendance_date(raw: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parse_and_toggle() {
        assert_eq!(AttendanceStatus::parse(" Present "), Some(AttendanceStatus::Present));
        assert_eq!(AttendanceStatus::parse("late"), None);
        assert_eq!(AttendanceStatus::Absent.toggled(), AttendanceStatus::Present);
        assert_eq!(
            serde_json::to_value(AttendanceStatus::Present).expect("serialize"),
            serde_json::json!("present")
        );
    }

    #[test]
    fn attendance_date_requires_iso_day() {
        assert!(parse_attendance_date("2025-10-12").is_some());
        assert!(parse_attendance_date("12/10/2025").is_none());
        assert!(parse_attendance_date("2025-02-30").is_none());
    }
}
