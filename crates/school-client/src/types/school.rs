//! Attendance and meeting types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One attendance record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceItem {
    /// ISO date, if recorded.
    #[serde(default)]
    pub date: Option<String>,

    /// "Present", "Absent", "Late", or anything else the school uses.
    #[serde(default)]
    pub status: String,

    #[serde(default)]
    pub subject: Option<String>,

    #[serde(default)]
    pub instructor: Option<String>,
}

/// Today's records plus totals per status for the parent's student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub student_id: i64,

    #[serde(default)]
    pub today: Vec<AttendanceItem>,

    #[serde(default)]
    pub totals: BTreeMap<String, u64>,
}

impl AttendanceSummary {
    /// Number of records with the given status.
    pub fn total(&self, status: &str) -> u64 {
        self.totals.get(status).copied().unwrap_or(0)
    }
}

/// Recent attendance history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceHistory {
    #[serde(default)]
    pub items: Vec<AttendanceItem>,
}

/// Status of a scheduled meeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    #[default]
    Scheduled,
    Cancelled,
    Completed,
}

/// A parent/teacher meeting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: i64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(alias = "date")]
    pub meeting_date: String,

    /// `HH:MM`.
    #[serde(alias = "start")]
    pub start_time: String,

    /// `HH:MM`.
    #[serde(alias = "end")]
    pub end_time: String,

    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub status: MeetingStatus,

    #[serde(default, alias = "student")]
    pub student_name: Option<String>,

    #[serde(default, alias = "subject")]
    pub subject_name: Option<String>,
}

/// The meetings endpoint has answered with two different shapes over time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MeetingsResponse {
    Meetings { meetings: Vec<Meeting> },
    Items { items: Vec<Meeting> },
}

impl MeetingsResponse {
    pub(crate) fn into_meetings(self) -> Vec<Meeting> {
        match self {
            MeetingsResponse::Meetings { meetings } => meetings,
            MeetingsResponse::Items { items } => items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_summary() {
        let json = r#"{"success": true, "studentId": 44,
            "today": [{"date": "2024-05-01", "status": "Late", "subject": "Math", "instructor": null}],
            "totals": {"Present": 30, "Late": 2}}"#;

        let summary: AttendanceSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.student_id, 44);
        assert_eq!(summary.today[0].status, "Late");
        assert_eq!(summary.total("Present"), 30);
        assert_eq!(summary.total("Absent"), 0);
    }

    #[test]
    fn test_parse_meetings_both_shapes() {
        let legacy = r#"{"meetings": [{"id": 1, "title": "PTA", "meeting_date": "2024-05-02",
            "start_time": "09:00", "end_time": "10:00", "status": "cancelled"}]}"#;
        let items = r#"{"success": true, "items": [{"id": 2, "title": "Review", "date": "2024-05-03",
            "start": "13:00", "end": "13:30", "status": "completed", "student": "Ana", "subject": "Art"}]}"#;

        let a = serde_json::from_str::<MeetingsResponse>(legacy).unwrap().into_meetings();
        assert_eq!(a[0].status, MeetingStatus::Cancelled);
        assert_eq!(a[0].meeting_date, "2024-05-02");

        let b = serde_json::from_str::<MeetingsResponse>(items).unwrap().into_meetings();
        assert_eq!(b[0].start_time, "13:00");
        assert_eq!(b[0].student_name.as_deref(), Some("Ana"));
        assert_eq!(b[0].subject_name.as_deref(), Some("Art"));
    }
}
