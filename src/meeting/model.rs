use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Recording,
    Processing,
    Completed,
}

/// Enrollment details of the student in a meeting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A mentoring meeting in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meeting {
    pub id: SessionId,
    pub mentor_id: String,
    pub mentor_name: String,
    pub student_name: String,
    pub student: StudentDetails,
    pub start_time: DateTime<Utc>,
    pub status: MeetingStatus,
}

/// A completed meeting as kept by the persistence layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: String,
    pub mentor_id: String,
    pub mentor_name: String,
    pub student_name: String,
    /// Absent in records written before student details were kept
    #[serde(default)]
    pub student: StudentDetails,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_secs: u64,
    pub transcript: String,
    pub summary: String,
}

/// Meeting information sent along with an uploaded clip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingMetadata {
    pub meeting_id: String,
    pub mentor_id: String,
    pub mentor_name: String,
    pub student_name: String,
    #[serde(default)]
    pub student: StudentDetails,
    pub duration_secs: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Result of transcribing and summarizing a clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub transcript: String,
    pub summary: String,
    pub keywords: Vec<String>,
    pub duration_secs: u64,
}

/// Selects stored records; empty fields match everything
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordFilter {
    pub mentor_id: Option<String>,
    /// Case-insensitive
    pub student_name: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &MeetingRecord) -> bool {
        let mentor = self
            .mentor_id
            .as_deref()
            .map_or(true, |id| record.mentor_id == id);
        let student = self
            .student_name
            .as_deref()
            .map_or(true, |name| record.student_name.eq_ignore_ascii_case(name));
        mentor && student
    }
}
