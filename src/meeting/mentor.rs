use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use super::model::MeetingRecord;

const DEPARTMENTS: [&str; 8] = [
    "Computer Science",
    "Engineering",
    "Business",
    "Medicine",
    "Law",
    "Arts",
    "Science",
    "Education",
];

const MENTOR_NAMES: [&str; 31] = [
    "Vishal Bhakare",
    "Sahil Gawathe",
    "Chirag Patil",
    "Bhuvan Prakash P",
    "Balaji Sapkal",
    "Surriyaa P P",
    "Thanigaivel R",
    "Pavan Medam",
    "Nivrutti Wagh",
    "Sriram J",
    "Yogeesh DR",
    "Lynda Princy Rita M",
    "Lakshmi",
    "Sravanthi Kallavai",
    "Vinay G",
    "Hemasri",
    "Thamarai Kannan G",
    "Koteswara Reddy M",
    "Pooja S S",
    "Kalki D",
    "Karthik Reddy Indukuri",
    "Bhumesh Ranjane",
    "Vanmathi",
    "Sharmila",
    "Chandana",
    "Purushotham",
    "Niranjan",
    "Deepika Ramireddy",
    "Vimal Raj",
    "Stalin Gunasekaran",
    "Kuralarasan",
];

/// Students assigned to each built-in mentor
const STUDENTS_PER_MENTOR: u32 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mentor {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub department: String,
    pub student_count: u32,
    pub batch_id: String,
}

/// A mentor with meeting history taken from stored records
#[derive(Debug, Clone, Serialize)]
pub struct MentorSummary {
    #[serde(flatten)]
    pub mentor: Mentor,
    pub total_meetings: usize,
    pub last_meeting: Option<DateTime<Utc>>,
}

/// Read-only list of mentors
pub struct MentorDirectory {
    mentors: Vec<Mentor>,
}

impl MentorDirectory {
    pub fn new(mentors: Vec<Mentor>) -> Self {
        Self { mentors }
    }

    /// The mentoring programme's roster
    ///
    /// Ids run `mentor-1..`, ten mentors per batch.
    pub fn builtin() -> Self {
        let mentors = MENTOR_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| Mentor {
                id: format!("mentor-{}", i + 1),
                name: name.to_string(),
                email: None,
                department: DEPARTMENTS[i % DEPARTMENTS.len()].to_string(),
                student_count: STUDENTS_PER_MENTOR,
                batch_id: format!("BATCH-{:02}", i / 10 + 1),
            })
            .collect();
        Self::new(mentors)
    }

    /// Load a JSON array of mentors
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mentors file: {:?}", path))?;
        let mentors: Vec<Mentor> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid mentors file: {:?}", path))?;
        info!("Loaded {} mentors from {:?}", mentors.len(), path);
        Ok(Self::new(mentors))
    }

    pub fn list(&self) -> &[Mentor] {
        &self.mentors
    }

    pub fn get(&self, id: &str) -> Option<&Mentor> {
        self.mentors.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.mentors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mentors.is_empty()
    }

    /// Every mentor with counts over `records`
    pub fn summaries(&self, records: &[MeetingRecord]) -> Vec<MentorSummary> {
        self.mentors
            .iter()
            .map(|mentor| summarize(mentor, records))
            .collect()
    }

    pub fn summary(&self, id: &str, records: &[MeetingRecord]) -> Option<MentorSummary> {
        self.get(id).map(|mentor| summarize(mentor, records))
    }
}

impl Default for MentorDirectory {
    fn default() -> Self {
        Self::builtin()
    }
}

fn summarize(mentor: &Mentor, records: &[MeetingRecord]) -> MentorSummary {
    let own = records.iter().filter(|r| r.mentor_id == mentor.id);
    let (total_meetings, last_meeting) = own.fold((0, None), |(count, last), r| {
        (count + 1, last.max(Some(r.start_time)))
    });

    MentorSummary {
        mentor: mentor.clone(),
        total_meetings,
        last_meeting,
    }
}
