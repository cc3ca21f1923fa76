use anyhow::Result;
use std::time::Duration;
use tracing::info;

use super::model::{MeetingMetadata, TranscriptResponse};
use crate::session::FinalizedClip;

/// Transcription and summarization of a finished recording
///
/// Retry policy, if any, belongs to the implementation.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        clip: FinalizedClip,
        metadata: &MeetingMetadata,
    ) -> Result<TranscriptResponse>;

    fn name(&self) -> &str;
}

struct CannedSession {
    transcript: &'static str,
    summary: &'static str,
    keywords: &'static [&'static str],
}

const CANNED_SESSIONS: &[CannedSession] = &[
    CannedSession {
        transcript: "{mentor}: Let's look at how the semester is going so far.\n\n\
{student}: The coursework is fine, but I keep running out of time before deadlines.\n\n\
{mentor}: Try planning the week on Sunday evening and block two fixed study slots per day.\n\n\
{student}: Should I drop one of the electives?\n\n\
{mentor}: Not yet. Track your hours for two weeks first, then we decide together.",
        summary: "**Meeting Summary**\n\n\
**Overview:**\nAcademic progress check focused on time management.\n\n\
**Key Points:**\n- Deadlines are being missed because of unplanned weeks\n\
- Weekly planning with fixed study slots was agreed\n\n\
**Action Items:**\n- {student} tracks study hours for two weeks\n\n\
**Next Steps:**\nReview the tracked hours and decide on the elective.",
        keywords: &["time management", "planning", "electives"],
    },
    CannedSession {
        transcript: "{mentor}: You mentioned wanting to talk about internships.\n\n\
{student}: Yes, I'm not sure my projects are strong enough to apply.\n\n\
{mentor}: Pick your two best projects and write a short README for each explaining the problem you solved.\n\n\
{student}: What about the interviews?\n\n\
{mentor}: Practice explaining your own code out loud. Interviewers care about how you reason.",
        summary: "**Meeting Summary**\n\n\
**Overview:**\nCareer guidance session on internship applications.\n\n\
**Key Points:**\n- Portfolio should highlight two strong projects\n\
- Interview preparation should focus on explaining reasoning\n\n\
**Action Items:**\n- {student} documents two projects this week\n\n\
**Next Steps:**\nMock interview with {mentor} in the next session.",
        keywords: &["internships", "portfolio", "interviews"],
    },
    CannedSession {
        transcript: "{mentor}: How are you feeling about the group project?\n\n\
{student}: Honestly stressed. One teammate isn't contributing.\n\n\
{mentor}: Write down who owns which task and share it with the whole group.\n\n\
{student}: And if that doesn't help?\n\n\
{mentor}: Then bring it to the course coordinator early, with the task list as evidence.",
        summary: "**Meeting Summary**\n\n\
**Overview:**\nWellbeing check and conflict resolution in a group project.\n\n\
**Key Points:**\n- Uneven contribution is causing stress\n\
- Explicit task ownership should make expectations visible\n\n\
**Action Items:**\n- {student} shares a task ownership list with the group\n\n\
**Next Steps:**\nEscalate to the coordinator if nothing changes within a week.",
        keywords: &["teamwork", "conflict", "wellbeing"],
    },
];

/// Stand-in for the transcription backend
///
/// Picks one of a few canned mentoring conversations based on the meeting
/// id and fills in the participants' names.
pub struct MockTranscriber {
    processing_delay: Duration,
}

impl MockTranscriber {
    pub fn new(processing_delay: Duration) -> Self {
        Self { processing_delay }
    }

    fn pick(meeting_id: &str) -> &'static CannedSession {
        let index = meeting_id
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
        &CANNED_SESSIONS[index % CANNED_SESSIONS.len()]
    }
}

fn fill(template: &str, metadata: &MeetingMetadata) -> String {
    template
        .replace("{mentor}", &metadata.mentor_name)
        .replace("{student}", &metadata.student_name)
}

#[async_trait::async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(
        &self,
        clip: FinalizedClip,
        metadata: &MeetingMetadata,
    ) -> Result<TranscriptResponse> {
        info!(
            "Processing {} bytes of audio for meeting {}",
            clip.size(),
            metadata.meeting_id
        );

        if !self.processing_delay.is_zero() {
            tokio::time::sleep(self.processing_delay).await;
        }

        let canned = Self::pick(&metadata.meeting_id);
        Ok(TranscriptResponse {
            transcript: fill(canned.transcript, metadata),
            summary: fill(canned.summary, metadata),
            keywords: canned.keywords.iter().map(|k| k.to_string()).collect(),
            duration_secs: metadata.duration_secs,
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}
