//! Meeting hand-off
//!
//! Wraps recording sessions in mentoring meetings and moves finished
//! recordings downstream:
//! - Opening meetings with a best-effort registry slot
//! - Uploading finalized clips for transcription and summarization
//! - Persisting completed meetings
//! - The mentor directory

mod coordinator;
mod mentor;
mod model;
mod store;
mod transcriber;

pub use coordinator::{MeetingCoordinator, OpenedMeeting};
pub use mentor::{Mentor, MentorDirectory, MentorSummary};
pub use model::{
    Meeting, MeetingMetadata, MeetingRecord, MeetingStatus, RecordFilter, StudentDetails,
    TranscriptResponse,
};
pub use store::{JsonFileStore, MeetingStore, MemoryStore};
pub use transcriber::{MockTranscriber, Transcriber};
