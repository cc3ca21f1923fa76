use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::model::{
    Meeting, MeetingMetadata, MeetingRecord, MeetingStatus, RecordFilter, StudentDetails,
};
use super::store::MeetingStore;
use super::transcriber::Transcriber;
use crate::audio::CaptureDeviceAdapter;
use crate::error::HandoffError;
use crate::registry::SessionRegistry;
use crate::session::{RecordingSession, SessionConfig, SessionId};

const PLACEHOLDER_TRANSCRIPT: &str = "Processing transcript...";
const PLACEHOLDER_SUMMARY: &str = "Processing summary...";

struct ActiveMeeting {
    meeting: Meeting,
    session: Arc<RecordingSession>,
}

/// A meeting just opened, with its recording session
pub struct OpenedMeeting {
    pub meeting: Meeting,
    pub session: Arc<RecordingSession>,
    /// False when the registry was full; the session still works
    pub registered: bool,
}

/// Creates recording sessions for meetings and hands finished recordings
/// to transcription and storage
pub struct MeetingCoordinator {
    adapter: Arc<dyn CaptureDeviceAdapter>,
    session_config: SessionConfig,
    registry: Arc<SessionRegistry>,
    store: Arc<dyn MeetingStore>,
    transcriber: Arc<dyn Transcriber>,
    upload_timeout: Duration,
    /// Every open meeting, registered or not (meeting_id → meeting)
    meetings: RwLock<HashMap<SessionId, ActiveMeeting>>,
}

impl MeetingCoordinator {
    pub fn new(
        adapter: Arc<dyn CaptureDeviceAdapter>,
        session_config: SessionConfig,
        registry: Arc<SessionRegistry>,
        store: Arc<dyn MeetingStore>,
        transcriber: Arc<dyn Transcriber>,
        upload_timeout: Duration,
    ) -> Self {
        info!(
            "Meeting coordinator ready (device: {}, transcriber: {}, capacity: {})",
            adapter.name(),
            transcriber.name(),
            registry.capacity()
        );

        Self {
            adapter,
            session_config,
            registry,
            store,
            transcriber,
            upload_timeout,
            meetings: RwLock::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn MeetingStore> {
        &self.store
    }

    /// Create a meeting and its idle recording session
    ///
    /// Registration is best effort: past capacity the meeting is still
    /// opened, just not tracked by the registry.
    pub fn open_meeting(
        &self,
        mentor_id: &str,
        mentor_name: &str,
        student_name: &str,
    ) -> OpenedMeeting {
        self.open_meeting_with(
            mentor_id,
            mentor_name,
            student_name,
            StudentDetails::default(),
        )
    }

    /// Like `open_meeting`, keeping the student's enrollment details
    pub fn open_meeting_with(
        &self,
        mentor_id: &str,
        mentor_name: &str,
        student_name: &str,
        student: StudentDetails,
    ) -> OpenedMeeting {
        let id = SessionId::generate();
        let session = Arc::new(RecordingSession::new(
            id.clone(),
            Arc::clone(&self.adapter),
            self.session_config.clone(),
        ));

        let meeting = Meeting {
            id: id.clone(),
            mentor_id: mentor_id.to_string(),
            mentor_name: mentor_name.to_string(),
            student_name: student_name.to_string(),
            student,
            start_time: Utc::now(),
            status: MeetingStatus::Recording,
        };

        let registered = match self.registry.register(Arc::clone(&session)) {
            Ok(()) => true,
            Err(e) => {
                warn!("Meeting {} opened without registry slot: {}", id, e);
                false
            }
        };

        self.meetings.write().insert(
            id.clone(),
            ActiveMeeting {
                meeting: meeting.clone(),
                session: Arc::clone(&session),
            },
        );

        info!(
            "Opened meeting {} for mentor {} ({} active)",
            id,
            mentor_name,
            self.registry.count()
        );

        OpenedMeeting {
            meeting,
            session,
            registered,
        }
    }

    pub fn session(&self, id: &SessionId) -> Option<Arc<RecordingSession>> {
        self.meetings
            .read()
            .get(id)
            .map(|m| Arc::clone(&m.session))
    }

    pub fn meeting(&self, id: &SessionId) -> Option<Meeting> {
        self.meetings.read().get(id).map(|m| m.meeting.clone())
    }

    /// Number of open meetings, including untracked ones
    pub fn open_count(&self) -> usize {
        self.meetings.read().len()
    }

    /// Number of sessions holding a registry slot
    pub fn active_count(&self) -> usize {
        self.registry.count()
    }

    fn set_status(&self, id: &SessionId, status: MeetingStatus) {
        if let Some(active) = self.meetings.write().get_mut(id) {
            active.meeting.status = status;
        }
    }

    /// Hand a stopped meeting's clip to transcription and storage
    ///
    /// Without a finalized, non-empty clip nothing is sent. The record is
    /// stored with placeholder text first and updated once the transcript
    /// arrives; on success the meeting is closed and its slot released.
    pub async fn end_meeting(&self, id: &SessionId) -> Result<MeetingRecord, HandoffError> {
        let (meeting, session) = {
            let mut meetings = self.meetings.write();
            let active = meetings
                .get_mut(id)
                .ok_or_else(|| HandoffError::UnknownMeeting(id.to_string()))?;

            if active.meeting.status == MeetingStatus::Processing {
                return Err(HandoffError::InProgress(id.to_string()));
            }

            (active.meeting.clone(), Arc::clone(&active.session))
        };

        let clip = session.require_clip()?;
        if clip.is_empty() {
            warn!("Meeting {} has an empty recording; not uploading", id);
            return Err(HandoffError::NoClipAvailable);
        }

        self.set_status(id, MeetingStatus::Processing);

        let end_time = Utc::now();
        let duration_secs = session.state().duration_seconds;
        let start_time = session.started_at().unwrap_or(meeting.start_time);

        let mut record = MeetingRecord {
            id: id.to_string(),
            mentor_id: meeting.mentor_id.clone(),
            mentor_name: meeting.mentor_name.clone(),
            student_name: meeting.student_name.clone(),
            student: meeting.student.clone(),
            start_time,
            end_time,
            duration_secs,
            transcript: PLACEHOLDER_TRANSCRIPT.to_string(),
            summary: PLACEHOLDER_SUMMARY.to_string(),
        };

        if let Err(e) = self.store.save(record.clone()).await {
            self.set_status(id, MeetingStatus::Recording);
            return Err(HandoffError::Storage(e));
        }

        let metadata = MeetingMetadata {
            meeting_id: id.to_string(),
            mentor_id: meeting.mentor_id,
            mentor_name: meeting.mentor_name,
            student_name: meeting.student_name,
            student: meeting.student,
            duration_secs,
            start_time,
            end_time: Some(end_time),
        };

        info!(
            "Uploading meeting {} ({} bytes, {}s) to {}",
            id,
            clip.size(),
            duration_secs,
            self.transcriber.name()
        );

        let response = match tokio::time::timeout(
            self.upload_timeout,
            self.transcriber.transcribe(clip, &metadata),
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                error!("Failed to process meeting {}: {:#}", id, e);
                self.set_status(id, MeetingStatus::Recording);
                return Err(HandoffError::Transcription(format!("{:#}", e)));
            }
            Err(_) => {
                error!("Transcription of meeting {} timed out", id);
                self.set_status(id, MeetingStatus::Recording);
                return Err(HandoffError::Timeout(self.upload_timeout.as_secs()));
            }
        };

        record.transcript = response.transcript;
        record.summary = response.summary;

        let stored = match self
            .store
            .update(&record.id, &record.transcript, &record.summary)
            .await
        {
            // Placeholder vanished in the meantime
            Ok(false) => self.store.save(record.clone()).await,
            Ok(true) => Ok(()),
            Err(e) => Err(e),
        };
        if let Err(e) = stored {
            error!("Failed to store transcript for meeting {}: {:#}", id, e);
            self.set_status(id, MeetingStatus::Recording);
            return Err(HandoffError::Storage(e));
        }

        self.meetings.write().remove(id);
        self.registry.unregister(id);

        info!(
            "Meeting {} completed ({} active)",
            id,
            self.registry.count()
        );

        Ok(record)
    }

    /// Throw a meeting away: reset its session and release its slot
    pub async fn discard_meeting(&self, id: &SessionId) -> bool {
        let removed = self.meetings.write().remove(id);
        match removed {
            Some(active) => {
                active.session.reset().await;
                self.registry.unregister(id);
                info!("Discarded meeting {}", id);
                true
            }
            None => false,
        }
    }

    pub async fn list_records(&self) -> anyhow::Result<Vec<MeetingRecord>> {
        self.store.list().await
    }

    pub async fn find_records(&self, filter: &RecordFilter) -> anyhow::Result<Vec<MeetingRecord>> {
        self.store.find(filter).await
    }

    pub async fn record(&self, id: &str) -> anyhow::Result<Option<MeetingRecord>> {
        self.store.get(id).await
    }

    /// Replace a stored transcript and summary, returning the edited record
    pub async fn update_record(
        &self,
        id: &str,
        transcript: &str,
        summary: &str,
    ) -> anyhow::Result<Option<MeetingRecord>> {
        if !self.store.update(id, transcript, summary).await? {
            return Ok(None);
        }
        info!("Updated transcript of meeting {}", id);
        self.store.get(id).await
    }

    pub async fn delete_record(&self, id: &str) -> anyhow::Result<bool> {
        let deleted = self.store.delete(id).await?;
        if deleted {
            info!("Deleted stored meeting {}", id);
        }
        Ok(deleted)
    }
}
