use super::state::AppState;
use crate::error::{DeviceAccessError, HandoffError, RecorderError};
use crate::meeting::{Meeting, MeetingRecord, RecordFilter, StudentDetails};
use crate::session::{LifecycleState, RecordingSession, RecordingState, SessionId};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OpenMeetingRequest {
    pub mentor_id: String,

    /// Falls back to the mentor directory, then the mentor id
    pub mentor_name: Option<String>,

    pub student_name: Option<String>,

    pub registration_number: Option<String>,
    pub batch_id: Option<String>,
    pub student_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecordRequest {
    pub transcript: String,
    pub summary: String,
}

#[derive(Debug, Serialize)]
pub struct OpenMeetingResponse {
    pub meeting: Meeting,
    /// False when the active-session limit was reached
    pub registered: bool,
    pub active_sessions: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub meeting_id: String,
    pub lifecycle: LifecycleState,
    pub state: RecordingState,
    pub has_clip: bool,
    pub clip_bytes: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct MeetingDetailResponse {
    pub meeting: Meeting,
    pub status: SessionStatusResponse,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub active: usize,
    pub open: usize,
    pub capacity: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn not_found(meeting_id: &str) -> Response {
    error_response(
        StatusCode::NOT_FOUND,
        format!("Meeting {} not found", meeting_id),
    )
}

fn session_status(session: &RecordingSession) -> SessionStatusResponse {
    let clip = session.clip();
    SessionStatusResponse {
        meeting_id: session.id().to_string(),
        lifecycle: session.lifecycle(),
        state: session.state(),
        has_clip: clip.is_some(),
        clip_bytes: clip.map(|c| c.size()),
    }
}

fn lookup(state: &AppState, meeting_id: &str) -> Result<Arc<RecordingSession>, Response> {
    state
        .coordinator
        .session(&SessionId::from(meeting_id))
        .ok_or_else(|| not_found(meeting_id))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /meetings
/// Open a meeting with an idle recording session
pub async fn open_meeting(
    State(state): State<AppState>,
    Json(req): Json<OpenMeetingRequest>,
) -> impl IntoResponse {
    let mentor_name = req
        .mentor_name
        .or_else(|| state.mentors.get(&req.mentor_id).map(|m| m.name.clone()))
        .unwrap_or_else(|| req.mentor_id.clone());
    let student_name = req.student_name.unwrap_or_else(|| "Student".to_string());
    let student = StudentDetails {
        registration_number: req.registration_number,
        batch_id: req.batch_id,
        email: req.student_email,
    };

    let opened = state.coordinator.open_meeting_with(
        &req.mentor_id,
        &mentor_name,
        &student_name,
        student,
    );

    (
        StatusCode::CREATED,
        Json(OpenMeetingResponse {
            meeting: opened.meeting,
            registered: opened.registered,
            active_sessions: state.coordinator.active_count(),
        }),
    )
        .into_response()
}

fn storage_error(action: &str, e: anyhow::Error) -> Response {
    error!("Failed to {}: {:#}", action, e);
    error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("Failed to {}: {}", action, e),
    )
}

/// GET /meetings?mentor_id=&student_name=
/// Completed meetings, newest first
pub async fn list_meetings(
    State(state): State<AppState>,
    Query(filter): Query<RecordFilter>,
) -> impl IntoResponse {
    match state.coordinator.find_records(&filter).await {
        Ok(records) => (StatusCode::OK, Json::<Vec<MeetingRecord>>(records)).into_response(),
        Err(e) => storage_error("list meetings", e),
    }
}

/// GET /meetings/:meeting_id/record
pub async fn get_record(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.coordinator.record(&meeting_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => not_found(&meeting_id),
        Err(e) => storage_error("load meeting", e),
    }
}

/// PUT /meetings/:meeting_id/record
/// Edit the stored transcript and summary
pub async fn update_record(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
    Json(req): Json<UpdateRecordRequest>,
) -> impl IntoResponse {
    match state
        .coordinator
        .update_record(&meeting_id, &req.transcript, &req.summary)
        .await
    {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => not_found(&meeting_id),
        Err(e) => storage_error("update meeting", e),
    }
}

/// DELETE /meetings/:meeting_id/record
pub async fn delete_record(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match state.coordinator.delete_record(&meeting_id).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => not_found(&meeting_id),
        Err(e) => storage_error("delete meeting", e),
    }
}

/// GET /mentors
/// Mentor roster with meeting counts
pub async fn list_mentors(State(state): State<AppState>) -> impl IntoResponse {
    match state.coordinator.list_records().await {
        Ok(records) => (StatusCode::OK, Json(state.mentors.summaries(&records))).into_response(),
        Err(e) => storage_error("list mentors", e),
    }
}

/// GET /mentors/:mentor_id
pub async fn get_mentor(
    State(state): State<AppState>,
    Path(mentor_id): Path<String>,
) -> impl IntoResponse {
    let records = match state.coordinator.list_records().await {
        Ok(records) => records,
        Err(e) => return storage_error("load mentor", e),
    };

    match state.mentors.summary(&mentor_id, &records) {
        Some(summary) => (StatusCode::OK, Json(summary)).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            format!("Mentor {} not found", mentor_id),
        ),
    }
}

/// GET /meetings/count
pub async fn active_count(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.coordinator.registry();
    Json(CountResponse {
        active: registry.count(),
        open: state.coordinator.open_count(),
        capacity: registry.capacity(),
    })
}

/// GET /meetings/:meeting_id
pub async fn get_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    let id = SessionId::from(meeting_id.as_str());
    match (
        state.coordinator.meeting(&id),
        state.coordinator.session(&id),
    ) {
        (Some(meeting), Some(session)) => (
            StatusCode::OK,
            Json(MeetingDetailResponse {
                meeting,
                status: session_status(&session),
            }),
        )
            .into_response(),
        _ => not_found(&meeting_id),
    }
}

/// POST /meetings/:meeting_id/start
/// Start recording, or resume a paused recording
pub async fn start_recording(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    let session = match lookup(&state, &meeting_id) {
        Ok(s) => s,
        Err(response) => return response,
    };

    info!("Starting recording for meeting: {}", meeting_id);

    match session.start().await {
        Ok(()) => (StatusCode::OK, Json(session_status(&session))).into_response(),
        Err(RecorderError::DeviceAccess(e)) => {
            error!("Failed to start recording for {}: {}", meeting_id, e);
            let status = match e {
                DeviceAccessError::PermissionDenied(_) => StatusCode::FORBIDDEN,
                DeviceAccessError::NoDevice | DeviceAccessError::Backend(_) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
            };
            error_response(
                status,
                format!(
                    "Failed to start recording. Please check microphone permissions. ({})",
                    e
                ),
            )
        }
        Err(e) => error_response(StatusCode::CONFLICT, e.to_string()),
    }
}

/// POST /meetings/:meeting_id/pause
pub async fn pause_recording(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match lookup(&state, &meeting_id) {
        Ok(session) => {
            session.pause();
            (StatusCode::OK, Json(session_status(&session))).into_response()
        }
        Err(response) => response,
    }
}

/// POST /meetings/:meeting_id/stop
pub async fn stop_recording(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    info!("Stopping recording for meeting: {}", meeting_id);

    match lookup(&state, &meeting_id) {
        Ok(session) => {
            session.stop().await;
            (StatusCode::OK, Json(session_status(&session))).into_response()
        }
        Err(response) => response,
    }
}

/// POST /meetings/:meeting_id/reset
pub async fn reset_recording(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match lookup(&state, &meeting_id) {
        Ok(session) => {
            session.reset().await;
            (StatusCode::OK, Json(session_status(&session))).into_response()
        }
        Err(response) => response,
    }
}

/// GET /meetings/:meeting_id/state
pub async fn get_recording_state(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    match lookup(&state, &meeting_id) {
        Ok(session) => (StatusCode::OK, Json(session_status(&session))).into_response(),
        Err(response) => response,
    }
}

/// GET /meetings/:meeting_id/clip
/// Finalized clip as WAV, for preview before ending the meeting
pub async fn get_clip(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    let session = match lookup(&state, &meeting_id) {
        Ok(s) => s,
        Err(response) => return response,
    };

    let clip = match session.require_clip() {
        Ok(clip) => clip,
        Err(e) => return error_response(StatusCode::CONFLICT, e.to_string()),
    };

    match clip.to_wav() {
        Ok(wav) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "audio/wav".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("inline; filename=\"{}.wav\"", meeting_id),
                ),
            ],
            wav,
        )
            .into_response(),
        Err(_) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, clip.mime_type())],
            clip.data().to_vec(),
        )
            .into_response(),
    }
}

/// POST /meetings/:meeting_id/end
/// Send the clip for transcription and store the meeting
pub async fn end_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    info!("Ending meeting: {}", meeting_id);

    match state
        .coordinator
        .end_meeting(&SessionId::from(meeting_id.as_str()))
        .await
    {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => {
            error!("Failed to end meeting {}: {}", meeting_id, e);
            let status = match e {
                HandoffError::UnknownMeeting(_) => StatusCode::NOT_FOUND,
                HandoffError::NoClipAvailable | HandoffError::InProgress(_) => {
                    StatusCode::CONFLICT
                }
                HandoffError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                HandoffError::Transcription(_) => StatusCode::BAD_GATEWAY,
                HandoffError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            error_response(status, e.to_string())
        }
    }
}

/// DELETE /meetings/:meeting_id
pub async fn discard_meeting(
    State(state): State<AppState>,
    Path(meeting_id): Path<String>,
) -> impl IntoResponse {
    if state
        .coordinator
        .discard_meeting(&SessionId::from(meeting_id.as_str()))
        .await
    {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found(&meeting_id)
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
