// Integration tests for the HTTP API
//
// Requests go straight into the router via `oneshot`, no socket involved.

mod common;

use anyhow::Result;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{settle, ScriptedAdapter};
use mentormeet::audio::DeviceAccess;
use mentormeet::{
    create_router, AppState, MeetingCoordinator, MemoryStore, MockTranscriber, SessionConfig,
    SessionRegistry,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app() -> (Router, Arc<ScriptedAdapter>) {
    let adapter = ScriptedAdapter::new();
    let coordinator = MeetingCoordinator::new(
        adapter.clone(),
        SessionConfig::default(),
        Arc::new(SessionRegistry::new(40)),
        Arc::new(MemoryStore::new()),
        Arc::new(MockTranscriber::new(Duration::ZERO)),
        Duration::from_secs(5),
    );

    (
        create_router(AppState::new(Arc::new(coordinator))),
        adapter,
    )
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Vec<u8>)> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&json)?))?,
        None => builder.body(Body::empty())?,
    };

    let response = app.clone().oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, bytes.to_vec()))
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
) -> Result<(StatusCode, Value)> {
    let (status, bytes) = send(app, method, uri, body).await?;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, value))
}

async fn open(app: &Router) -> Result<String> {
    let (status, body) = send_json(
        app,
        "POST",
        "/meetings",
        Some(json!({"mentor_id": "m1", "mentor_name": "Dr. Iyer", "student_name": "Kiran"})),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["registered"], true);
    Ok(body["meeting"]["id"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let (app, _) = app();
    let (status, body) = send(&app, "GET", "/health", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
    Ok(())
}

#[tokio::test]
async fn test_recording_lifecycle_over_http() -> Result<()> {
    let (app, adapter) = app();
    let id = open(&app).await?;
    assert!(id.starts_with("meeting-"));

    let (status, body) = send_json(&app, "POST", &format!("/meetings/{}/start", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lifecycle"], "recording");
    assert_eq!(body["state"]["isRecording"], true);

    adapter.push(&[0, 1, 2, 3]);
    settle().await;

    let (status, body) = send_json(&app, "POST", &format!("/meetings/{}/pause", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lifecycle"], "paused");
    assert_eq!(body["state"]["audioLevel"], 0.0);

    let (_, body) = send_json(&app, "POST", &format!("/meetings/{}/start", id), None).await?;
    assert_eq!(body["lifecycle"], "recording");

    let (status, body) = send_json(&app, "POST", &format!("/meetings/{}/stop", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lifecycle"], "stopped");
    assert_eq!(body["has_clip"], true);
    assert_eq!(body["clip_bytes"], 4);

    let (_, body) = send_json(&app, "GET", &format!("/meetings/{}/state", id), None).await?;
    assert_eq!(body["state"]["isRecording"], false);

    let (status, wav) = send(&app, "GET", &format!("/meetings/{}/clip", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&wav[..4], b"RIFF");

    let (status, record) = send_json(&app, "POST", &format!("/meetings/{}/end", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(record["id"], id.as_str());
    assert!(record["transcript"]
        .as_str()
        .unwrap_or_default()
        .contains("Kiran:"));

    let (status, list) = send_json(&app, "GET", "/meetings", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().map(|a| a.len()), Some(1));

    // Ended meetings are no longer open
    let (status, _) = send_json(&app, "GET", &format!("/meetings/{}", id), None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

/// Open, record and end a meeting; returns the stored record's id
async fn complete_meeting(
    app: &Router,
    adapter: &ScriptedAdapter,
    mentor_id: &str,
    student_name: &str,
) -> Result<String> {
    let (_, body) = send_json(
        app,
        "POST",
        "/meetings",
        Some(json!({"mentor_id": mentor_id, "student_name": student_name})),
    )
    .await?;
    let id = body["meeting"]["id"].as_str().unwrap_or_default().to_string();

    send(app, "POST", &format!("/meetings/{}/start", id), None).await?;
    adapter.push(&[4, 2]);
    settle().await;
    send(app, "POST", &format!("/meetings/{}/stop", id), None).await?;

    let (status, _) = send(app, "POST", &format!("/meetings/{}/end", id), None).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(id)
}

#[tokio::test]
async fn test_mentor_directory() -> Result<()> {
    let (app, adapter) = app();
    complete_meeting(&app, &adapter, "mentor-2", "Kiran").await?;

    let (status, mentors) = send_json(&app, "GET", "/mentors", None).await?;
    assert_eq!(status, StatusCode::OK);
    let mentors = mentors.as_array().cloned().unwrap_or_default();
    assert_eq!(mentors.len(), 31);
    assert_eq!(mentors[0]["id"], "mentor-1");
    assert_eq!(mentors[0]["batch_id"], "BATCH-01");
    assert_eq!(mentors[0]["total_meetings"], 0);
    assert_eq!(mentors[1]["total_meetings"], 1);
    assert!(mentors[1]["last_meeting"].is_string());

    let (status, mentor) = send_json(&app, "GET", "/mentors/mentor-2", None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mentor["name"], "Sahil Gawathe");
    assert!(mentor["department"].is_string());

    let (status, _) = send(&app, "GET", "/mentors/mentor-99", None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_open_meeting_uses_directory_name_and_student_details() -> Result<()> {
    let (app, _) = app();
    let (status, body) = send_json(
        &app,
        "POST",
        "/meetings",
        Some(json!({
            "mentor_id": "mentor-3",
            "student_name": "Meena",
            "registration_number": "REG-0042",
            "batch_id": "BATCH-01",
            "student_email": "meena@example.edu"
        })),
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["meeting"]["mentor_name"], "Chirag Patil");
    assert_eq!(body["meeting"]["student"]["registration_number"], "REG-0042");
    assert_eq!(body["meeting"]["student"]["email"], "meena@example.edu");

    // Unknown mentors fall back to their id
    let (_, body) = send_json(&app, "POST", "/meetings", Some(json!({"mentor_id": "guest"}))).await?;
    assert_eq!(body["meeting"]["mentor_name"], "guest");
    assert_eq!(body["meeting"]["student_name"], "Student");
    Ok(())
}

#[tokio::test]
async fn test_stored_meetings_filter_edit_and_delete() -> Result<()> {
    let (app, adapter) = app();
    let first = complete_meeting(&app, &adapter, "mentor-1", "Kiran").await?;
    complete_meeting(&app, &adapter, "mentor-1", "Asha").await?;
    complete_meeting(&app, &adapter, "mentor-2", "Kiran").await?;

    let (_, all) = send_json(&app, "GET", "/meetings", None).await?;
    assert_eq!(all.as_array().map(|a| a.len()), Some(3));

    let (_, by_mentor) = send_json(&app, "GET", "/meetings?mentor_id=mentor-1", None).await?;
    assert_eq!(by_mentor.as_array().map(|a| a.len()), Some(2));

    let (_, by_student) = send_json(&app, "GET", "/meetings?student_name=kiran", None).await?;
    assert_eq!(by_student.as_array().map(|a| a.len()), Some(2));

    let (_, both) = send_json(
        &app,
        "GET",
        "/meetings?mentor_id=mentor-2&student_name=Kiran",
        None,
    )
    .await?;
    assert_eq!(both.as_array().map(|a| a.len()), Some(1));

    let record_uri = format!("/meetings/{}/record", first);
    let (status, edited) = send_json(
        &app,
        "PUT",
        &record_uri,
        Some(json!({"transcript": "Edited transcript", "summary": "Edited summary"})),
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["transcript"], "Edited transcript");

    let (status, fetched) = send_json(&app, "GET", &record_uri, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["summary"], "Edited summary");

    let (status, _) = send(&app, "DELETE", &record_uri, None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", &record_uri, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, "GET", &record_uri, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "PUT",
        &record_uri,
        Some(json!({"transcript": "x", "summary": "y"})),
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, all) = send_json(&app, "GET", "/meetings", None).await?;
    assert_eq!(all.as_array().map(|a| a.len()), Some(2));
    Ok(())
}

#[tokio::test]
async fn test_denied_device_is_forbidden() -> Result<()> {
    let (app, adapter) = app();
    let id = open(&app).await?;

    adapter.set_access(DeviceAccess::Denied);
    let (status, body) = send_json(&app, "POST", &format!("/meetings/{}/start", id), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].as_str().unwrap_or_default().contains("microphone"));

    let (_, body) = send_json(&app, "GET", &format!("/meetings/{}", id), None).await?;
    assert_eq!(body["status"]["lifecycle"], "idle");
    assert_eq!(body["meeting"]["mentor_name"], "Dr. Iyer");
    Ok(())
}

#[tokio::test]
async fn test_end_without_clip_is_conflict() -> Result<()> {
    let (app, _) = app();
    let id = open(&app).await?;

    let (status, body) = send_json(&app, "POST", &format!("/meetings/{}/end", id), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"]
        .as_str()
        .unwrap_or_default()
        .starts_with("No audio recording found"));

    let (status, _) = send(&app, "GET", &format!("/meetings/{}/clip", id), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn test_unknown_meeting_is_not_found() -> Result<()> {
    let (app, _) = app();

    for (method, path) in [
        ("POST", "/meetings/nope/start"),
        ("POST", "/meetings/nope/stop"),
        ("GET", "/meetings/nope/state"),
        ("POST", "/meetings/nope/end"),
        ("DELETE", "/meetings/nope"),
    ] {
        let (status, _) = send(&app, method, path, None).await?;
        assert_eq!(status, StatusCode::NOT_FOUND, "{} {}", method, path);
    }
    Ok(())
}

#[tokio::test]
async fn test_count_and_discard() -> Result<()> {
    let (app, _) = app();
    let id = open(&app).await?;
    open(&app).await?;

    let (_, count) = send_json(&app, "GET", "/meetings/count", None).await?;
    assert_eq!(count["active"], 2);
    assert_eq!(count["open"], 2);
    assert_eq!(count["capacity"], 40);

    let (status, _) = send(&app, "DELETE", &format!("/meetings/{}", id), None).await?;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, count) = send_json(&app, "GET", "/meetings/count", None).await?;
    assert_eq!(count["active"], 1);
    Ok(())
}
