//! HTTP API server for controlling recording sessions
//!
//! This module provides a REST API over the meeting coordinator:
//! - POST /meetings - Open a meeting with an idle recording session
//! - POST /meetings/:id/{start,pause,stop,reset} - Drive the session
//! - GET /meetings/:id/state - Live recording state
//! - GET /meetings/:id/clip - WAV preview of the finalized clip
//! - POST /meetings/:id/end - Hand the clip off for transcription
//! - DELETE /meetings/:id - Discard a meeting
//! - GET /meetings - Completed meetings
//! - GET /meetings/count - Active session count
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
