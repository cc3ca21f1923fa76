use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Meetings
        .route(
            "/meetings",
            get(handlers::list_meetings).post(handlers::open_meeting),
        )
        .route("/meetings/count", get(handlers::active_count))
        .route(
            "/meetings/:meeting_id",
            get(handlers::get_meeting).delete(handlers::discard_meeting),
        )
        // Recording control
        .route("/meetings/:meeting_id/start", post(handlers::start_recording))
        .route("/meetings/:meeting_id/pause", post(handlers::pause_recording))
        .route("/meetings/:meeting_id/stop", post(handlers::stop_recording))
        .route("/meetings/:meeting_id/reset", post(handlers::reset_recording))
        // Telemetry and hand-off
        .route("/meetings/:meeting_id/state", get(handlers::get_recording_state))
        .route("/meetings/:meeting_id/clip", get(handlers::get_clip))
        .route("/meetings/:meeting_id/end", post(handlers::end_meeting))
        // Stored meetings
        .route(
            "/meetings/:meeting_id/record",
            get(handlers::get_record)
                .put(handlers::update_record)
                .delete(handlers::delete_record),
        )
        // Mentors
        .route("/mentors", get(handlers::list_mentors))
        .route("/mentors/:mentor_id", get(handlers::get_mentor))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
