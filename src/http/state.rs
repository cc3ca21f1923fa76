use crate::meeting::{MeetingCoordinator, MentorDirectory};
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<MeetingCoordinator>,
    pub mentors: Arc<MentorDirectory>,
}

impl AppState {
    /// State with the built-in mentor roster
    pub fn new(coordinator: Arc<MeetingCoordinator>) -> Self {
        Self::with_mentors(coordinator, Arc::new(MentorDirectory::builtin()))
    }

    pub fn with_mentors(
        coordinator: Arc<MeetingCoordinator>,
        mentors: Arc<MentorDirectory>,
    ) -> Self {
        Self {
            coordinator,
            mentors,
        }
    }
}
