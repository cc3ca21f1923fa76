use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot of a session's live telemetry
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingState {
    /// Whether audio is currently being captured
    pub is_recording: bool,

    /// Whole seconds since the current recording cycle started
    pub duration_seconds: u64,

    /// Live loudness in [0, 100]
    pub audio_level: f32,
}

impl RecordingState {
    /// The state after a reset: not recording, no duration, silent
    pub const IDLE: Self = Self {
        is_recording: false,
        duration_seconds: 0,
        audio_level: 0.0,
    };
}

/// Externally visible lifecycle of a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Recording,
    Paused,
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Unique, never reused session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// `meeting-<unix millis>-<random suffix>`
    ///
    /// The suffix keeps ids distinct when two sessions open in the same
    /// millisecond.
    pub fn generate() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!(
            "meeting-{}-{}",
            Utc::now().timestamp_millis(),
            &suffix[..8]
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
