use thiserror::Error;

/// Failure to obtain a capture stream from the platform
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceAccessError {
    #[error("Microphone access denied: {0}")]
    PermissionDenied(String),

    #[error("No audio input device available")]
    NoDevice,

    #[error("Audio backend failure: {0}")]
    Backend(String),
}

/// Errors surfaced by the recording core
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error(transparent)]
    DeviceAccess(#[from] DeviceAccessError),

    /// The device grant arrived after the session was reset
    #[error("Start superseded by a reset while waiting for device access")]
    StartSuperseded,

    #[error("Maximum concurrent sessions reached ({capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("No audio recording found. Record audio before ending the meeting.")]
    NoClipAvailable,
}

impl From<RegistryError> for RecorderError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::CapacityExceeded { capacity } => Self::CapacityExceeded { capacity },
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Maximum concurrent sessions reached ({capacity})")]
    CapacityExceeded { capacity: usize },
}

/// Errors from handing a finished recording downstream
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error("Meeting {0} not found")]
    UnknownMeeting(String),

    #[error("No audio recording found. Record audio before ending the meeting.")]
    NoClipAvailable,

    #[error("Meeting {0} is already being processed")]
    InProgress(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Transcription timed out after {0}s")]
    Timeout(u64),

    #[error("Storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl From<RecorderError> for HandoffError {
    fn from(err: RecorderError) -> Self {
        match err {
            RecorderError::NoClipAvailable => Self::NoClipAvailable,
            other => Self::Transcription(other.to_string()),
        }
    }
}
