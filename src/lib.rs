pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod meeting;
pub mod registry;
pub mod session;
pub mod telemetry;

pub use audio::{
    AudioChunk, CaptureConfig, CaptureDeviceAdapter, CaptureStream, ClipEncoding, DeviceAccess,
    LevelMeter, OpenedStream, SpectrumAnalyser, SpectrumSource, ToneCaptureAdapter, ToneConfig,
};
pub use config::Config;
pub use error::{DeviceAccessError, HandoffError, RecorderError, RegistryError};
pub use http::{create_router, AppState};
pub use meeting::{
    JsonFileStore, Meeting, MeetingCoordinator, MeetingRecord, MeetingStore, MemoryStore,
    MentorDirectory, MockTranscriber, RecordFilter, StudentDetails, Transcriber,
};
pub use registry::{SessionRegistry, DEFAULT_MAX_SESSIONS};
pub use session::{
    FinalizedClip, LifecycleState, RecordingSession, RecordingState, SessionConfig, SessionId,
};
pub use telemetry::{Publisher, Subscription};
