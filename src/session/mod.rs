//! Recording session management
//!
//! This module provides the `RecordingSession` state machine that manages:
//! - Capture stream lifecycle (start, pause, resume, stop, reset)
//! - Chunk accumulation into a finalized clip
//! - Duration and audio-level telemetry
//! - Resource release on stop and reset

mod clip;
mod config;
mod session;
mod state;

pub use clip::FinalizedClip;
pub use config::SessionConfig;
pub use session::RecordingSession;
pub use state::{LifecycleState, RecordingState, SessionId};
