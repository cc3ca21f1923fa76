use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing configuration for a recording session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// How often the elapsed duration is recomputed while recording
    /// Default: 100ms
    pub duration_tick: Duration,

    /// How often the level meter samples the live stream
    /// Default: 16ms (one display refresh at ~60Hz)
    pub level_tick: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration_tick: Duration::from_millis(100),
            level_tick: Duration::from_millis(16),
        }
    }
}
