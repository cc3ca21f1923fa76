use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::audio::{CaptureConfig, ToneConfig};
use crate::meeting::MentorDirectory;
use crate::registry::DEFAULT_MAX_SESSIONS;
use crate::session::SessionConfig;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub recorder: RecorderConfig,
    pub audio: AudioConfig,
    pub transcriber: TranscriberConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    /// Default tracing filter, overridden by RUST_LOG
    pub log_level: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "mentormeet".to_string(),
            log_level: "info".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Upper bound of the session registry
    pub max_concurrent_sessions: usize,
    pub duration_tick_ms: u64,
    pub level_tick_ms: u64,
    pub chunk_interval_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_sessions: DEFAULT_MAX_SESSIONS,
            duration_tick_ms: 100,
            level_tick_ms: 16,
            chunk_interval_ms: 250,
        }
    }
}

impl RecorderConfig {
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            duration_tick: Duration::from_millis(self.duration_tick_ms.max(1)),
            level_tick: Duration::from_millis(self.level_tick_ms.max(1)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub fft_size: usize,
    pub smoothing: f32,
    pub recordings_path: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            fft_size: 256,
            smoothing: 0.8,
            recordings_path: "recordings".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriberConfig {
    /// Simulated processing time of the mock transcriber
    pub processing_delay_ms: u64,
    pub upload_timeout_secs: u64,
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            processing_delay_ms: 2500,
            upload_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON file holding completed meetings
    pub meetings_path: String,
    /// JSON array of mentors; the built-in roster when unset
    pub mentors_path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            meetings_path: "data/meetings.json".to_string(),
            mentors_path: None,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("MENTORMEET").separator("__"))
            .build()
            .with_context(|| format!("Failed to load config from {}", path))?;

        Ok(settings.try_deserialize()?)
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.audio.sample_rate,
            channels: self.audio.channels,
            chunk_interval_ms: self.recorder.chunk_interval_ms,
            fft_size: self.audio.fft_size,
            smoothing: self.audio.smoothing,
        }
    }

    pub fn tone_config(&self) -> ToneConfig {
        ToneConfig {
            capture: self.capture_config(),
            ..ToneConfig::default()
        }
    }

    pub fn recordings_path(&self) -> PathBuf {
        PathBuf::from(&self.audio.recordings_path)
    }

    pub fn meetings_path(&self) -> PathBuf {
        PathBuf::from(&self.storage.meetings_path)
    }

    pub fn mentor_directory(&self) -> Result<MentorDirectory> {
        match &self.storage.mentors_path {
            Some(path) => MentorDirectory::load(path),
            None => Ok(MentorDirectory::builtin()),
        }
    }
}
