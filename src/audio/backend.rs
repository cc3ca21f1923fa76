use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::analyser::SpectrumSource;
use crate::error::DeviceAccessError;

/// A fragment of raw audio emitted by a capture stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Bytes as produced by the device (opaque to the session)
    pub data: Vec<u8>,
    /// Milliseconds since the stream was opened
    pub timestamp_ms: u64,
}

/// Byte layout of the chunks a stream produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClipEncoding {
    /// Interleaved signed 16-bit little-endian PCM
    Pcm16Le { sample_rate: u32, channels: u16 },
    /// Container data the core does not interpret
    Opaque { mime_type: String },
}

impl ClipEncoding {
    pub fn mime_type(&self) -> String {
        match self {
            Self::Pcm16Le {
                sample_rate,
                channels,
            } => format!("audio/L16;rate={};channels={}", sample_rate, channels),
            Self::Opaque { mime_type } => mime_type.clone(),
        }
    }
}

/// Configuration shared by the capture devices
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate requested from the device
    pub sample_rate: u32,
    /// Channel count of emitted chunks (1 = mono)
    pub channels: u16,
    /// How often the device emits a chunk
    pub chunk_interval_ms: u64,
    /// Analysis window of the spectrum analyser (power of two)
    pub fft_size: usize,
    /// Smoothing between successive spectrum reads (0.0 - 1.0)
    pub smoothing: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            chunk_interval_ms: 250,
            fft_size: 256,
            smoothing: 0.8,
        }
    }
}

/// A live capture stream handed to a recording session
pub struct OpenedStream {
    pub stream: Box<dyn CaptureStream>,
    /// Chunks in capture order; yields `None` after `close()` has flushed
    pub chunks: mpsc::Receiver<AudioChunk>,
    pub encoding: ClipEncoding,
}

/// Platform capture device
///
/// Implementations:
/// - `ToneCaptureAdapter`: synthetic sine source (demo and tests)
/// - `MicrophoneAdapter`: default input device via cpal (feature `microphone`)
#[async_trait::async_trait]
pub trait CaptureDeviceAdapter: Send + Sync {
    /// Request a new capture stream
    ///
    /// Suspends until the platform grants or denies access.
    async fn open_stream(&self) -> Result<OpenedStream, DeviceAccessError>;

    /// Adapter name for logging
    fn name(&self) -> &str;
}

/// Control handle of an open capture stream
///
/// A stream is owned by exactly one session.
#[async_trait::async_trait]
pub trait CaptureStream: Send {
    /// Analysis node fed with the live signal
    fn analyser(&self) -> Arc<dyn SpectrumSource>;

    /// Stop emitting chunks until `resume()`
    fn pause(&mut self);

    fn resume(&mut self);

    /// Release the device
    ///
    /// Idempotent. Chunks already emitted stay readable, then the chunk
    /// channel ends.
    async fn close(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;
}

/// Encode i16 samples as little-endian bytes
pub fn pcm16_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Decode little-endian bytes into i16 samples, ignoring a trailing odd byte
pub fn bytes_to_pcm16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Average interleaved channels down to mono
pub fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
