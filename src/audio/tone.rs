// Synthetic capture device
//
// Produces a sine tone with a slow amplitude envelope as 16-bit PCM chunks
// on a tokio interval. Access can be configured to fail, which makes it the
// device of choice for the demo binary and for tests.

use anyhow::Result;
use parking_lot::Mutex;
use std::f32::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::analyser::{SpectrumAnalyser, SpectrumSource};
use super::backend::{
    pcm16_to_bytes, AudioChunk, CaptureConfig, CaptureDeviceAdapter, CaptureStream, ClipEncoding,
    OpenedStream,
};
use crate::error::DeviceAccessError;

/// Outcome of the next access request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAccess {
    Granted,
    Denied,
    NoDevice,
}

#[derive(Debug, Clone)]
pub struct ToneConfig {
    pub capture: CaptureConfig,
    /// Tone frequency in Hz
    pub frequency_hz: f32,
    /// Peak amplitude (0.0 - 1.0)
    pub amplitude: f32,
    /// Simulated wait for the permission prompt
    pub grant_delay: Duration,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            capture: CaptureConfig::default(),
            frequency_hz: 440.0,
            amplitude: 0.3,
            grant_delay: Duration::ZERO,
        }
    }
}

pub struct ToneCaptureAdapter {
    config: ToneConfig,
    access: Mutex<DeviceAccess>,
}

impl ToneCaptureAdapter {
    pub fn new(config: ToneConfig) -> Self {
        info!(
            "Tone capture device initialized ({}Hz, {} channels, {:.0}Hz tone)",
            config.capture.sample_rate, config.capture.channels, config.frequency_hz
        );

        Self {
            config,
            access: Mutex::new(DeviceAccess::Granted),
        }
    }

    /// Change how subsequent access requests are answered
    pub fn set_access(&self, access: DeviceAccess) {
        *self.access.lock() = access;
    }
}

#[async_trait::async_trait]
impl CaptureDeviceAdapter for ToneCaptureAdapter {
    async fn open_stream(&self) -> Result<OpenedStream, DeviceAccessError> {
        if !self.config.grant_delay.is_zero() {
            tokio::time::sleep(self.config.grant_delay).await;
        }

        let access = *self.access.lock();
        match access {
            DeviceAccess::Granted => {}
            DeviceAccess::Denied => {
                warn!("Tone device: access denied");
                return Err(DeviceAccessError::PermissionDenied(
                    "access to the tone device was denied".to_string(),
                ));
            }
            DeviceAccess::NoDevice => {
                warn!("Tone device: no device available");
                return Err(DeviceAccessError::NoDevice);
            }
        }

        let capture = &self.config.capture;
        let analyser = Arc::new(SpectrumAnalyser::new(capture.fft_size, capture.smoothing));
        let paused = Arc::new(AtomicBool::new(false));
        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let generator = ToneGenerator {
            sample_rate: capture.sample_rate,
            channels: capture.channels.max(1),
            frequency_hz: self.config.frequency_hz,
            amplitude: self.config.amplitude.clamp(0.0, 1.0),
            position: 0,
        };

        let task = tokio::spawn(generate(
            generator,
            Duration::from_millis(capture.chunk_interval_ms.max(1)),
            Arc::clone(&analyser),
            Arc::clone(&paused),
            chunk_tx,
            shutdown_rx,
        ));

        debug!("Tone capture stream opened");

        Ok(OpenedStream {
            stream: Box::new(ToneStream {
                analyser,
                paused,
                shutdown: Some(shutdown_tx),
                task: Some(task),
            }),
            chunks: chunk_rx,
            encoding: ClipEncoding::Pcm16Le {
                sample_rate: capture.sample_rate,
                channels: capture.channels.max(1),
            },
        })
    }

    fn name(&self) -> &str {
        "Synthetic tone"
    }
}

struct ToneGenerator {
    sample_rate: u32,
    channels: u16,
    frequency_hz: f32,
    amplitude: f32,
    position: u64,
}

impl ToneGenerator {
    /// Next block of mono samples covering `duration`
    fn next_block(&mut self, duration: Duration) -> Vec<i16> {
        let frames = (self.sample_rate as u128 * duration.as_millis() / 1000) as usize;
        let rate = self.sample_rate as f32;

        (0..frames)
            .map(|_| {
                let t = self.position as f32 / rate;
                self.position += 1;
                // 0.5 Hz envelope so the meter has something to follow
                let envelope = 0.6 + 0.4 * (2.0 * PI * 0.5 * t).sin();
                let value = self.amplitude * envelope * (2.0 * PI * self.frequency_hz * t).sin();
                (value * i16::MAX as f32) as i16
            })
            .collect()
    }
}

async fn generate(
    mut generator: ToneGenerator,
    interval: Duration,
    analyser: Arc<SpectrumAnalyser>,
    paused: Arc<AtomicBool>,
    chunk_tx: mpsc::Sender<AudioChunk>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let opened_at = Instant::now();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; chunks start one interval in
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                if paused.load(Ordering::SeqCst) {
                    continue;
                }

                let mono = generator.next_block(interval);
                analyser.push_pcm16(&mono);

                let samples: Vec<i16> = mono
                    .iter()
                    .flat_map(|&s| std::iter::repeat(s).take(generator.channels as usize))
                    .collect();

                let chunk = AudioChunk {
                    data: pcm16_to_bytes(&samples),
                    timestamp_ms: opened_at.elapsed().as_millis() as u64,
                };

                if chunk_tx.send(chunk).await.is_err() {
                    debug!("Chunk receiver dropped, stopping tone generator");
                    break;
                }
            }
        }
    }
}

struct ToneStream {
    analyser: Arc<SpectrumAnalyser>,
    paused: Arc<AtomicBool>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

#[async_trait::async_trait]
impl CaptureStream for ToneStream {
    fn analyser(&self) -> Arc<dyn SpectrumSource> {
        self.analyser.clone()
    }

    fn pause(&mut self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if let Some(task) = self.task.take() {
            task.await?;
            debug!("Tone capture stream closed");
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for ToneStream {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
