// Microphone capture through cpal
//
// The cpal stream is not `Send` on every platform, so it lives on a
// dedicated thread for its whole life. The session only sees the chunk
// channel, the analyser and a shutdown signal.

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::analyser::{SpectrumAnalyser, SpectrumSource};
use super::backend::{
    downmix_to_mono, pcm16_to_bytes, AudioChunk, CaptureConfig, CaptureDeviceAdapter,
    CaptureStream, ClipEncoding, OpenedStream,
};
use crate::error::DeviceAccessError;

/// Default input device of the default host
pub struct MicrophoneAdapter {
    config: CaptureConfig,
}

impl MicrophoneAdapter {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }
}

/// Shared between the device callback and the capture thread
struct CaptureSink {
    chunk_tx: mpsc::Sender<AudioChunk>,
    analyser: Arc<SpectrumAnalyser>,
    paused: Arc<AtomicBool>,
    pending: Mutex<Vec<i16>>,
    samples_per_chunk: usize,
    opened_at: Instant,
}

impl CaptureSink {
    fn push(&self, data: &[f32], channels: usize) {
        if self.paused.load(Ordering::SeqCst) {
            return;
        }

        let mono = downmix_to_mono(data, channels);
        self.analyser.push_samples(&mono);

        let mut pending = self.pending.lock();
        pending.extend(mono.iter().map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16));

        while pending.len() >= self.samples_per_chunk {
            let rest = pending.split_off(self.samples_per_chunk);
            let full = std::mem::replace(&mut *pending, rest);
            self.send(&full);
        }
    }

    fn flush(&self) {
        let remainder = std::mem::take(&mut *self.pending.lock());
        if !remainder.is_empty() {
            self.send(&remainder);
        }
    }

    fn send(&self, samples: &[i16]) {
        let chunk = AudioChunk {
            data: pcm16_to_bytes(samples),
            timestamp_ms: self.opened_at.elapsed().as_millis() as u64,
        };
        if let Err(e) = self.chunk_tx.try_send(chunk) {
            debug!("Dropping microphone chunk: {}", e);
        }
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> DeviceAccessError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => DeviceAccessError::NoDevice,
        other => DeviceAccessError::PermissionDenied(other.to_string()),
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    format: SampleFormat,
    sink: Arc<CaptureSink>,
) -> Result<cpal::Stream, DeviceAccessError> {
    let channels = config.channels as usize;
    let err_fn = |err| error!("Microphone stream error: {}", err);

    let stream = match format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| sink.push(data, channels),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                sink.push(&floats, channels)
            },
            err_fn,
            None,
        ),
        other => {
            return Err(DeviceAccessError::Backend(format!(
                "unsupported sample format {:?}",
                other
            )))
        }
    };

    stream.map_err(map_build_error)
}

#[async_trait::async_trait]
impl CaptureDeviceAdapter for MicrophoneAdapter {
    async fn open_stream(&self) -> Result<OpenedStream, DeviceAccessError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = std_mpsc::channel::<()>();
        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let analyser = Arc::new(SpectrumAnalyser::new(
            self.config.fft_size,
            self.config.smoothing,
        ));
        let paused = Arc::new(AtomicBool::new(false));
        let chunk_interval_ms = self.config.chunk_interval_ms.max(1);

        let thread_analyser = Arc::clone(&analyser);
        let thread_paused = Arc::clone(&paused);

        let thread = std::thread::Builder::new()
            .name("microphone-capture".to_string())
            .spawn(move || {
                let host = cpal::default_host();
                let Some(device) = host.default_input_device() else {
                    let _ = ready_tx.send(Err(DeviceAccessError::NoDevice));
                    return;
                };

                info!(
                    "Using input device: {}",
                    device.name().unwrap_or_else(|_| "Unknown".to_string())
                );

                let supported = match device.default_input_config() {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(DeviceAccessError::PermissionDenied(
                            e.to_string(),
                        )));
                        return;
                    }
                };
                let format = supported.sample_format();
                let config: StreamConfig = supported.into();
                let sample_rate = config.sample_rate.0;

                let sink = Arc::new(CaptureSink {
                    chunk_tx,
                    analyser: thread_analyser,
                    paused: thread_paused,
                    pending: Mutex::new(Vec::new()),
                    samples_per_chunk: ((sample_rate as u64 * chunk_interval_ms) / 1000).max(1)
                        as usize,
                    opened_at: Instant::now(),
                });

                let stream = match build_stream(&device, &config, format, Arc::clone(&sink)) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(DeviceAccessError::Backend(e.to_string())));
                    return;
                }

                if ready_tx.send(Ok(sample_rate)).is_err() {
                    return;
                }

                // Block until close() or the handle is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
                sink.flush();
                debug!("Microphone capture thread finished");
            })
            .map_err(|e| DeviceAccessError::Backend(e.to_string()))?;

        let sample_rate = ready_rx
            .await
            .map_err(|_| DeviceAccessError::Backend("capture thread exited".to_string()))??;

        info!("Microphone capture started ({}Hz mono)", sample_rate);

        Ok(OpenedStream {
            stream: Box::new(MicrophoneStream {
                analyser,
                paused,
                shutdown: Some(shutdown_tx),
                thread: Some(thread),
            }),
            chunks: chunk_rx,
            encoding: ClipEncoding::Pcm16Le {
                sample_rate,
                channels: 1,
            },
        })
    }

    fn name(&self) -> &str {
        "Microphone (cpal)"
    }
}

struct MicrophoneStream {
    analyser: Arc<SpectrumAnalyser>,
    paused: Arc<AtomicBool>,
    shutdown: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

#[async_trait::async_trait]
impl CaptureStream for MicrophoneStream {
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

        if let Some(thread) = self.thread.take() {
            tokio::task::spawn_blocking(move || thread.join())
                .await?
                .map_err(|_| anyhow!("microphone capture thread panicked"))?;
            info!("Microphone capture stopped");
        }

        Ok(())
    }

    fn is_open(&self) -> bool {
        self.thread.is_some()
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        if self.shutdown.take().is_some() {
            warn!("Microphone stream dropped without close()");
        }
    }
}
