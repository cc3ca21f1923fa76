// Scripted capture device for integration tests
//
// Chunks are pushed by the test instead of being generated on a timer, so
// the contents of a finalized clip are known exactly.

#![allow(dead_code)]

use anyhow::Result;
use mentormeet::audio::{
    AudioChunk, CaptureDeviceAdapter, CaptureStream, ClipEncoding, DeviceAccess, OpenedStream,
    SpectrumAnalyser, SpectrumSource,
};
use mentormeet::DeviceAccessError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub const SAMPLE_RATE: u32 = 16000;

struct StreamShared {
    sender: Mutex<Option<mpsc::Sender<AudioChunk>>>,
    paused: AtomicBool,
    analyser: Arc<SpectrumAnalyser>,
}

pub struct ScriptedAdapter {
    access: Mutex<DeviceAccess>,
    grant_delay: Mutex<Duration>,
    current: Mutex<Option<Arc<StreamShared>>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    next_timestamp: AtomicUsize,
}

impl ScriptedAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            access: Mutex::new(DeviceAccess::Granted),
            grant_delay: Mutex::new(Duration::ZERO),
            current: Mutex::new(None),
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
            next_timestamp: AtomicUsize::new(0),
        })
    }

    pub fn set_access(&self, access: DeviceAccess) {
        *self.access.lock() = access;
    }

    pub fn set_grant_delay(&self, delay: Duration) {
        *self.grant_delay.lock() = delay;
    }

    /// Emit a chunk on the most recently opened stream
    ///
    /// Returns false when there is no open stream or it is paused, in which
    /// case the chunk is dropped like a device that stopped emitting.
    pub fn push(&self, data: &[u8]) -> bool {
        self.emit(data, false)
    }

    /// Emit a chunk even while paused, like a device flushing buffered audio
    pub fn flush(&self, data: &[u8]) -> bool {
        self.emit(data, true)
    }

    fn emit(&self, data: &[u8], ignore_pause: bool) -> bool {
        let Some(shared) = self.current.lock().clone() else {
            return false;
        };
        if !ignore_pause && shared.paused.load(Ordering::SeqCst) {
            return false;
        }

        let samples: Vec<i16> = data.iter().map(|&b| (b as i16 - 128) * 64).collect();
        shared.analyser.push_pcm16(&samples);

        let sender = shared.sender.lock();
        match sender.as_ref() {
            Some(tx) => {
                let timestamp_ms = self.next_timestamp.fetch_add(100, Ordering::SeqCst) as u64;
                tx.try_send(AudioChunk {
                    data: data.to_vec(),
                    timestamp_ms,
                })
                .is_ok()
            }
            None => false,
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptureDeviceAdapter for ScriptedAdapter {
    async fn open_stream(&self) -> Result<OpenedStream, DeviceAccessError> {
        let delay = *self.grant_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let access = *self.access.lock();
        match access {
            DeviceAccess::Granted => {}
            DeviceAccess::Denied => {
                return Err(DeviceAccessError::PermissionDenied(
                    "denied by test".to_string(),
                ))
            }
            DeviceAccess::NoDevice => return Err(DeviceAccessError::NoDevice),
        }

        let (tx, rx) = mpsc::channel(256);
        let shared = Arc::new(StreamShared {
            sender: Mutex::new(Some(tx)),
            paused: AtomicBool::new(false),
            analyser: Arc::new(SpectrumAnalyser::new(256, 0.8)),
        });

        *self.current.lock() = Some(Arc::clone(&shared));
        self.opened.fetch_add(1, Ordering::SeqCst);

        Ok(OpenedStream {
            stream: Box::new(ScriptedStream {
                shared,
                closed: Arc::clone(&self.closed),
            }),
            chunks: rx,
            encoding: ClipEncoding::Pcm16Le {
                sample_rate: SAMPLE_RATE,
                channels: 1,
            },
        })
    }

    fn name(&self) -> &str {
        "Scripted test device"
    }
}

struct ScriptedStream {
    shared: Arc<StreamShared>,
    closed: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl CaptureStream for ScriptedStream {
    fn analyser(&self) -> Arc<dyn SpectrumSource> {
        self.shared.analyser.clone()
    }

    fn pause(&mut self) {
        self.shared.paused.store(true, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.shared.paused.store(false, Ordering::SeqCst);
    }

    async fn close(&mut self) -> Result<()> {
        if self.shared.sender.lock().take().is_some() {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.shared.sender.lock().is_some()
    }
}

/// Let spawned session tasks catch up
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
