use super::clip::FinalizedClip;
use super::config::SessionConfig;
use super::state::{LifecycleState, RecordingState, SessionId};
use crate::audio::{
    AudioChunk, CaptureDeviceAdapter, CaptureStream, ClipEncoding, LevelMeter, OpenedStream,
    SpectrumSource,
};
use crate::error::RecorderError;
use crate::telemetry::{Publisher, Subscription};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Internal lifecycle, including the two async suspension points
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Waiting for the device grant
    Starting,
    Recording,
    Paused,
    /// Waiting for the final chunk flush
    Stopping,
    Stopped,
}

impl From<Phase> for LifecycleState {
    fn from(phase: Phase) -> Self {
        match phase {
            Phase::Idle | Phase::Starting => LifecycleState::Idle,
            Phase::Recording => LifecycleState::Recording,
            Phase::Paused => LifecycleState::Paused,
            Phase::Stopping | Phase::Stopped => LifecycleState::Stopped,
        }
    }
}

struct Inner {
    phase: Phase,

    /// Bumped by every reset; work started under an older value is stale
    generation: u64,

    /// Wall-clock start of the current recording cycle
    started_at: Option<DateTime<Utc>>,

    /// Monotonic twin of `started_at`, used for the duration
    started_instant: Option<Instant>,

    /// Chunks captured so far, in capture order
    chunks: Vec<AudioChunk>,

    /// Chunks that arrived while paused, appended on resume or stop
    held: Vec<AudioChunk>,

    encoding: Option<ClipEncoding>,
    stream: Option<Box<dyn CaptureStream>>,
    analyser: Option<Arc<dyn SpectrumSource>>,
    clip: Option<FinalizedClip>,

    pump_task: Option<JoinHandle<()>>,
    timer_task: Option<JoinHandle<()>>,
    meter_task: Option<JoinHandle<()>>,
}

impl Inner {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            started_at: None,
            started_instant: None,
            chunks: Vec::new(),
            held: Vec::new(),
            encoding: None,
            stream: None,
            analyser: None,
            clip: None,
            pump_task: None,
            timer_task: None,
            meter_task: None,
        }
    }

    /// Abort the duration timer and the level meter
    fn cancel_periodic(&mut self) {
        if let Some(task) = self.timer_task.take() {
            task.abort();
        }
        if let Some(task) = self.meter_task.take() {
            task.abort();
        }
    }
}

/// One microphone capture lifecycle: idle → recording ⇄ paused → stopped
///
/// Every operation other than `start()` is total: calling it in a state
/// where it does not apply is a silent no-op.
pub struct RecordingSession {
    id: SessionId,
    config: SessionConfig,
    adapter: Arc<dyn CaptureDeviceAdapter>,
    inner: Arc<Mutex<Inner>>,
    state: Publisher<RecordingState>,
    clip: Publisher<Option<FinalizedClip>>,
}

impl RecordingSession {
    pub fn new(
        id: SessionId,
        adapter: Arc<dyn CaptureDeviceAdapter>,
        config: SessionConfig,
    ) -> Self {
        debug!("Creating recording session: {}", id);

        Self {
            id,
            config,
            adapter,
            inner: Arc::new(Mutex::new(Inner::new())),
            state: Publisher::new(RecordingState::IDLE),
            clip: Publisher::new(None),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn lifecycle(&self) -> LifecycleState {
        self.inner.lock().phase.into()
    }

    /// Latest published telemetry
    pub fn state(&self) -> RecordingState {
        self.state.current()
    }

    /// Finalized clip of the last completed cycle, if any
    pub fn clip(&self) -> Option<FinalizedClip> {
        self.inner.lock().clip.clone()
    }

    /// Clip of a stopped session, or `NoClipAvailable`
    pub fn require_clip(&self) -> Result<FinalizedClip, RecorderError> {
        self.clip().ok_or(RecorderError::NoClipAvailable)
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().started_at
    }

    /// Number of chunks accumulated in the current cycle
    pub fn chunk_count(&self) -> usize {
        let inner = self.inner.lock();
        inner.chunks.len() + inner.held.len()
    }

    /// Telemetry stream; the current state is delivered first
    pub fn subscribe_state(&self) -> Subscription<RecordingState> {
        self.state.subscribe()
    }

    /// Clip stream; the current clip (or `None`) is delivered first
    pub fn subscribe_clip(&self) -> Subscription<Option<FinalizedClip>> {
        self.clip.subscribe()
    }

    /// Begin recording, or resume a paused recording
    ///
    /// From `Idle` this waits for the device. A denied or missing device
    /// leaves the session `Idle` with nothing retained.
    pub async fn start(&self) -> Result<(), RecorderError> {
        let generation = {
            let mut inner = self.inner.lock();
            let phase = inner.phase;
            match phase {
                Phase::Idle => {}
                Phase::Paused => {
                    self.resume_locked(&mut inner);
                    return Ok(());
                }
                Phase::Starting | Phase::Recording => {
                    warn!("Recording already started: {}", self.id);
                    return Ok(());
                }
                Phase::Stopping | Phase::Stopped => {
                    warn!(
                        "Session {} already stopped; reset it before recording again",
                        self.id
                    );
                    return Ok(());
                }
            }
            inner.phase = Phase::Starting;
            inner.generation
        };

        info!(
            "Starting recording session {} on {}",
            self.id,
            self.adapter.name()
        );

        let opened = match self.adapter.open_stream().await {
            Ok(opened) => opened,
            Err(e) => {
                let mut inner = self.inner.lock();
                if inner.generation == generation && inner.phase == Phase::Starting {
                    inner.phase = Phase::Idle;
                }
                error!("Error accessing microphone for session {}: {}", self.id, e);
                return Err(e.into());
            }
        };

        let OpenedStream {
            stream,
            chunks,
            encoding,
        } = opened;
        let mut stream = Some(stream);

        {
            let mut inner = self.inner.lock();
            if inner.generation == generation && inner.phase == Phase::Starting {
                if let Some(stream) = stream.take() {
                    self.begin_locked(&mut inner, stream, chunks, encoding);
                }
            }
        }

        match stream {
            None => {
                info!("Recording session {} started successfully", self.id);
                Ok(())
            }
            Some(mut stale) => {
                warn!(
                    "Session {} was reset while waiting for the device; releasing the grant",
                    self.id
                );
                if let Err(e) = stale.close().await {
                    warn!("Failed to release stale capture stream: {}", e);
                }
                Err(RecorderError::StartSuperseded)
            }
        }
    }

    /// Suspend capture; no-op unless recording
    pub fn pause(&self) {
        let mut inner = self.inner.lock();
        if inner.phase != Phase::Recording {
            debug!("Pause ignored for session {} ({:?})", self.id, inner.phase);
            return;
        }

        if let Some(stream) = inner.stream.as_mut() {
            stream.pause();
        }
        inner.phase = Phase::Paused;
        inner.cancel_periodic();

        let duration_seconds = self.state.current().duration_seconds;
        self.state.publish(RecordingState {
            is_recording: false,
            duration_seconds,
            audio_level: 0.0,
        });

        info!(
            "Paused recording session {} at {}s",
            self.id, duration_seconds
        );
    }

    /// Alias of `start()` on a paused session
    pub async fn resume(&self) -> Result<(), RecorderError> {
        self.start().await
    }

    /// End capture for good and finalize the clip
    ///
    /// Returns the clip produced by this call. Calling it again, or on a
    /// session that never recorded, returns `None` and publishes nothing.
    pub async fn stop(&self) -> Option<FinalizedClip> {
        let (generation, stream, pump) = {
            let mut inner = self.inner.lock();
            let phase = inner.phase;
            match phase {
                Phase::Recording | Phase::Paused => {}
                other => {
                    debug!("Stop ignored for session {} ({:?})", self.id, other);
                    return None;
                }
            }

            inner.phase = Phase::Stopping;
            inner.cancel_periodic();

            let held = std::mem::take(&mut inner.held);
            inner.chunks.extend(held);

            let duration_seconds = self.state.current().duration_seconds;
            self.state.publish(RecordingState {
                is_recording: false,
                duration_seconds,
                audio_level: 0.0,
            });

            (
                inner.generation,
                inner.stream.take(),
                inner.pump_task.take(),
            )
        };

        info!("Stopping recording session: {}", self.id);

        // Closing ends the chunk channel once the device has flushed
        if let Some(mut stream) = stream {
            if let Err(e) = stream.close().await {
                warn!("Failed to close capture stream for {}: {}", self.id, e);
            }
        }

        if let Some(pump) = pump {
            if let Err(e) = pump.await {
                if !e.is_cancelled() {
                    error!("Chunk pump for session {} panicked: {}", self.id, e);
                }
            }
        }

        let mut inner = self.inner.lock();
        if inner.generation != generation || inner.phase != Phase::Stopping {
            info!(
                "Session {} was reset while stopping; discarding recording",
                self.id
            );
            return None;
        }

        let chunks = std::mem::take(&mut inner.chunks);
        let encoding = inner.encoding.clone().unwrap_or(ClipEncoding::Opaque {
            mime_type: "application/octet-stream".to_string(),
        });
        let clip = FinalizedClip::from_chunks(&chunks, encoding);

        inner.analyser = None;
        inner.clip = Some(clip.clone());
        inner.phase = Phase::Stopped;
        self.clip.publish(Some(clip.clone()));

        info!(
            "Recording session {} stopped: {} bytes from {} chunks, {}s",
            self.id,
            clip.size(),
            clip.chunk_count(),
            self.state.current().duration_seconds
        );

        Some(clip)
    }

    /// Discard everything and return to `Idle`
    ///
    /// Releases the capture device if still held. A pending `start()` is
    /// invalidated and will release its grant when it arrives.
    pub async fn reset(&self) {
        let (stream, previous) = {
            let mut inner = self.inner.lock();
            let previous = inner.phase;

            inner.generation += 1;
            inner.phase = Phase::Idle;
            inner.cancel_periodic();
            if let Some(pump) = inner.pump_task.take() {
                pump.abort();
            }

            inner.chunks.clear();
            inner.held.clear();
            inner.encoding = None;
            inner.started_at = None;
            inner.started_instant = None;
            inner.analyser = None;
            inner.clip = None;

            self.state.publish(RecordingState::IDLE);
            self.clip.publish(None);

            (inner.stream.take(), previous)
        };

        if let Some(mut stream) = stream {
            if let Err(e) = stream.close().await {
                warn!("Failed to close capture stream for {}: {}", self.id, e);
            }
        }

        info!("Reset recording session {} (was {:?})", self.id, previous);
    }

    /// Install a freshly granted stream and start the periodic tasks
    fn begin_locked(
        &self,
        inner: &mut Inner,
        stream: Box<dyn CaptureStream>,
        chunks: mpsc::Receiver<AudioChunk>,
        encoding: ClipEncoding,
    ) {
        inner.chunks.clear();
        inner.held.clear();
        inner.clip = None;
        inner.encoding = Some(encoding);
        inner.started_at = Some(Utc::now());
        inner.started_instant = Some(Instant::now());
        inner.analyser = Some(stream.analyser());
        inner.stream = Some(stream);
        inner.phase = Phase::Recording;

        inner.pump_task = Some(tokio::spawn(pump_chunks(
            chunks,
            Arc::clone(&self.inner),
            inner.generation,
        )));

        self.state.publish(RecordingState {
            is_recording: true,
            duration_seconds: 0,
            audio_level: 0.0,
        });

        self.spawn_periodic_locked(inner);
    }

    fn resume_locked(&self, inner: &mut Inner) {
        if let Some(stream) = inner.stream.as_mut() {
            stream.resume();
        }

        let held = std::mem::take(&mut inner.held);
        inner.chunks.extend(held);
        inner.phase = Phase::Recording;

        let duration_seconds = self.state.current().duration_seconds;
        self.state.publish(RecordingState {
            is_recording: true,
            duration_seconds,
            audio_level: 0.0,
        });

        self.spawn_periodic_locked(inner);
        info!(
            "Resumed recording session {} at {}s",
            self.id, duration_seconds
        );
    }

    fn spawn_periodic_locked(&self, inner: &mut Inner) {
        inner.cancel_periodic();

        inner.timer_task = Some(tokio::spawn(run_duration_timer(
            Arc::clone(&self.inner),
            self.state.clone(),
            inner.generation,
            self.config.duration_tick,
        )));

        if let Some(analyser) = inner.analyser.clone() {
            inner.meter_task = Some(tokio::spawn(run_level_meter(
                Arc::clone(&self.inner),
                self.state.clone(),
                inner.generation,
                self.config.level_tick,
                analyser,
            )));
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        let mut inner = self.inner.lock();
        inner.cancel_periodic();
        if let Some(pump) = inner.pump_task.take() {
            pump.abort();
        }
    }
}

/// Move chunks from the capture channel into the session
async fn pump_chunks(
    mut chunk_rx: mpsc::Receiver<AudioChunk>,
    shared: Arc<Mutex<Inner>>,
    generation: u64,
) {
    while let Some(chunk) = chunk_rx.recv().await {
        let mut inner = shared.lock();
        if inner.generation != generation {
            break;
        }

        let phase = inner.phase;
        match phase {
            Phase::Recording | Phase::Stopping => inner.chunks.push(chunk),
            Phase::Paused => inner.held.push(chunk),
            Phase::Idle | Phase::Starting | Phase::Stopped => break,
        }
    }
}

/// Recompute the elapsed duration from the start timestamp
///
/// Derived on every tick rather than incremented, so missed ticks never
/// cause drift.
async fn run_duration_timer(
    shared: Arc<Mutex<Inner>>,
    state: Publisher<RecordingState>,
    generation: u64,
    tick: Duration,
) {
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let inner = shared.lock();
        if inner.generation != generation || inner.phase != Phase::Recording {
            break;
        }
        let Some(started) = inner.started_instant else {
            break;
        };

        let elapsed = started.elapsed().as_secs();
        let current = state.current();
        if elapsed > current.duration_seconds {
            state.publish(RecordingState {
                duration_seconds: elapsed,
                ..current
            });
        }
    }
}

/// Sample the level meter once per display refresh while recording
async fn run_level_meter(
    shared: Arc<Mutex<Inner>>,
    state: Publisher<RecordingState>,
    generation: u64,
    tick: Duration,
    analyser: Arc<dyn SpectrumSource>,
) {
    let mut meter = LevelMeter::for_source(analyser.as_ref());
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        let level = meter.sample(analyser.as_ref());

        let inner = shared.lock();
        if inner.generation != generation || inner.phase != Phase::Recording {
            break;
        }
        state.update(|s| s.audio_level = level);
    }
}
