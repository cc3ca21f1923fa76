use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mentormeet::{
    create_router, AppState, CaptureDeviceAdapter, Config, JsonFileStore, MeetingCoordinator,
    MeetingStore, MockTranscriber, SessionRegistry, StudentDetails, Transcriber,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "mentormeet")]
#[command(about = "Mentoring meeting recorder")]
struct Args {
    /// Config file, without extension
    #[arg(short, long, default_value = "config/mentormeet")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,

    /// Record a few meetings on the tone device and hand them off
    Demo {
        /// Recording length in seconds
        #[arg(short, long, default_value = "5")]
        seconds: u64,

        /// Number of concurrent meetings
        #[arg(short = 'n', long, default_value = "2")]
        sessions: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (cfg, load_error) = match Config::load(&args.config) {
        Ok(cfg) => (cfg, None),
        Err(e) => (Config::default(), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.service.log_level)),
        )
        .init();

    if let Some(e) = load_error {
        warn!("Using default configuration: {:#}", e);
    }

    info!("MentorMeet v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let coordinator = Arc::new(build_coordinator(&cfg)?);

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(&cfg, coordinator).await,
        Command::Demo { seconds, sessions } => {
            demo(&cfg, coordinator, Duration::from_secs(seconds), sessions).await
        }
    }
}

#[cfg(feature = "microphone")]
fn capture_adapter(cfg: &Config) -> Arc<dyn CaptureDeviceAdapter> {
    Arc::new(mentormeet::audio::MicrophoneAdapter::new(cfg.capture_config()))
}

#[cfg(not(feature = "microphone"))]
fn capture_adapter(cfg: &Config) -> Arc<dyn CaptureDeviceAdapter> {
    Arc::new(mentormeet::ToneCaptureAdapter::new(cfg.tone_config()))
}

fn build_coordinator(cfg: &Config) -> Result<MeetingCoordinator> {
    let registry = Arc::new(SessionRegistry::new(cfg.recorder.max_concurrent_sessions));
    let store: Arc<dyn MeetingStore> = Arc::new(JsonFileStore::open(cfg.meetings_path())?);
    let transcriber: Arc<dyn Transcriber> = Arc::new(MockTranscriber::new(Duration::from_millis(
        cfg.transcriber.processing_delay_ms,
    )));

    Ok(MeetingCoordinator::new(
        capture_adapter(cfg),
        cfg.recorder.session_config(),
        registry,
        store,
        transcriber,
        Duration::from_secs(cfg.transcriber.upload_timeout_secs),
    ))
}

async fn serve(cfg: &Config, coordinator: Arc<MeetingCoordinator>) -> Result<()> {
    let mentors = Arc::new(cfg.mentor_directory()?);
    info!("👥 {} mentors in directory", mentors.len());
    let app = create_router(AppState::with_mentors(coordinator, mentors));

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("🌐 HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("🛑 Shutting down");
        })
        .await?;

    Ok(())
}

async fn demo(
    cfg: &Config,
    coordinator: Arc<MeetingCoordinator>,
    length: Duration,
    sessions: usize,
) -> Result<()> {
    let output_dir = cfg.recordings_path();
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    info!("🎙️  Recording {} meetings for {:?}", sessions, length);

    let mut opened = Vec::with_capacity(sessions);
    for i in 0..sessions {
        let meeting = coordinator.open_meeting_with(
            &format!("mentor-{}", i + 1),
            &format!("Mentor {}", i + 1),
            &format!("Student {}", i + 1),
            StudentDetails {
                registration_number: Some(format!("REG-{:04}", i + 1)),
                batch_id: Some("BATCH-01".to_string()),
                email: None,
            },
        );
        meeting.session.start().await?;
        opened.push(meeting);
    }

    let mut levels = opened.first().map(|m| m.session.subscribe_state());
    let deadline = tokio::time::Instant::now() + length;
    while tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_secs(1)).await;
        if let Some(state) = levels.as_mut().and_then(|s| s.latest()) {
            info!(
                "  {}s recorded, level {:.0}%",
                state.duration_seconds, state.audio_level
            );
        }
    }

    for meeting in &opened {
        let id = meeting.meeting.id.clone();
        let Some(clip) = meeting.session.stop().await else {
            warn!("Meeting {} produced no clip", id);
            continue;
        };

        let path = output_dir.join(format!("{}.wav", id));
        write_clip(&path, &clip.to_wav()?).await?;
        info!(
            "💾 Saved {} ({} chunks, {} bytes)",
            path.display(),
            clip.chunk_count(),
            clip.size()
        );

        match coordinator.end_meeting(&id).await {
            Ok(record) => info!(
                "📝 Meeting {} stored ({}s)\n{}",
                record.id, record.duration_secs, record.summary
            ),
            Err(e) => warn!("Meeting {} was not handed off: {}", id, e),
        }
    }

    info!("Done, {} meetings stored", coordinator.list_records().await?.len());
    Ok(())
}

async fn write_clip(path: &Path, wav: &[u8]) -> Result<()> {
    tokio::fs::write(path, wav)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
