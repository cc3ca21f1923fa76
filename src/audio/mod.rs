pub mod analyser;
pub mod backend;
pub mod level;
pub mod tone;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use analyser::{SpectrumAnalyser, SpectrumSource};
pub use backend::{
    AudioChunk, CaptureConfig, CaptureDeviceAdapter, CaptureStream, ClipEncoding, OpenedStream,
};
pub use level::{normalized_level, LevelMeter};
pub use tone::{DeviceAccess, ToneCaptureAdapter, ToneConfig};

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneAdapter;
