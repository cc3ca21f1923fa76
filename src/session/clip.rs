use anyhow::{bail, Context, Result};
use std::io::Cursor;
use std::sync::Arc;

use crate::audio::backend::{bytes_to_pcm16, AudioChunk};
use crate::audio::ClipEncoding;

/// The complete audio artifact of one recording cycle
///
/// Immutable once built. Clones share the same bytes, so handing a clip to
/// a consumer gives it a read-only view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalizedClip {
    data: Arc<[u8]>,
    encoding: ClipEncoding,
    chunk_count: usize,
}

impl FinalizedClip {
    /// Concatenate chunks in capture order
    pub fn from_chunks(chunks: &[AudioChunk], encoding: ClipEncoding) -> Self {
        let total: usize = chunks.iter().map(|c| c.data.len()).sum();
        let mut data = Vec::with_capacity(total);
        for chunk in chunks {
            data.extend_from_slice(&chunk.data);
        }

        Self {
            data: data.into(),
            encoding,
            chunk_count: chunks.len(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn encoding(&self) -> &ClipEncoding {
        &self.encoding
    }

    pub fn mime_type(&self) -> String {
        self.encoding.mime_type()
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// Audio length implied by the PCM payload, if the encoding is known
    pub fn audio_seconds(&self) -> Option<f64> {
        match self.encoding {
            ClipEncoding::Pcm16Le {
                sample_rate,
                channels,
            } if sample_rate > 0 && channels > 0 => {
                let samples = self.data.len() / 2;
                Some(samples as f64 / (sample_rate as f64 * channels as f64))
            }
            _ => None,
        }
    }

    /// Wrap the PCM payload in a WAV container
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let (sample_rate, channels) = match self.encoding {
            ClipEncoding::Pcm16Le {
                sample_rate,
                channels,
            } => (sample_rate, channels),
            ClipEncoding::Opaque { ref mime_type } => {
                bail!("Cannot convert {} clip to WAV", mime_type)
            }
        };

        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut buffer = Vec::with_capacity(self.data.len() + 44);
        {
            let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)
                .context("Failed to create WAV writer")?;

            for sample in bytes_to_pcm16(&self.data) {
                writer
                    .write_sample(sample)
                    .context("Failed to write sample to WAV")?;
            }

            writer.finalize().context("Failed to finalize WAV data")?;
        }

        Ok(buffer)
    }
}
