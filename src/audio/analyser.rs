// Frequency-domain analysis of a live capture stream
//
// Mirrors the behaviour of a browser analyser node: the most recent
// `fft_size` samples are windowed (Blackman), transformed, smoothed over
// time and mapped from [-100 dB, -30 dB] onto byte values [0, 255].

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::f32::consts::PI;

/// Lower end of the decibel range mapped to byte 0
pub const MIN_DECIBELS: f32 = -100.0;
/// Upper end of the decibel range mapped to byte 255
pub const MAX_DECIBELS: f32 = -30.0;

/// Largest analysis window; the transform is quadratic in its size
pub const MAX_FFT_SIZE: usize = 2048;

/// Anything that can report the current byte spectrum of a signal
pub trait SpectrumSource: Send + Sync {
    /// Number of frequency bins (half the analysis window)
    fn bin_count(&self) -> usize;

    /// Fill `out` with the current spectrum, one byte per bin
    ///
    /// Writes `min(out.len(), bin_count())` values.
    fn byte_frequency_data(&self, out: &mut [u8]);
}

struct AnalyserState {
    samples: VecDeque<f32>,
    smoothed: Vec<f32>,
}

/// DFT-based analyser fed by a capture stream
pub struct SpectrumAnalyser {
    fft_size: usize,
    smoothing: f32,
    window: Vec<f32>,
    cos_table: Vec<f32>,
    sin_table: Vec<f32>,
    state: Mutex<AnalyserState>,
}

impl SpectrumAnalyser {
    /// `fft_size` is rounded up to a power of two in [32, `MAX_FFT_SIZE`]
    ///
    /// Every read runs a direct DFT, O(n²) in `fft_size`.
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        let fft_size = fft_size.clamp(32, MAX_FFT_SIZE).next_power_of_two();
        let n = fft_size as f32;

        let window = (0..fft_size)
            .map(|i| {
                let x = i as f32 / n;
                0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos()
            })
            .collect();
        let cos_table = (0..fft_size)
            .map(|i| (2.0 * PI * i as f32 / n).cos())
            .collect();
        let sin_table = (0..fft_size)
            .map(|i| (2.0 * PI * i as f32 / n).sin())
            .collect();

        Self {
            fft_size,
            smoothing: smoothing.clamp(0.0, 1.0),
            window,
            cos_table,
            sin_table,
            state: Mutex::new(AnalyserState {
                samples: VecDeque::with_capacity(fft_size),
                smoothed: vec![0.0; fft_size / 2],
            }),
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Append mono samples in [-1.0, 1.0]
    pub fn push_samples(&self, samples: &[f32]) {
        let mut state = self.state.lock();
        let skip = samples.len().saturating_sub(self.fft_size);
        for &s in &samples[skip..] {
            if state.samples.len() == self.fft_size {
                state.samples.pop_front();
            }
            state.samples.push_back(s.clamp(-1.0, 1.0));
        }
    }

    pub fn push_pcm16(&self, samples: &[i16]) {
        let floats: Vec<f32> = samples.iter().map(|&s| s as f32 / 32768.0).collect();
        self.push_samples(&floats);
    }

    /// Forget the retained signal and smoothing history
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.samples.clear();
        state.smoothed.iter_mut().for_each(|v| *v = 0.0);
    }

    fn magnitudes(&self, samples: &VecDeque<f32>) -> Vec<f32> {
        let n = self.fft_size;
        // Oldest samples first, zero-padded at the front when short
        let pad = n - samples.len();
        let frame: Vec<f32> = (0..n)
            .map(|i| {
                if i < pad {
                    0.0
                } else {
                    samples[i - pad] * self.window[i]
                }
            })
            .collect();

        (0..n / 2)
            .map(|k| {
                let mut re = 0.0f32;
                let mut im = 0.0f32;
                for (i, &x) in frame.iter().enumerate() {
                    let idx = (k * i) % n;
                    re += x * self.cos_table[idx];
                    im -= x * self.sin_table[idx];
                }
                (re * re + im * im).sqrt() / n as f32
            })
            .collect()
    }
}

impl SpectrumSource for SpectrumAnalyser {
    fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    fn byte_frequency_data(&self, out: &mut [u8]) {
        let mut state = self.state.lock();
        let magnitudes = self.magnitudes(&state.samples);

        let range = MAX_DECIBELS - MIN_DECIBELS;
        let tau = self.smoothing;
        for (k, magnitude) in magnitudes.into_iter().enumerate() {
            let smoothed = tau * state.smoothed[k] + (1.0 - tau) * magnitude;
            state.smoothed[k] = smoothed;

            if let Some(slot) = out.get_mut(k) {
                let db = if smoothed > 0.0 {
                    20.0 * smoothed.log10()
                } else {
                    f32::NEG_INFINITY
                };
                let scaled = 255.0 * (db - MIN_DECIBELS) / range;
                *slot = if scaled.is_finite() {
                    scaled.clamp(0.0, 255.0) as u8
                } else {
                    0
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: f32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate).sin())
            .collect()
    }

    #[test]
    fn test_fft_size_rounded_to_power_of_two() {
        assert_eq!(SpectrumAnalyser::new(200, 0.8).fft_size(), 256);
        assert_eq!(SpectrumAnalyser::new(1, 0.8).fft_size(), 32);
        assert_eq!(SpectrumAnalyser::new(256, 0.8).bin_count(), 128);
    }

    #[test]
    fn test_fft_size_capped() {
        assert_eq!(SpectrumAnalyser::new(1 << 20, 0.8).fft_size(), MAX_FFT_SIZE);
        assert_eq!(SpectrumAnalyser::new(2000, 0.8).fft_size(), MAX_FFT_SIZE);
        assert_eq!(SpectrumAnalyser::new(MAX_FFT_SIZE, 0.8).bin_count(), 1024);
    }

    #[test]
    fn test_silence_reads_zero() {
        let analyser = SpectrumAnalyser::new(256, 0.0);
        analyser.push_samples(&[0.0; 256]);

        let mut bins = vec![0xFFu8; analyser.bin_count()];
        analyser.byte_frequency_data(&mut bins);
        assert!(bins.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tone_peaks_at_its_bin() {
        // 16 kHz / 256 = 62.5 Hz per bin; 1000 Hz lands on bin 16.
        // Quiet enough that the main lobe stays below the 255 ceiling.
        let analyser = SpectrumAnalyser::new(256, 0.0);
        analyser.push_samples(&sine(1000.0, 16000.0, 256, 0.05));

        let mut bins = vec![0u8; analyser.bin_count()];
        analyser.byte_frequency_data(&mut bins);

        let peak = bins
            .iter()
            .enumerate()
            .max_by_key(|&(_, &b)| b)
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 16);
        assert!(bins[16] > 200);
    }

    #[test]
    fn test_smoothing_decays_gradually() {
        let analyser = SpectrumAnalyser::new(256, 0.8);
        analyser.push_samples(&sine(1000.0, 16000.0, 256, 0.05));

        let mut loud = vec![0u8; analyser.bin_count()];
        for _ in 0..20 {
            analyser.byte_frequency_data(&mut loud);
        }

        analyser.push_samples(&[0.0; 256]);
        let mut after = vec![0u8; analyser.bin_count()];
        analyser.byte_frequency_data(&mut after);

        assert!(after[16] > 0, "smoothing should retain some energy");
        assert!(after[16] < loud[16]);
    }

    #[test]
    fn test_short_output_buffer() {
        let analyser = SpectrumAnalyser::new(64, 0.0);
        analyser.push_samples(&sine(2000.0, 16000.0, 64, 0.5));

        let mut bins = vec![0u8; 4];
        analyser.byte_frequency_data(&mut bins);
        assert_eq!(bins.len(), 4);
    }

    #[test]
    fn test_clear_resets_signal() {
        let analyser = SpectrumAnalyser::new(256, 0.5);
        analyser.push_pcm16(&[i16::MAX; 256]);
        analyser.clear();

        let mut bins = vec![0u8; analyser.bin_count()];
        analyser.byte_frequency_data(&mut bins);
        assert!(bins.iter().all(|&b| b == 0));
    }
}
