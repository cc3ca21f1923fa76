use super::analyser::SpectrumSource;

/// Highest value a spectrum bin can report
const MAX_BIN_VALUE: f32 = 255.0;

/// Loudness meter sampled once per display refresh
///
/// Reads the byte spectrum of the live stream, averages it and scales the
/// result onto [0, 100].
pub struct LevelMeter {
    bins: Vec<u8>,
}

impl LevelMeter {
    pub fn new(bin_count: usize) -> Self {
        Self {
            bins: vec![0; bin_count],
        }
    }

    pub fn for_source(source: &dyn SpectrumSource) -> Self {
        Self::new(source.bin_count())
    }

    /// Take one reading from the source
    pub fn sample(&mut self, source: &dyn SpectrumSource) -> f32 {
        let bin_count = source.bin_count();
        if self.bins.len() != bin_count {
            self.bins.resize(bin_count, 0);
        }

        source.byte_frequency_data(&mut self.bins);
        normalized_level(&self.bins)
    }
}

/// Mean bin value scaled to [0, 100]; an empty spectrum reads as silence
pub fn normalized_level(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }

    let sum: u64 = bins.iter().map(|&b| b as u64).sum();
    let average = sum as f32 / bins.len() as f32;
    ((average / MAX_BIN_VALUE) * 100.0).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSpectrum(Vec<u8>);

    impl SpectrumSource for FixedSpectrum {
        fn bin_count(&self) -> usize {
            self.0.len()
        }

        fn byte_frequency_data(&self, out: &mut [u8]) {
            let n = out.len().min(self.0.len());
            out[..n].copy_from_slice(&self.0[..n]);
        }
    }

    #[test]
    fn test_empty_spectrum_is_silent() {
        assert_eq!(normalized_level(&[]), 0.0);
    }

    #[test]
    fn test_full_scale_is_100() {
        assert_eq!(normalized_level(&[255; 128]), 100.0);
    }

    #[test]
    fn test_average_is_scaled() {
        // mean = 127.5 → 50%
        let level = normalized_level(&[0, 255]);
        assert!((level - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_level_always_in_range() {
        for value in [0u8, 1, 64, 128, 200, 254, 255] {
            let level = normalized_level(&vec![value; 1024]);
            assert!((0.0..=100.0).contains(&level), "{} out of range", level);
        }
    }

    #[test]
    fn test_meter_follows_source_bin_count() {
        let mut meter = LevelMeter::new(4);
        let source = FixedSpectrum(vec![255; 16]);

        assert_eq!(meter.sample(&source), 100.0);
        assert_eq!(meter.bins.len(), 16);
    }

    #[test]
    fn test_meter_for_source() {
        let source = FixedSpectrum(vec![0; 8]);
        let mut meter = LevelMeter::for_source(&source);
        assert_eq!(meter.sample(&source), 0.0);
    }
}
