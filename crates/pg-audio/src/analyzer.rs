use pg_core::band::{BandLayout, BandRange};
use pg_core::frame::{AudioFrame, RawBandEnergies};

use crate::error::AnalysisError;
use crate::fft::FftPipeline;

/// Turns one [`AudioFrame`] into [`RawBandEnergies`].
///
/// The result depends only on the frame and its sample rate; the FFT plan and
/// buffers held here are scratch space, not state.
///
/// # Example
/// ```
/// use pg_audio::analyzer::SpectralAnalyzer;
/// use pg_core::band::BandLayout;
/// use pg_core::frame::AudioFrame;
///
/// let mut analyzer = SpectralAnalyzer::new(1024, BandLayout::default());
/// let energies = analyzer.analyze(&AudioFrame::new(vec![0.0; 1024], 44100, 0)).unwrap();
/// assert_eq!(energies.overall, 0.0);
/// ```
pub struct SpectralAnalyzer {
    fft: FftPipeline,
    bands: [BandRange; 3],
}

impl SpectralAnalyzer {
    /// Create an analyzer pre-planned for `chunk_size` samples.
    #[must_use]
    pub fn new(chunk_size: usize, layout: BandLayout) -> Self {
        Self {
            fft: FftPipeline::new(chunk_size.max(1)),
            bands: layout.ranges(),
        }
    }

    /// Compute band energies and overall loudness for `frame`.
    ///
    /// # Errors
    /// Rejects empty frames, a zero sample rate, and non-finite samples.
    pub fn analyze(&mut self, frame: &AudioFrame) -> Result<RawBandEnergies, AnalysisError> {
        let samples = frame.samples();
        if samples.is_empty() {
            return Err(AnalysisError::EmptyFrame);
        }
        if frame.sample_rate() == 0 {
            return Err(AnalysisError::ZeroSampleRate);
        }
        if let Some((index, &value)) = samples.iter().enumerate().find(|(_, s)| !s.is_finite()) {
            return Err(AnalysisError::NonFiniteSample { index, value });
        }

        let spectrum = self.fft.process(samples);
        Ok(band_energies(
            spectrum,
            frame.sample_rate(),
            samples.len(),
            &self.bands,
        ))
    }
}

/// Mean magnitude per band plus the mean over the whole spectrum.
///
/// Bin `k` sits at `k * sample_rate / fft_size` Hz. A band with no bin inside
/// its closed range has zero energy.
#[must_use]
pub fn band_energies(
    spectrum: &[f64],
    sample_rate: u32,
    fft_size: usize,
    bands: &[BandRange; 3],
) -> RawBandEnergies {
    if spectrum.is_empty() || fft_size == 0 {
        return RawBandEnergies::default();
    }
    let bin_hz = f64::from(sample_rate) / fft_size as f64;

    let [bass, mid, high] = bands.map(|range| band_mean(spectrum, bin_hz, range));
    let overall = spectrum.iter().sum::<f64>() / spectrum.len() as f64;

    RawBandEnergies {
        bass,
        mid,
        high,
        overall,
    }
}

/// Compute the mean magnitude of the bins inside `range`.
fn band_mean(spectrum: &[f64], bin_hz: f64, range: BandRange) -> f64 {
    let (sum, count) = spectrum
        .iter()
        .enumerate()
        .filter(|&(k, _)| range.contains(k as f64 * bin_hz))
        .fold((0.0, 0usize), |(sum, count), (_, &mag)| (sum + mag, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}
