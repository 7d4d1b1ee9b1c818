use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

/// FFT pipeline: real forward FFT using realfft, rectangular window.
///
/// Pre-allocates the FFT plan and scratch buffers for zero-allocation hot path.
/// Re-plans only when the input length changes.
///
/// # Example
/// ```
/// use pg_audio::fft::FftPipeline;
/// let fft = FftPipeline::new(1024);
/// assert_eq!(fft.bins(), 513);
/// ```
pub struct FftPipeline {
    planner: RealFftPlanner<f32>,
    plan: Arc<dyn RealToComplex<f32>>,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f64>,
}

impl FftPipeline {
    /// Create a new FFT pipeline with the given window size.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    #[must_use]
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "FFT size must be > 0");

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();
        let magnitudes = vec![0.0; spectrum_buf.len()];

        Self {
            planner,
            plan,
            input_buf,
            spectrum_buf,
            scratch,
            magnitudes,
        }
    }

    /// Current FFT length.
    #[must_use]
    pub fn fft_size(&self) -> usize {
        self.input_buf.len()
    }

    /// Spectrum length, `fft_size / 2 + 1`.
    #[must_use]
    pub fn bins(&self) -> usize {
        self.spectrum_buf.len()
    }

    /// Process `samples` through the FFT.
    ///
    /// Returns the magnitude spectrum `|X[k]|` (N/2+1 bins), unnormalized.
    /// An empty input yields an empty spectrum.
    ///
    /// # Example
    /// ```
    /// use pg_audio::fft::FftPipeline;
    /// let mut fft = FftPipeline::new(256);
    /// let samples = vec![1.0f32; 256];
    /// let spectrum = fft.process(&samples);
    /// assert_eq!(spectrum.len(), 129); // N/2 + 1
    /// assert!((spectrum[0] - 256.0).abs() < 1e-3); // DC bin = sum of samples
    /// ```
    pub fn process(&mut self, samples: &[f32]) -> &[f64] {
        if samples.is_empty() {
            return &[];
        }
        if samples.len() != self.fft_size() {
            self.replan(samples.len());
        }

        self.input_buf.copy_from_slice(samples);

        // Forward FFT
        if self
            .plan
            .process_with_scratch(
                &mut self.input_buf,
                &mut self.spectrum_buf,
                &mut self.scratch,
            )
            .is_err()
        {
            self.magnitudes.fill(0.0);
            return &self.magnitudes;
        }

        // Magnitude
        for (mag, c) in self.magnitudes.iter_mut().zip(&self.spectrum_buf) {
            let (re, im) = (f64::from(c.re), f64::from(c.im));
            *mag = (re * re + im * im).sqrt();
        }
        &self.magnitudes
    }

    fn replan(&mut self, size: usize) {
        log::debug!("FFT re-plan: {} → {size}", self.fft_size());
        self.plan = self.planner.plan_fft_forward(size);
        self.input_buf = self.plan.make_input_vec();
        self.spectrum_buf = self.plan.make_output_vec();
        self.scratch = self.plan.make_scratch_vec();
        self.magnitudes = vec![0.0; self.spectrum_buf.len()];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_has_flat_zero_spectrum() {
        let mut fft = FftPipeline::new(512);
        let spectrum = fft.process(&[0.0; 512]);
        assert_eq!(spectrum.len(), 257);
        assert!(spectrum.iter().all(|&m| m.abs() < 1e-9));
    }

    #[test]
    fn on_bin_sine_peaks_at_its_bin() {
        let n = 1024;
        let k = 32;
        let samples: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * k as f32 * i as f32 / n as f32).sin())
            .collect();
        let mut fft = FftPipeline::new(n);
        let spectrum = fft.process(&samples);
        let (peak_bin, peak) = spectrum
            .iter()
            .enumerate()
            .fold((0, 0.0f64), |acc, (i, &m)| if m > acc.1 { (i, m) } else { acc });
        assert_eq!(peak_bin, k);
        // |X[k]| = N/2 for a unit sine exactly on a bin
        assert!((peak - n as f64 / 2.0).abs() < 1.0);
    }

    #[test]
    fn length_change_replans() {
        let mut fft = FftPipeline::new(256);
        assert_eq!(fft.process(&[0.0; 128]).len(), 65);
        assert_eq!(fft.fft_size(), 128);
        assert_eq!(fft.process(&[0.0; 256]).len(), 129);
    }

    #[test]
    fn empty_input_gives_empty_spectrum() {
        let mut fft = FftPipeline::new(64);
        assert!(fft.process(&[]).is_empty());
    }
}
