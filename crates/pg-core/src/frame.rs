use crate::config::Normalization;

/// Bloc d'échantillons mono capturé par le callback audio.
///
/// Immuable une fois créé. Déplacé (jamais copié) du callback vers le worker,
/// puis rendu au pool pour réutilisation de son buffer.
///
/// # Example
/// ```
/// use pg_core::frame::AudioFrame;
/// let frame = AudioFrame::new(vec![0.0; 1024], 44100, 0);
/// assert_eq!(frame.len(), 1024);
/// assert_eq!(frame.sample_rate(), 44100);
/// ```
#[derive(Clone, Debug)]
pub struct AudioFrame {
    samples: Vec<f32>,
    sample_rate: u32,
    sequence: u64,
}

impl AudioFrame {
    /// Wrap a filled sample buffer.
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate: u32, sequence: u64) -> Self {
        Self {
            samples,
            sample_rate,
            sequence,
        }
    }

    /// Mono samples, normalized [-1, 1].
    #[inline]
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate the frame was captured at.
    #[inline]
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Arrival order. Gaps mean frames were dropped upstream.
    #[inline]
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of samples.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` if the frame holds no samples.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Give the buffer back so it can be recycled.
    #[must_use]
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Énergies brutes d'une frame analysée (moyenne des magnitudes FFT).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RawBandEnergies {
    /// Mean magnitude over the bass range.
    pub bass: f64,
    /// Mean magnitude over the mid range.
    pub mid: f64,
    /// Mean magnitude over the high range.
    pub high: f64,
    /// Mean magnitude over the whole spectrum.
    pub overall: f64,
}

/// Niveaux lissés, possédés exclusivement par le worker d'analyse.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SmoothedLevels {
    /// Smoothed bass energy.
    pub bass: f64,
    /// Smoothed mid energy.
    pub mid: f64,
    /// Smoothed high energy.
    pub high: f64,
    /// Smoothed overall loudness.
    pub overall: f64,
}

/// Valeurs publiées pour le consommateur (boucle de rendu).
///
/// Écrit par le worker audio, lu par n'importe quel thread.
/// Taille fixe, `Copy`, remplacé en bloc à chaque frame traitée.
///
/// # Example
/// ```
/// use pg_core::frame::FeatureSnapshot;
/// let s = FeatureSnapshot::default();
/// assert_eq!(s.bass_level, 0.0);
/// assert!(!s.beat_detected);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FeatureSnapshot {
    /// Bass level [0.0, 1.0].
    pub bass_level: f64,
    /// Mid level [0.0, 1.0].
    pub mid_level: f64,
    /// High level [0.0, 1.0].
    pub high_level: f64,
    /// Overall volume [0.0, 1.0].
    pub overall_volume: f64,
    /// True for the single snapshot published right after a beat.
    pub beat_detected: bool,
}

impl FeatureSnapshot {
    /// Scale smoothed levels into [0, 1] with the per-band multipliers.
    ///
    /// # Example
    /// ```
    /// use pg_core::config::Normalization;
    /// use pg_core::frame::{FeatureSnapshot, SmoothedLevels};
    ///
    /// let levels = SmoothedLevels { bass: 0.005, mid: 0.1, high: 0.0, overall: 0.01 };
    /// let s = FeatureSnapshot::from_levels(&levels, true, &Normalization::default());
    /// assert!((s.bass_level - 0.5).abs() < 1e-9);
    /// assert_eq!(s.mid_level, 1.0);
    /// assert!(s.beat_detected);
    /// ```
    #[must_use]
    pub fn from_levels(levels: &SmoothedLevels, beat_detected: bool, norm: &Normalization) -> Self {
        Self {
            bass_level: scale_unit(levels.bass, norm.bass),
            mid_level: scale_unit(levels.mid, norm.mid),
            high_level: scale_unit(levels.high, norm.high),
            overall_volume: scale_unit(levels.overall, norm.overall),
            beat_detected,
        }
    }

    /// `true` if every level is within [0, 1].
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        [
            self.bass_level,
            self.mid_level,
            self.high_level,
            self.overall_volume,
        ]
        .iter()
        .all(|v| (0.0..=1.0).contains(v))
    }
}

/// `value * gain` clamped to [0, 1]; non-finite results collapse to 0.
#[inline(always)]
fn scale_unit(value: f64, gain: f64) -> f64 {
    let scaled = value * gain;
    if scaled.is_finite() {
        scaled.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
