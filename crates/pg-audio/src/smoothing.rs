use pg_core::frame::{RawBandEnergies, SmoothedLevels};

/// Exponential moving average applied independently to the four level signals.
///
/// `smoothed = smoothed * alpha + raw * (1 - alpha)`. Starts from zero.
///
/// # Example
/// ```
/// use pg_audio::smoothing::LevelSmoother;
/// use pg_core::frame::RawBandEnergies;
///
/// let mut smoother = LevelSmoother::new(0.8);
/// let out = smoother.smooth(&RawBandEnergies { bass: 1.0, mid: 0.0, high: 0.0, overall: 0.5 });
/// assert!((out.bass - 0.2).abs() < 1e-12);
/// assert!((out.overall - 0.1).abs() < 1e-12);
/// ```
pub struct LevelSmoother {
    alpha: f64,
    levels: SmoothedLevels,
}

impl LevelSmoother {
    /// Create a new smoother.
    ///
    /// `alpha` is the weight of the previous value, clamped to [0.0, 0.999].
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        let alpha = if alpha.is_finite() {
            alpha.clamp(0.0, 0.999)
        } else {
            0.8
        };
        Self {
            alpha,
            levels: SmoothedLevels::default(),
        }
    }

    /// Fold one frame of raw energies into the running levels.
    pub fn smooth(&mut self, raw: &RawBandEnergies) -> SmoothedLevels {
        self.levels.bass = self.ema(self.levels.bass, raw.bass);
        self.levels.mid = self.ema(self.levels.mid, raw.mid);
        self.levels.high = self.ema(self.levels.high, raw.high);
        self.levels.overall = self.ema(self.levels.overall, raw.overall);
        self.levels
    }

    /// Current levels without updating.
    #[must_use]
    pub fn levels(&self) -> SmoothedLevels {
        self.levels
    }

    /// Smoothing factor in use.
    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Back to zero.
    pub fn reset(&mut self) {
        self.levels = SmoothedLevels::default();
    }

    #[inline(always)]
    fn ema(&self, previous: f64, current: f64) -> f64 {
        previous * self.alpha + current * (1.0 - self.alpha)
    }
}
