use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Les trois bandes de fréquence suivies par le moteur.
///
/// # Example
/// ```
/// use pg_core::band::FrequencyBand;
/// assert_eq!(FrequencyBand::ALL.len(), 3);
/// assert_eq!(FrequencyBand::Mid.default_range().low_hz, 250.0);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrequencyBand {
    /// 20–250 Hz.
    Bass,
    /// 250–4000 Hz.
    Mid,
    /// 4000–20000 Hz.
    High,
}

impl FrequencyBand {
    /// All bands, lowest first.
    pub const ALL: [Self; 3] = [Self::Bass, Self::Mid, Self::High];

    /// Default `(low_hz, high_hz)` range of the band.
    #[must_use]
    pub const fn default_range(self) -> BandRange {
        match self {
            Self::Bass => BandRange::new(20.0, 250.0),
            Self::Mid => BandRange::new(250.0, 4000.0),
            Self::High => BandRange::new(4000.0, 20000.0),
        }
    }

    /// Lowercase name, used in logs and config errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bass => "bass",
            Self::Mid => "mid",
            Self::High => "high",
        }
    }
}

/// Closed frequency interval `[low_hz, high_hz]`.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct BandRange {
    /// Lower edge in Hz (inclusive).
    pub low_hz: f64,
    /// Upper edge in Hz (inclusive).
    pub high_hz: f64,
}

impl BandRange {
    /// Build a range from its two edges.
    #[must_use]
    pub const fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// `true` if `freq` lies within the closed interval.
    #[inline(always)]
    #[must_use]
    pub fn contains(&self, freq: f64) -> bool {
        freq >= self.low_hz && freq <= self.high_hz
    }
}

/// Découpage bass / mid / high utilisé par l'analyseur.
///
/// Les trois plages doivent être contiguës : `bass.high_hz == mid.low_hz`
/// et `mid.high_hz == high.low_hz`.
///
/// # Example
/// ```
/// use pg_core::band::BandLayout;
/// let layout = BandLayout::default();
/// assert!(layout.validate().is_ok());
/// assert_eq!(layout.bass.high_hz, layout.mid.low_hz);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct BandLayout {
    /// Bass range.
    pub bass: BandRange,
    /// Mid range.
    pub mid: BandRange,
    /// High range.
    pub high: BandRange,
}

impl Default for BandLayout {
    fn default() -> Self {
        Self {
            bass: FrequencyBand::Bass.default_range(),
            mid: FrequencyBand::Mid.default_range(),
            high: FrequencyBand::High.default_range(),
        }
    }
}

impl BandLayout {
    /// Range configured for `band`.
    #[must_use]
    pub fn range(&self, band: FrequencyBand) -> BandRange {
        match band {
            FrequencyBand::Bass => self.bass,
            FrequencyBand::Mid => self.mid,
            FrequencyBand::High => self.high,
        }
    }

    /// The three ranges in band order, for direct iteration.
    #[must_use]
    pub fn ranges(&self) -> [BandRange; 3] {
        [self.bass, self.mid, self.high]
    }

    /// Check that every range is well-formed and the layout has no gap or overlap.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] for an inverted or negative range and
    /// [`CoreError::NonContiguousBands`] when adjacent bands do not touch.
    pub fn validate(&self) -> Result<(), CoreError> {
        for band in FrequencyBand::ALL {
            let r = self.range(band);
            if !(r.low_hz.is_finite() && r.high_hz.is_finite()) || r.low_hz < 0.0 {
                return Err(CoreError::Config(format!(
                    "bande {} : bornes invalides ({}, {})",
                    band.name(),
                    r.low_hz,
                    r.high_hz
                )));
            }
            if r.low_hz >= r.high_hz {
                return Err(CoreError::Config(format!(
                    "bande {} : low_hz ({}) doit être < high_hz ({})",
                    band.name(),
                    r.low_hz,
                    r.high_hz
                )));
            }
        }

        for pair in FrequencyBand::ALL.windows(2) {
            let (lower, upper) = (pair[0], pair[1]);
            let (lo, up) = (self.range(lower), self.range(upper));
            #[allow(clippy::float_cmp)]
            if lo.high_hz != up.low_hz {
                return Err(CoreError::NonContiguousBands {
                    lower: lower.name(),
                    lower_high: lo.high_hz,
                    upper: upper.name(),
                    upper_low: up.low_hz,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::float_cmp)]
    fn default_bands_are_contiguous() {
        let layout = BandLayout::default();
        assert_eq!(layout.bass.high_hz, layout.mid.low_hz);
        assert_eq!(layout.mid.high_hz, layout.high.low_hz);
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn default_ranges_match_band_enum() {
        let layout = BandLayout::default();
        for band in FrequencyBand::ALL {
            assert_eq!(layout.range(band), band.default_range());
        }
    }

    #[test]
    fn gap_between_bands_is_rejected() {
        let layout = BandLayout {
            mid: BandRange::new(300.0, 4000.0),
            ..BandLayout::default()
        };
        assert!(matches!(
            layout.validate(),
            Err(CoreError::NonContiguousBands { lower: "bass", upper: "mid", .. })
        ));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let layout = BandLayout {
            high: BandRange::new(4000.0, 3000.0),
            ..BandLayout::default()
        };
        assert!(matches!(layout.validate(), Err(CoreError::Config(_))));
    }

    #[test]
    fn range_edges_are_inclusive() {
        let r = BandRange::new(20.0, 250.0);
        assert!(r.contains(20.0));
        assert!(r.contains(250.0));
        assert!(!r.contains(250.1));
        assert!(!r.contains(19.9));
    }
}
