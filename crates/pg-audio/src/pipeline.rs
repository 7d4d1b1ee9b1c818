use pg_core::config::{EngineConfig, Normalization};
use pg_core::frame::{AudioFrame, FeatureSnapshot, RawBandEnergies};

use crate::analyzer::SpectralAnalyzer;
use crate::beat::BeatDetector;
use crate::error::AnalysisError;
use crate::smoothing::LevelSmoother;

/// Chaîne de traitement d'une frame : FFT → bandes → lissage → beat → snapshot.
///
/// Owned by the analysis worker for one running session; a fresh pipeline
/// starts from zeroed levels, empty history and no cooldown.
///
/// # Example
/// ```
/// use pg_audio::pipeline::FramePipeline;
/// use pg_core::config::EngineConfig;
/// use pg_core::frame::{AudioFrame, FeatureSnapshot};
///
/// let mut pipeline = FramePipeline::new(&EngineConfig::default());
/// let snap = pipeline.process(&AudioFrame::new(vec![0.0; 1024], 44100, 0)).unwrap();
/// assert_eq!(snap, FeatureSnapshot::default());
/// ```
pub struct FramePipeline {
    analyzer: SpectralAnalyzer,
    smoother: LevelSmoother,
    beat: BeatDetector,
    normalization: Normalization,
    last_raw: RawBandEnergies,
}

impl FramePipeline {
    /// Build a pipeline from the engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            analyzer: SpectralAnalyzer::new(config.chunk_size, config.bands),
            smoother: LevelSmoother::new(config.smoothing_factor),
            beat: BeatDetector::new(config.beat),
            normalization: config.normalization,
            last_raw: RawBandEnergies::default(),
        }
    }

    /// Run one frame through the chain and build the snapshot to publish.
    ///
    /// Beat detection sees the raw loudness; smoothing would blunt the transient.
    ///
    /// # Errors
    /// Forwards [`AnalysisError`] for malformed frames; state is left untouched.
    pub fn process(&mut self, frame: &AudioFrame) -> Result<FeatureSnapshot, AnalysisError> {
        let raw = self.analyzer.analyze(frame)?;
        let levels = self.smoother.smooth(&raw);
        let beat = self.beat.process(raw.overall);
        self.last_raw = raw;
        Ok(FeatureSnapshot::from_levels(
            &levels,
            beat,
            &self.normalization,
        ))
    }

    /// Raw energies of the last successfully processed frame.
    #[must_use]
    pub fn last_raw(&self) -> RawBandEnergies {
        self.last_raw
    }

    /// Beat detector, for inspection.
    #[must_use]
    pub fn beat(&self) -> &BeatDetector {
        &self.beat
    }
}
