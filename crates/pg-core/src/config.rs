use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::band::{BandLayout, BandRange};
use crate::error::CoreError;

/// Configuration complète du moteur audio, fixée à la construction.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use pg_core::config::EngineConfig;
/// let config = EngineConfig::default();
/// assert_eq!(config.sample_rate, 44100);
/// assert_eq!(config.chunk_size, 1024);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    // === Capture ===
    /// Fréquence d'échantillonnage demandée au périphérique.
    pub sample_rate: u32,
    /// Taille d'une frame d'analyse en échantillons (pair).
    pub chunk_size: usize,
    /// Capacité de la file callback → worker, en frames.
    pub channel_capacity: usize,
    /// Timeout de réception du worker, en millisecondes.
    pub recv_timeout_ms: u64,
    /// Délai maximal d'ouverture du backend par `start()`, en millisecondes.
    pub open_timeout_ms: u64,

    // === Analyse ===
    /// Plages bass / mid / high.
    pub bands: BandLayout,
    /// Poids de la valeur précédente dans la moyenne exponentielle [0.0, 1.0).
    pub smoothing_factor: f64,
    /// Détection de beats.
    pub beat: BeatConfig,
    /// Multiplicateurs de normalisation vers [0, 1].
    pub normalization: Normalization,
}

/// Beat detector tuning.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct BeatConfig {
    /// A beat fires when loudness exceeds `trailing_avg * threshold`.
    pub threshold: f64,
    /// Loudness history length, in frames.
    pub history_len: usize,
    /// Minimum history before any detection.
    pub min_history: usize,
    /// Most recent samples left out of the trailing average.
    pub exclude_recent: usize,
    /// Frames suppressed after a detection.
    pub cooldown_frames: u32,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            threshold: 1.3,
            history_len: 20,
            min_history: 10,
            exclude_recent: 5,
            cooldown_frames: 10,
        }
    }
}

/// Empirical per-band gains that bring raw FFT magnitudes into a UI range.
///
/// # Example
/// ```
/// use pg_core::config::Normalization;
/// let n = Normalization::default();
/// assert_eq!((n.bass, n.mid, n.high, n.overall), (100.0, 50.0, 20.0, 30.0));
/// ```
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
pub struct Normalization {
    /// Bass gain.
    pub bass: f64,
    /// Mid gain.
    pub mid: f64,
    /// High gain.
    pub high: f64,
    /// Overall loudness gain.
    pub overall: f64,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            bass: 100.0,
            mid: 50.0,
            high: 20.0,
            overall: 30.0,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            chunk_size: 1024,
            channel_capacity: 8,
            recv_timeout_ms: 100,
            open_timeout_ms: 5_000,
            bands: BandLayout::default(),
            smoothing_factor: 0.8,
            beat: BeatConfig::default(),
            normalization: Normalization::default(),
        }
    }
}

impl EngineConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        self.sample_rate = self.sample_rate.clamp(8_000, 192_000);
        self.chunk_size = self.chunk_size.clamp(64, 16_384) & !1;
        self.channel_capacity = self.channel_capacity.clamp(2, 64);
        self.recv_timeout_ms = self.recv_timeout_ms.clamp(10, 1_000);
        self.open_timeout_ms = self.open_timeout_ms.clamp(100, 60_000);

        self.smoothing_factor = if self.smoothing_factor.is_finite() {
            self.smoothing_factor.clamp(0.0, 0.999)
        } else {
            0.8
        };

        let beat = &mut self.beat;
        beat.threshold = if beat.threshold.is_finite() {
            beat.threshold.max(1.0)
        } else {
            1.3
        };
        beat.history_len = beat.history_len.clamp(2, 1_024);
        beat.exclude_recent = beat.exclude_recent.min(beat.history_len - 1);
        beat.min_history = beat
            .min_history
            .clamp(beat.exclude_recent + 1, beat.history_len);
        beat.cooldown_frames = beat.cooldown_frames.min(1_000);

        let n = &mut self.normalization;
        for gain in [&mut n.bass, &mut n.mid, &mut n.high, &mut n.overall] {
            if !gain.is_finite() || *gain < 0.0 {
                *gain = 0.0;
            }
        }
    }

    /// Check invariants that clamping cannot repair.
    ///
    /// # Errors
    /// Returns a [`CoreError`] if the band layout is not contiguous.
    pub fn validate(&self) -> Result<(), CoreError> {
        self.bands.validate()?;
        let nyquist = f64::from(self.sample_rate) / 2.0;
        if self.bands.bass.low_hz >= nyquist {
            return Err(CoreError::Config(format!(
                "la bande bass commence au-delà de Nyquist ({nyquist} Hz)"
            )));
        }
        Ok(())
    }

    /// Receive timeout as a [`std::time::Duration`].
    #[must_use]
    pub fn recv_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.recv_timeout_ms)
    }

    /// Backend open timeout as a [`std::time::Duration`].
    #[must_use]
    pub fn open_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.open_timeout_ms)
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    engine: Option<EngineSection>,
    bands: Option<BandsSection>,
    beat: Option<BeatSection>,
    normalization: Option<NormalizationSection>,
}

/// `[engine]` section, all fields optional for partial override.
#[derive(Deserialize)]
struct EngineSection {
    sample_rate: Option<u32>,
    chunk_size: Option<usize>,
    channel_capacity: Option<usize>,
    recv_timeout_ms: Option<u64>,
    open_timeout_ms: Option<u64>,
    smoothing_factor: Option<f64>,
}

/// `[bands]` section, each range as a `[low, high]` pair.
#[derive(Deserialize)]
struct BandsSection {
    bass: Option<[f64; 2]>,
    mid: Option<[f64; 2]>,
    high: Option<[f64; 2]>,
}

#[derive(Deserialize)]
struct BeatSection {
    threshold: Option<f64>,
    history_len: Option<usize>,
    min_history: Option<usize>,
    exclude_recent: Option<usize>,
    cooldown_frames: Option<u32>,
}

#[derive(Deserialize)]
struct NormalizationSection {
    bass: Option<f64>,
    mid: Option<f64>,
    high: Option<f64>,
    overall: Option<f64>,
}

/// Parse un document TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the document cannot be parsed or the resulting
/// configuration is invalid.
///
/// # Example
/// ```
/// use pg_core::config::parse_config;
/// let config = parse_config("[beat]\nthreshold = 1.5\n").unwrap();
/// assert_eq!(config.beat.threshold, 1.5);
/// assert_eq!(config.chunk_size, 1024);
/// ```
pub fn parse_config(content: &str) -> Result<EngineConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;

    let mut config = EngineConfig::default();

    if let Some(e) = file.engine {
        if let Some(v) = e.sample_rate {
            config.sample_rate = v;
        }
        if let Some(v) = e.chunk_size {
            config.chunk_size = v;
        }
        if let Some(v) = e.channel_capacity {
            config.channel_capacity = v;
        }
        if let Some(v) = e.recv_timeout_ms {
            config.recv_timeout_ms = v;
        }
        if let Some(v) = e.open_timeout_ms {
            config.open_timeout_ms = v;
        }
        if let Some(v) = e.smoothing_factor {
            config.smoothing_factor = v;
        }
    }

    if let Some(b) = file.bands {
        if let Some([lo, hi]) = b.bass {
            config.bands.bass = BandRange::new(lo, hi);
        }
        if let Some([lo, hi]) = b.mid {
            config.bands.mid = BandRange::new(lo, hi);
        }
        if let Some([lo, hi]) = b.high {
            config.bands.high = BandRange::new(lo, hi);
        }
    }

    if let Some(b) = file.beat {
        if let Some(v) = b.threshold {
            config.beat.threshold = v;
        }
        if let Some(v) = b.history_len {
            config.beat.history_len = v;
        }
        if let Some(v) = b.min_history {
            config.beat.min_history = v;
        }
        if let Some(v) = b.exclude_recent {
            config.beat.exclude_recent = v;
        }
        if let Some(v) = b.cooldown_frames {
            config.beat.cooldown_frames = v;
        }
    }

    if let Some(n) = file.normalization {
        if let Some(v) = n.bass {
            config.normalization.bass = v;
        }
        if let Some(v) = n.mid {
            config.normalization.mid = v;
        }
        if let Some(v) = n.high {
            config.normalization.high = v;
        }
        if let Some(v) = n.overall {
            config.normalization.overall = v;
        }
    }

    config.clamp_all();
    config.validate()?;
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed, or validated.
///
/// # Example
/// ```no_run
/// use pg_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    let config =
        parse_config(&content).with_context(|| format!("Config invalide : {}", path.display()))?;
    log::debug!("Config chargée depuis {}", path.display());
    Ok(config)
}
