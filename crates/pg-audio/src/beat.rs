use std::collections::VecDeque;

use pg_core::config::BeatConfig;

/// Bounded history of raw loudness samples (VecDeque for O(1) pop_front).
#[derive(Debug, Clone)]
pub struct LoudnessHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LoudnessHistory {
    /// Empty history holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest beyond capacity.
    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Samples currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// `true` if nothing has been pushed yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample.
    #[must_use]
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().copied()
    }

    /// Mean of the history leaving out the `skip_recent` newest samples.
    ///
    /// `None` if nothing is left to average.
    #[must_use]
    pub fn trailing_mean(&self, skip_recent: usize) -> Option<f64> {
        let count = self.samples.len().checked_sub(skip_recent)?;
        if count == 0 {
            return None;
        }
        let sum: f64 = self.samples.iter().take(count).sum();
        Some(sum / count as f64)
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// État de la machine de détection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeatState {
    /// Evaluating the threshold on every frame.
    Idle,
    /// Detections suppressed for the given number of further frames.
    Cooldown(u32),
}

/// Détection de beats sur l'intensité globale brute.
///
/// Un beat est signalé quand l'échantillon courant dépasse la moyenne
/// glissante (hors échantillons les plus récents) multipliée par le seuil,
/// puis un cooldown bloque les re-déclenchements.
///
/// # Example
/// ```
/// use pg_audio::beat::BeatDetector;
/// use pg_core::config::BeatConfig;
///
/// let mut detector = BeatDetector::new(BeatConfig::default());
/// for _ in 0..15 {
///     assert!(!detector.process(1.0));
/// }
/// assert!(detector.process(10.0));
/// assert!(!detector.process(10.0)); // cooldown
/// ```
pub struct BeatDetector {
    config: BeatConfig,
    history: LoudnessHistory,
    state: BeatState,
    detected: bool,
}

impl BeatDetector {
    /// Create a new beat detector.
    #[must_use]
    pub fn new(config: BeatConfig) -> Self {
        Self {
            history: LoudnessHistory::new(config.history_len),
            config,
            state: BeatState::Idle,
            detected: false,
        }
    }

    /// Feed one raw overall-loudness sample. Returns `true` on a beat.
    pub fn process(&mut self, loudness: f64) -> bool {
        self.history.push(loudness);

        self.detected = match self.state {
            BeatState::Cooldown(n) if n > 0 => {
                self.state = if n > 1 {
                    BeatState::Cooldown(n - 1)
                } else {
                    BeatState::Idle
                };
                false
            }
            _ => self.evaluate(loudness),
        };
        self.detected
    }

    fn evaluate(&mut self, current: f64) -> bool {
        if self.history.len() < self.config.min_history {
            return false;
        }
        let Some(recent_avg) = self.history.trailing_mean(self.config.exclude_recent) else {
            return false;
        };
        if current > recent_avg * self.config.threshold {
            self.state = if self.config.cooldown_frames > 0 {
                BeatState::Cooldown(self.config.cooldown_frames)
            } else {
                BeatState::Idle
            };
            log::trace!("beat: {current:.4} > {recent_avg:.4} × {}", self.config.threshold);
            true
        } else {
            false
        }
    }

    /// Result of the last `process` call.
    #[must_use]
    pub fn detected(&self) -> bool {
        self.detected
    }

    /// Frames left before detection resumes.
    #[must_use]
    pub fn cooldown_remaining(&self) -> u32 {
        match self.state {
            BeatState::Idle => 0,
            BeatState::Cooldown(n) => n,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> BeatState {
        self.state
    }

    /// Loudness history.
    #[must_use]
    pub fn history(&self) -> &LoudnessHistory {
        &self.history
    }

    /// Clear history and cooldown.
    pub fn reset(&mut self) {
        self.history.clear();
        self.state = BeatState::Idle;
        self.detected = false;
    }
}
