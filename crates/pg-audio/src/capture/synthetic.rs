use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::capture::{ActiveCapture, CaptureBackend, CaptureConfig};
use crate::channel::FrameSink;
use crate::error::CaptureError;

/// Signal produit par le générateur.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Waveform {
    /// Digital silence.
    Silence,
    /// Continuous sine.
    Sine {
        /// Frequency in Hz.
        freq_hz: f32,
        /// Peak amplitude.
        amplitude: f32,
    },
    /// Sine at a low floor, bursting to full amplitude every `period_frames` frames.
    Pulse {
        /// Frequency in Hz.
        freq_hz: f32,
        /// Peak amplitude of the bursts.
        amplitude: f32,
        /// Frames between bursts.
        period_frames: u32,
    },
}

/// Générateur de signal sans matériel, cadencé en temps réel.
///
/// Runs its own thread standing in for a device callback: one frame of
/// `chunk_size` samples per `chunk_size / sample_rate` seconds.
///
/// # Example
/// ```
/// use pg_audio::capture::synthetic::{SyntheticBackend, Waveform};
/// let backend = SyntheticBackend::new(Waveform::Sine { freq_hz: 150.0, amplitude: 1.0 });
/// ```
#[derive(Clone, Debug)]
pub struct SyntheticBackend {
    waveform: Waveform,
    realtime: bool,
}

impl SyntheticBackend {
    /// Real-time paced generator.
    #[must_use]
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            realtime: true,
        }
    }

    /// Generator that produces frames as fast as it can, for load tests.
    #[must_use]
    pub fn unpaced(waveform: Waveform) -> Self {
        Self {
            waveform,
            realtime: false,
        }
    }
}

impl CaptureBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open(
        &self,
        config: &CaptureConfig,
        mut sink: FrameSink,
    ) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        let sample_rate = config.sample_rate.max(1);
        let chunk_size = config.chunk_size.max(1);
        sink.set_sample_rate(sample_rate);

        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let waveform = self.waveform;
        let period = if self.realtime {
            Some(Duration::from_secs_f64(
                chunk_size as f64 / f64::from(sample_rate),
            ))
        } else {
            None
        };

        let thread = thread::Builder::new()
            .name("pg-synth".to_string())
            .spawn(move || {
                let mut block = vec![0.0f32; chunk_size];
                let mut oscillator = Oscillator::new(waveform, sample_rate);
                let mut next_tick = Instant::now();
                while !stop_flag.load(Ordering::Relaxed) {
                    oscillator.fill(&mut block);
                    sink.push_mono(&block);
                    match period {
                        Some(p) => {
                            next_tick += p;
                            let now = Instant::now();
                            if next_tick > now {
                                thread::sleep(next_tick - now);
                            } else {
                                next_tick = now;
                            }
                        }
                        None => thread::yield_now(),
                    }
                }
            })
            .map_err(|e| CaptureError::BackendError(format!("thread générateur : {e}")))?;

        Ok(Box::new(SyntheticCapture {
            stop,
            thread: Some(thread),
            sample_rate,
        }))
    }
}

struct SyntheticCapture {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl ActiveCapture for SyntheticCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for SyntheticCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Le thread générateur a paniqué");
            }
        }
    }
}

/// Phase-continuous sample generator.
struct Oscillator {
    waveform: Waveform,
    sample_rate: f32,
    phase: f32,
    block: u32,
}

impl Oscillator {
    fn new(waveform: Waveform, sample_rate: u32) -> Self {
        Self {
            waveform,
            sample_rate: sample_rate as f32,
            phase: 0.0,
            block: 0,
        }
    }

    fn fill(&mut self, out: &mut [f32]) {
        let (freq, amp) = match self.waveform {
            Waveform::Silence => {
                out.fill(0.0);
                return;
            }
            Waveform::Sine { freq_hz, amplitude } => (freq_hz, amplitude),
            Waveform::Pulse {
                freq_hz,
                amplitude,
                period_frames,
            } => {
                let on_beat = self.block % period_frames.max(1) == 0;
                self.block = self.block.wrapping_add(1);
                (freq_hz, if on_beat { amplitude } else { amplitude * 0.1 })
            }
        };

        let step = std::f32::consts::TAU * freq / self.sample_rate;
        for s in out.iter_mut() {
            *s = amp * self.phase.sin();
            self.phase = (self.phase + step) % std::f32::consts::TAU;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pulse_bursts_on_period() {
        let mut osc = Oscillator::new(
            Waveform::Pulse {
                freq_hz: 100.0,
                amplitude: 1.0,
                period_frames: 4,
            },
            8000,
        );
        let mut block = [0.0f32; 80];
        let peaks: Vec<f32> = (0..8)
            .map(|_| {
                osc.fill(&mut block);
                block.iter().fold(0.0f32, |m, s| m.max(s.abs()))
            })
            .collect();
        assert!(peaks[0] > 0.9 && peaks[4] > 0.9);
        assert!(peaks[1] < 0.11 && peaks[5] < 0.11);
    }

    #[test]
    fn silence_is_all_zero() {
        let mut osc = Oscillator::new(Waveform::Silence, 44100);
        let mut block = [1.0f32; 32];
        osc.fill(&mut block);
        assert!(block.iter().all(|&s| s == 0.0));
    }
}
