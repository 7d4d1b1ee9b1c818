// Audio capture, spectral analysis and beat detection for pulsegrid.

pub mod analyzer;
pub mod beat;
pub mod capture;
pub mod channel;
#[cfg(feature = "file")]
pub mod decode;
pub mod engine;
pub mod error;
pub mod fft;
pub mod pipeline;
pub mod smoothing;
pub mod stats;
pub mod store;

pub use engine::{Engine, StartResult};
pub use error::{AnalysisError, CaptureError};
pub use stats::EngineStats;
