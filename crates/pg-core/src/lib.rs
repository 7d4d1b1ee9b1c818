/// Shared types and configuration for pulsegrid.
///
/// This crate holds the plain data exchanged between the capture callback,
/// the analysis worker and the consumer, plus the engine configuration.

pub mod band;
pub mod config;
pub mod error;
pub mod frame;

pub use band::{BandLayout, BandRange, FrequencyBand};
pub use config::EngineConfig;
pub use error::CoreError;
pub use frame::{AudioFrame, FeatureSnapshot, RawBandEnergies, SmoothedLevels};
