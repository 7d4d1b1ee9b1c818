use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Frequency bands leave a gap or overlap.
    #[error("Bandes non contiguës : {lower} se termine à {lower_high} Hz, {upper} commence à {upper_low} Hz")]
    NonContiguousBands {
        /// Name of the lower band.
        lower: &'static str,
        /// Upper edge of the lower band.
        lower_high: f64,
        /// Name of the upper band.
        upper: &'static str,
        /// Lower edge of the upper band.
        upper_low: f64,
    },
}
