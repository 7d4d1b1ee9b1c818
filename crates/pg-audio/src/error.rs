use thiserror::Error;

/// Errors raised while opening or running a capture backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// No capture hardware, no permission, or no backend compiled in.
    #[error("Aucun périphérique audio d'entrée disponible : {0}")]
    DeviceUnavailable(String),

    /// Driver-level failure while opening or starting the stream.
    #[error("Erreur du backend audio : {0}")]
    BackendError(String),
}

/// Errors raised while analyzing a single frame.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// The frame holds no samples.
    #[error("Frame audio vide")]
    EmptyFrame,

    /// The frame holds a NaN or infinite sample.
    #[error("Échantillon non fini à l'index {index} ({value})")]
    NonFiniteSample {
        /// Offset of the offending sample.
        index: usize,
        /// The offending value.
        value: f32,
    },

    /// The frame sample rate is zero.
    #[error("Fréquence d'échantillonnage nulle")]
    ZeroSampleRate,
}
