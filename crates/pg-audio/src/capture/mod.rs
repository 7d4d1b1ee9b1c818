//! Capture backends and the [`CaptureSource`] wrapper driven by the worker.

#[cfg(feature = "cpal")]
pub mod device;
#[cfg(feature = "file")]
pub mod file;
pub mod synthetic;

use std::sync::Arc;

use crate::channel::FrameSink;
use crate::error::CaptureError;

/// Paramètres demandés au backend à l'ouverture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Requested sample rate. Backends may pick another and report it.
    pub sample_rate: u32,
    /// Samples per emitted frame.
    pub chunk_size: usize,
}

/// A source of audio that can be opened on demand.
///
/// `open` is called on the analysis worker thread; the returned handle stays
/// on that thread and releases the device when dropped, so backends whose
/// streams are not `Send` are fine.
///
/// # Example
/// ```
/// use pg_audio::capture::{ActiveCapture, CaptureBackend, CaptureConfig};
/// use pg_audio::channel::FrameSink;
/// use pg_audio::error::CaptureError;
///
/// struct Unplugged;
/// impl CaptureBackend for Unplugged {
///     fn name(&self) -> &'static str { "unplugged" }
///     fn open(&self, _: &CaptureConfig, _: FrameSink) -> Result<Box<dyn ActiveCapture>, CaptureError> {
///         Err(CaptureError::DeviceUnavailable("unplugged".into()))
///     }
/// }
/// ```
pub trait CaptureBackend: Send + Sync {
    /// Nom lisible pour les logs.
    fn name(&self) -> &'static str;

    /// Open the input and start pushing frames into `sink`.
    ///
    /// # Errors
    /// [`CaptureError::DeviceUnavailable`] when there is nothing to capture
    /// from, [`CaptureError::BackendError`] for any driver failure.
    fn open(
        &self,
        config: &CaptureConfig,
        sink: FrameSink,
    ) -> Result<Box<dyn ActiveCapture>, CaptureError>;
}

/// A running capture. Dropping it stops the callback and releases the device.
pub trait ActiveCapture {
    /// Sample rate actually delivered.
    fn sample_rate(&self) -> u32;
}

/// Backend used when no audio library is compiled in: always unavailable.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBackend;

impl CaptureBackend for NullBackend {
    fn name(&self) -> &'static str {
        "null"
    }

    fn open(
        &self,
        _config: &CaptureConfig,
        _sink: FrameSink,
    ) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        Err(CaptureError::DeviceUnavailable(
            "aucun backend audio compilé".to_string(),
        ))
    }
}

/// The system input device when cpal is compiled in, otherwise [`NullBackend`].
#[must_use]
pub fn default_backend() -> Arc<dyn CaptureBackend> {
    #[cfg(feature = "cpal")]
    {
        Arc::new(device::CpalBackend)
    }
    #[cfg(not(feature = "cpal"))]
    {
        Arc::new(NullBackend)
    }
}

/// Wraps a backend and the stream it opened.
///
/// `stop` is idempotent; dropping the source stops it.
pub struct CaptureSource {
    backend: Arc<dyn CaptureBackend>,
    active: Option<Box<dyn ActiveCapture>>,
}

impl CaptureSource {
    /// Source over `backend`, not yet started.
    #[must_use]
    pub fn new(backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            active: None,
        }
    }

    /// Open the backend. A running stream is released first.
    ///
    /// # Errors
    /// Forwards the backend's [`CaptureError`].
    pub fn start(&mut self, config: &CaptureConfig, sink: FrameSink) -> Result<(), CaptureError> {
        self.stop();
        let active = self.backend.open(config, sink)?;
        log::info!(
            "Capture '{}' ouverte @ {}Hz, {} échantillons/frame",
            self.backend.name(),
            active.sample_rate(),
            config.chunk_size
        );
        self.active = Some(active);
        Ok(())
    }

    /// Release the stream. No-op if not started.
    pub fn stop(&mut self) {
        if self.active.take().is_some() {
            log::info!("Capture '{}' fermée", self.backend.name());
        }
    }

    /// `true` while a stream is open.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Delivered sample rate of the open stream.
    #[must_use]
    pub fn sample_rate(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.sample_rate())
    }

    /// Backend name.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }
}

impl Drop for CaptureSource {
    fn drop(&mut self) {
        self.stop();
    }
}
