use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use flume::RecvTimeoutError;
use parking_lot::Mutex;
use pg_core::config::EngineConfig;
use pg_core::error::CoreError;
use pg_core::frame::FeatureSnapshot;

use crate::capture::{self, CaptureBackend, CaptureConfig, CaptureSource};
use crate::channel::{FrameReceiver, frame_channel};
use crate::error::CaptureError;
use crate::pipeline::FramePipeline;
use crate::stats::{EngineStats, PipelineCounters};
use crate::store::FeatureStore;

/// Issue d'un appel à [`Engine::start`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StartResult {
    /// Capture and analysis are running.
    Started,
    /// Nothing to capture from; snapshots stay neutral.
    Unavailable,
    /// The backend failed to open; the engine stays stopped.
    Error(String),
}

/// Façade du moteur : cycle de vie de la capture et du worker d'analyse.
///
/// `start`, `stop` and `snapshot` may be called from any thread, any number of
/// times. Lifecycle transitions are serialized; `snapshot` never takes that
/// lock and never blocks.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use pg_audio::capture::NullBackend;
/// use pg_audio::engine::{Engine, StartResult};
/// use pg_core::config::EngineConfig;
/// use pg_core::frame::FeatureSnapshot;
///
/// let engine = Engine::with_backend(EngineConfig::default(), Arc::new(NullBackend));
/// assert_eq!(engine.start(), StartResult::Unavailable);
/// assert_eq!(engine.snapshot(), FeatureSnapshot::default());
/// engine.stop();
/// ```
pub struct Engine {
    config: EngineConfig,
    backend: Arc<dyn CaptureBackend>,
    store: Arc<FeatureStore>,
    counters: Arc<PipelineCounters>,
    worker: Mutex<Option<Worker>>,
}

/// Handle on a running analysis thread.
struct Worker {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl Engine {
    /// Engine over the default backend (system input if compiled in).
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_backend(config, capture::default_backend())
    }

    /// Engine over an explicit backend.
    #[must_use]
    pub fn with_backend(config: EngineConfig, backend: Arc<dyn CaptureBackend>) -> Self {
        Self {
            config,
            backend,
            store: Arc::new(FeatureStore::new()),
            counters: Arc::new(PipelineCounters::default()),
            worker: Mutex::new(None),
        }
    }

    /// Open the capture and spawn the analysis worker.
    ///
    /// Returns once the backend has either opened or failed, or after
    /// `open_timeout_ms` if it does neither. Calling it while running is a
    /// no-op that reports [`StartResult::Started`]. An invalid configuration
    /// is reported as [`StartResult::Error`] without opening anything.
    pub fn start(&self) -> StartResult {
        let mut slot = self.worker.lock();

        if let Some(worker) = slot.as_ref() {
            if !worker.thread.is_finished() {
                return StartResult::Started;
            }
        }
        // Worker ended on its own (capture stream closed): reap it.
        if let Some(worker) = slot.take() {
            join_worker(worker.thread);
        }

        self.store.reset();

        let config = match self.checked_config() {
            Ok(config) => config,
            Err(e) => {
                log::error!("Configuration audio invalide : {e}");
                return StartResult::Error(e.to_string());
            }
        };
        let open_timeout = config.open_timeout();

        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = flume::bounded(1);
        let ctx = WorkerContext {
            config,
            backend: Arc::clone(&self.backend),
            store: Arc::clone(&self.store),
            counters: Arc::clone(&self.counters),
            stop: Arc::clone(&stop),
        };

        let thread = match thread::Builder::new()
            .name("pg-audio".to_string())
            .spawn(move || run_worker(&ctx, &ready_tx))
        {
            Ok(t) => t,
            Err(e) => {
                log::error!("Impossible de lancer le thread d'analyse : {e}");
                return StartResult::Error(e.to_string());
            }
        };

        match ready_rx.recv_timeout(open_timeout) {
            Ok(Ok(sample_rate)) => {
                log::info!(
                    "Moteur audio démarré ({} @ {sample_rate}Hz)",
                    self.backend.name()
                );
                *slot = Some(Worker { stop, thread });
                StartResult::Started
            }
            Ok(Err(CaptureError::DeviceUnavailable(reason))) => {
                join_worker(thread);
                log::warn!("Audio non disponible - mode silencieux : {reason}");
                StartResult::Unavailable
            }
            Ok(Err(CaptureError::BackendError(reason))) => {
                join_worker(thread);
                log::error!("Erreur audio : {reason}");
                StartResult::Error(reason)
            }
            Err(RecvTimeoutError::Timeout) => {
                // The worker is stuck in `open`; it sees the flag and exits once that returns.
                stop.store(true, Ordering::Release);
                drop(thread);
                let reason = format!(
                    "le backend '{}' n'a pas ouvert la capture en {} ms",
                    self.backend.name(),
                    open_timeout.as_millis()
                );
                log::error!("Erreur audio : {reason}");
                StartResult::Error(reason)
            }
            Err(RecvTimeoutError::Disconnected) => {
                join_worker(thread);
                let reason = "le worker s'est arrêté avant d'ouvrir la capture".to_string();
                log::error!("Erreur audio : {reason}");
                StartResult::Error(reason)
            }
        }
    }

    /// Signal the worker, wait for it to release the device, reset the snapshot.
    ///
    /// Returns within about one receive timeout. No-op when not running.
    pub fn stop(&self) {
        let mut slot = self.worker.lock();
        if let Some(worker) = slot.take() {
            worker.stop.store(true, Ordering::Release);
            join_worker(worker.thread);
            log::info!("Moteur audio arrêté");
        }
        self.store.reset();
    }

    /// Most recent published features. Never blocks, never fails.
    #[inline]
    #[must_use]
    pub fn snapshot(&self) -> FeatureSnapshot {
        self.store.load()
    }

    /// `true` while the worker is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.thread.is_finished())
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> EngineStats {
        self.counters.snapshot()
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Clamped copy of the configuration, rejected if still inconsistent.
    fn checked_config(&self) -> Result<EngineConfig, CoreError> {
        let mut config = self.config.clone();
        config.clamp_all();
        config.validate()?;
        Ok(config)
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop();
    }
}

fn join_worker(thread: JoinHandle<()>) {
    if thread.join().is_err() {
        log::error!("Le thread d'analyse a paniqué");
    }
}

/// Everything the worker thread owns or shares.
struct WorkerContext {
    config: EngineConfig,
    backend: Arc<dyn CaptureBackend>,
    store: Arc<FeatureStore>,
    counters: Arc<PipelineCounters>,
    stop: Arc<AtomicBool>,
}

/// Worker body: open the capture here so the stream never leaves this thread,
/// report the outcome, then analyze until stopped.
fn run_worker(ctx: &WorkerContext, ready: &flume::Sender<Result<u32, CaptureError>>) {
    let config = &ctx.config;
    let (sink, frames) = frame_channel(
        config.channel_capacity,
        config.chunk_size,
        config.sample_rate,
        Arc::clone(&ctx.counters),
    );

    let mut source = CaptureSource::new(Arc::clone(&ctx.backend));
    let capture_config = CaptureConfig {
        sample_rate: config.sample_rate,
        chunk_size: config.chunk_size,
    };
    if let Err(e) = source.start(&capture_config, sink) {
        let _ = ready.send(Err(e));
        return;
    }
    let _ = ready.send(Ok(source.sample_rate().unwrap_or(config.sample_rate)));

    analysis_loop(ctx, &frames);

    // Release the device before the thread (and `stop()`) returns.
    source.stop();
}

fn analysis_loop(ctx: &WorkerContext, frames: &FrameReceiver) {
    let mut pipeline = FramePipeline::new(&ctx.config);
    let timeout = ctx.config.recv_timeout();

    while !ctx.stop.load(Ordering::Acquire) {
        let frame = match frames.recv_timeout(timeout) {
            Ok(frame) => frame,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                // Nothing refreshes the snapshot past this point; go neutral like `stop()`.
                ctx.store.reset();
                log::warn!("Flux de capture terminé, arrêt du worker");
                break;
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(|| pipeline.process(&frame))) {
            Ok(Ok(snapshot)) => {
                ctx.store.publish(snapshot);
                ctx.counters.record_processed();
            }
            Ok(Err(e)) => {
                ctx.counters.record_failed();
                log::warn!("Frame {} ignorée : {e}", frame.sequence());
            }
            Err(payload) => {
                ctx.counters.record_failed();
                log::warn!(
                    "Erreur traitement audio (frame {}) : {}",
                    frame.sequence(),
                    panic_message(payload.as_ref())
                );
            }
        }
        frames.recycle(frame);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "panic"
    }
}
