use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use pg_audio::capture::synthetic::{SyntheticBackend, Waveform};
use pg_audio::capture::{ActiveCapture, CaptureBackend, CaptureConfig, NullBackend};
use pg_audio::channel::FrameSink;
use pg_audio::engine::{Engine, StartResult};
use pg_audio::error::CaptureError;
use pg_core::band::BandRange;
use pg_core::config::EngineConfig;
use pg_core::frame::FeatureSnapshot;

fn fast_config() -> EngineConfig {
    EngineConfig {
        recv_timeout_ms: 20,
        ..EngineConfig::default()
    }
}

fn engine_with(backend: impl CaptureBackend + 'static) -> Engine {
    Engine::with_backend(fast_config(), Arc::new(backend))
}

/// Poll `engine` until `pred` holds or `limit` elapses.
fn wait_for(engine: &Engine, limit: Duration, pred: impl Fn(&FeatureSnapshot) -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if pred(&engine.snapshot()) {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Backend that fails to open with a fixed error.
struct FailingBackend(CaptureError);

impl CaptureBackend for FailingBackend {
    fn name(&self) -> &'static str {
        "failing"
    }

    fn open(&self, _: &CaptureConfig, _: FrameSink) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        Err(self.0.clone())
    }
}

/// Backend that panics inside `open`.
struct PanickingBackend;

impl CaptureBackend for PanickingBackend {
    fn name(&self) -> &'static str {
        "panicking"
    }

    fn open(&self, _: &CaptureConfig, _: FrameSink) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        panic!("driver exploded");
    }
}

/// Backend feeding frames full of NaN.
struct GarbageBackend;

/// Handle on a test feeder thread; dropping it stops and joins the thread.
struct FeederCapture {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ActiveCapture for FeederCapture {
    fn sample_rate(&self) -> u32 {
        44100
    }
}

impl Drop for FeederCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(t) = self.thread.take() {
            let _ = t.join();
        }
    }
}

impl CaptureBackend for GarbageBackend {
    fn name(&self) -> &'static str {
        "garbage"
    }

    fn open(
        &self,
        config: &CaptureConfig,
        mut sink: FrameSink,
    ) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let block = vec![f32::NAN; config.chunk_size];
        let thread = thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                sink.push_mono(&block);
                thread::sleep(Duration::from_millis(5));
            }
        });
        Ok(Box::new(FeederCapture {
            stop,
            thread: Some(thread),
        }))
    }
}

/// Backend playing a fixed list of DC frames, then dropping its sink.
struct BurstBackend {
    levels: Vec<f32>,
}

impl CaptureBackend for BurstBackend {
    fn name(&self) -> &'static str {
        "burst"
    }

    fn open(
        &self,
        config: &CaptureConfig,
        mut sink: FrameSink,
    ) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        let levels = self.levels.clone();
        let chunk = config.chunk_size;
        let thread = thread::spawn(move || {
            for level in levels {
                sink.push_mono(&vec![level; chunk]);
                thread::sleep(Duration::from_millis(5));
            }
        });
        Ok(Box::new(FeederCapture {
            stop: Arc::new(AtomicBool::new(false)),
            thread: Some(thread),
        }))
    }
}

/// Backend whose `open` blocks for a while before giving up.
struct StallingBackend(Duration);

impl CaptureBackend for StallingBackend {
    fn name(&self) -> &'static str {
        "stalling"
    }

    fn open(&self, _: &CaptureConfig, _: FrameSink) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        thread::sleep(self.0);
        Err(CaptureError::DeviceUnavailable("gave up".into()))
    }
}

#[test]
fn no_input_device_runs_disabled() {
    let engine = engine_with(NullBackend);
    assert_eq!(engine.start(), StartResult::Unavailable);
    assert!(!engine.is_running());
    for _ in 0..50 {
        assert_eq!(engine.snapshot(), FeatureSnapshot::default());
        thread::sleep(Duration::from_millis(1));
    }
    engine.stop();
    assert_eq!(engine.snapshot(), FeatureSnapshot::default());
}

#[test]
fn unavailable_device_reported_by_backend() {
    let engine = engine_with(FailingBackend(CaptureError::DeviceUnavailable(
        "no permission".into(),
    )));
    assert_eq!(engine.start(), StartResult::Unavailable);
    assert_eq!(engine.snapshot(), FeatureSnapshot::default());
}

#[test]
fn backend_error_leaves_engine_stopped() {
    let engine = engine_with(FailingBackend(CaptureError::BackendError(
        "driver crashed".into(),
    )));
    assert_eq!(engine.start(), StartResult::Error("driver crashed".into()));
    assert!(!engine.is_running());
    assert_eq!(engine.snapshot(), FeatureSnapshot::default());
}

#[test]
fn panic_while_opening_is_an_error() {
    let engine = engine_with(PanickingBackend);
    assert!(matches!(engine.start(), StartResult::Error(_)));
    assert!(!engine.is_running());
}

#[test]
fn stop_without_start_is_a_no_op() {
    let engine = engine_with(NullBackend);
    engine.stop();
    engine.stop();
    assert!(!engine.is_running());
}

#[test]
fn bass_tone_lights_up_bass_level() {
    let engine = engine_with(SyntheticBackend::new(Waveform::Sine {
        freq_hz: 150.0,
        amplitude: 1.0,
    }));
    assert_eq!(engine.start(), StartResult::Started);
    assert!(engine.is_running());

    assert!(
        wait_for(&engine, Duration::from_secs(3), |s| s.bass_level > 0.9),
        "bass never rose: {:?}",
        engine.snapshot()
    );
    let snap = engine.snapshot();
    assert!(snap.is_normalized());
    assert!(engine.stats().frames_processed > 0);

    engine.stop();
    assert!(!engine.is_running());
    assert_eq!(engine.snapshot(), FeatureSnapshot::default());
}

#[test]
fn silence_keeps_snapshot_neutral() {
    let engine = engine_with(SyntheticBackend::new(Waveform::Silence));
    assert_eq!(engine.start(), StartResult::Started);
    let deadline = Instant::now() + Duration::from_millis(300);
    while Instant::now() < deadline {
        assert_eq!(engine.snapshot(), FeatureSnapshot::default());
        thread::sleep(Duration::from_millis(2));
    }
    assert!(engine.stats().frames_processed > 0);
}

#[test]
fn pulse_train_produces_beats() {
    let engine = engine_with(SyntheticBackend::new(Waveform::Pulse {
        freq_hz: 100.0,
        amplitude: 1.0,
        period_frames: 16,
    }));
    assert_eq!(engine.start(), StartResult::Started);
    assert!(wait_for(&engine, Duration::from_secs(5), |s| s.beat_detected));
}

#[test]
fn repeated_start_is_idempotent() {
    let engine = engine_with(SyntheticBackend::new(Waveform::Silence));
    assert_eq!(engine.start(), StartResult::Started);
    assert_eq!(engine.start(), StartResult::Started);
    assert!(engine.is_running());
    engine.stop();
    assert!(!engine.is_running());
    assert_eq!(engine.start(), StartResult::Started);
    assert!(engine.is_running());
}

#[test]
fn stop_returns_within_bounded_time() {
    let engine = engine_with(SyntheticBackend::new(Waveform::Silence));
    assert_eq!(engine.start(), StartResult::Started);
    let t = Instant::now();
    engine.stop();
    assert!(t.elapsed() < Duration::from_millis(500), "{:?}", t.elapsed());
}

#[test]
fn malformed_frames_do_not_kill_the_worker() {
    let engine = engine_with(GarbageBackend);
    assert_eq!(engine.start(), StartResult::Started);
    let deadline = Instant::now() + Duration::from_secs(2);
    while engine.stats().frames_failed < 5 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(engine.stats().frames_failed >= 5);
    assert!(engine.is_running());
    assert_eq!(engine.snapshot(), FeatureSnapshot::default());
}

#[test]
fn concurrent_snapshot_start_stop_never_tears() {
    let engine = Arc::new(engine_with(SyntheticBackend::new(Waveform::Pulse {
        freq_hz: 150.0,
        amplitude: 1.0,
        period_frames: 8,
    })));
    let done = Arc::new(AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut reads = 0u64;
                while !done.load(Ordering::Relaxed) {
                    let s = engine.snapshot();
                    assert!(s.is_normalized(), "{s:?}");
                    reads += 1;
                }
                reads
            })
        })
        .collect();

    let togglers: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for _ in 0..10 {
                    assert_eq!(engine.start(), StartResult::Started);
                    thread::sleep(Duration::from_millis(15));
                    engine.stop();
                }
            })
        })
        .collect();

    for t in togglers {
        assert!(t.join().is_ok());
    }
    done.store(true, Ordering::Relaxed);
    for r in readers {
        let reads = r.join().expect("reader panicked");
        assert!(reads > 0);
    }

    engine.stop();
    assert!(!engine.is_running());
    assert_eq!(engine.snapshot(), FeatureSnapshot::default());
}

#[test]
fn unpaced_producer_does_not_stall_analysis() {
    let engine = engine_with(SyntheticBackend::unpaced(Waveform::Sine {
        freq_hz: 150.0,
        amplitude: 0.5,
    }));
    assert_eq!(engine.start(), StartResult::Started);
    thread::sleep(Duration::from_millis(200));
    let stats = engine.stats();
    assert!(stats.frames_processed > 0);
    assert!(engine.is_running());
    assert!(engine.snapshot().is_normalized());

    let t = Instant::now();
    engine.stop();
    assert!(t.elapsed() < Duration::from_millis(500));
}

#[test]
fn capture_ending_on_a_beat_goes_neutral() {
    // Quiet bed then one spike: the last published frame carries a beat
    let mut levels = vec![0.01f32; 15];
    levels.push(0.1);
    let engine = engine_with(BurstBackend { levels });
    assert_eq!(engine.start(), StartResult::Started);

    let deadline = Instant::now() + Duration::from_secs(3);
    while engine.is_running() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    assert!(!engine.is_running());
    let stats = engine.stats();
    assert_eq!(stats.frames_processed + stats.frames_dropped, 16);
    for _ in 0..50 {
        assert_eq!(engine.snapshot(), FeatureSnapshot::default());
        thread::sleep(Duration::from_millis(1));
    }

    // A finished worker is reaped and the engine can start again
    assert_eq!(engine.start(), StartResult::Started);
}

#[test]
fn invalid_band_layout_refuses_to_start() {
    let mut config = fast_config();
    config.bands.mid = BandRange::new(3000.0, 1000.0);
    assert!(config.validate().is_err());

    let engine = Engine::with_backend(
        config,
        Arc::new(SyntheticBackend::new(Waveform::Sine {
            freq_hz: 150.0,
            amplitude: 1.0,
        })),
    );
    assert!(matches!(engine.start(), StartResult::Error(_)));
    assert!(!engine.is_running());
    assert_eq!(engine.snapshot(), FeatureSnapshot::default());
}

#[test]
fn out_of_range_config_is_clamped_at_start() {
    let config = EngineConfig {
        chunk_size: 3,
        channel_capacity: 0,
        ..fast_config()
    };
    let engine = Engine::with_backend(config, Arc::new(SyntheticBackend::new(Waveform::Silence)));
    assert_eq!(engine.start(), StartResult::Started);
    assert!(engine.is_running());
}

#[test]
fn stalled_open_times_out() {
    let config = EngineConfig {
        open_timeout_ms: 200,
        ..fast_config()
    };
    let engine = Engine::with_backend(
        config,
        Arc::new(StallingBackend(Duration::from_millis(1500))),
    );

    let t = Instant::now();
    assert!(matches!(engine.start(), StartResult::Error(_)));
    assert!(t.elapsed() < Duration::from_millis(1000), "{:?}", t.elapsed());

    // The lifecycle lock is free again
    let t = Instant::now();
    assert!(!engine.is_running());
    engine.stop();
    assert!(t.elapsed() < Duration::from_millis(100));
    assert_eq!(engine.snapshot(), FeatureSnapshot::default());
}
