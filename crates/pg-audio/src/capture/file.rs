use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::capture::{ActiveCapture, CaptureBackend, CaptureConfig};
use crate::channel::FrameSink;
use crate::decode::MonoDecoder;
use crate::error::CaptureError;

/// Rejoue un fichier audio décodé comme s'il venait d'un micro.
///
/// The file is decoded packet by packet on a dedicated thread, down-mixed to
/// mono, and fed in `chunk_size` blocks at real-time pace. Nothing is played
/// back. Frames carry the file's own sample rate. With [`once`](Self::once)
/// the sink is dropped at end of file, which ends the capture.
#[derive(Clone, Debug)]
pub struct FileBackend {
    path: PathBuf,
    looping: bool,
}

impl FileBackend {
    /// Replay `path`, looping forever.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            looping: true,
        }
    }

    /// Stop feeding frames at end of file instead of looping.
    #[must_use]
    pub fn once(mut self) -> Self {
        self.looping = false;
        self
    }
}

impl CaptureBackend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn open(
        &self,
        config: &CaptureConfig,
        mut sink: FrameSink,
    ) -> Result<Box<dyn ActiveCapture>, CaptureError> {
        let mut decoder = MonoDecoder::open(&self.path)?;
        // Decode up front until audio shows up so an empty file fails here, not later.
        let mut pending = Vec::new();
        while pending.is_empty() {
            if !decoder.next_block(&mut pending)? {
                return Err(CaptureError::BackendError(format!(
                    "fichier audio vide : {}",
                    self.path.display()
                )));
            }
        }
        let sample_rate = decoder.sample_rate();
        sink.set_sample_rate(sample_rate);

        let feeder = Feeder {
            decoder,
            pending,
            sink,
            chunk_size: config.chunk_size.max(1),
            looping: self.looping,
        };
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        let thread = thread::Builder::new()
            .name("pg-file".to_string())
            .spawn(move || feeder.run(&stop_flag))
            .map_err(|e| CaptureError::BackendError(format!("thread de lecture : {e}")))?;

        Ok(Box::new(FileCapture {
            stop,
            thread: Some(thread),
            sample_rate,
        }))
    }
}

/// State of the `pg-file` thread.
struct Feeder {
    decoder: MonoDecoder,
    pending: Vec<f32>,
    sink: FrameSink,
    chunk_size: usize,
    looping: bool,
}

impl Feeder {
    fn run(mut self, stop: &AtomicBool) {
        let period = Duration::from_secs_f64(
            self.chunk_size as f64 / f64::from(self.decoder.sample_rate()),
        );
        let mut next_tick = Instant::now();
        let mut pos = 0usize;

        while !stop.load(Ordering::Relaxed) {
            if self.pending.len() - pos < self.chunk_size {
                self.pending.drain(..pos);
                pos = 0;
                match self.decoder.next_block(&mut self.pending) {
                    Ok(true) => continue,
                    Ok(false) => {
                        // Tail shorter than a chunk: the sink carries it over.
                        self.sink.push_mono(&self.pending);
                        self.pending.clear();
                        if !self.looping {
                            break;
                        }
                        if let Err(e) = self.decoder.rewind() {
                            log::warn!("Relecture du fichier impossible : {e}");
                            break;
                        }
                        continue;
                    }
                    Err(e) => {
                        log::warn!("Lecture du fichier interrompue : {e}");
                        break;
                    }
                }
            }

            self.sink.push_mono(&self.pending[pos..pos + self.chunk_size]);
            pos += self.chunk_size;

            next_tick += period;
            let now = Instant::now();
            if next_tick > now {
                thread::sleep(next_tick - now);
            } else {
                next_tick = now;
            }
        }
    }
}

struct FileCapture {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl ActiveCapture for FileCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for FileCapture {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            if handle.join().is_err() {
                log::error!("Le thread de lecture fichier a paniqué");
            }
        }
    }
}
