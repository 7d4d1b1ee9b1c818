use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender, TrySendError};
use pg_core::frame::AudioFrame;

use crate::stats::PipelineCounters;

/// Côté producteur de la file callback → worker.
///
/// Vit dans le callback temps réel du backend : accumule les échantillons mono
/// jusqu'à `chunk_size`, puis pousse la frame sans jamais bloquer. Si la file
/// est pleine, la frame la plus récente est abandonnée et son buffer réutilisé.
///
/// Les buffers proviennent d'un pool pré-alloué que le worker recycle ; le
/// callback n'alloue pas en régime établi.
pub struct FrameSink {
    tx: Sender<AudioFrame>,
    recycle_rx: Receiver<Vec<f32>>,
    current: Vec<f32>,
    chunk_size: usize,
    sample_rate: u32,
    next_sequence: u64,
    counters: Arc<PipelineCounters>,
}

/// Worker side of the hand-off queue.
pub struct FrameReceiver {
    rx: Receiver<AudioFrame>,
    recycle_tx: Sender<Vec<f32>>,
}

/// Build a bounded frame queue of `capacity` frames of `chunk_size` samples.
///
/// `capacity + 2` buffers are allocated up front: one being filled by the
/// sink, up to `capacity` queued, one held by the worker.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use pg_audio::channel::frame_channel;
/// use pg_audio::stats::PipelineCounters;
///
/// let (mut sink, rx) = frame_channel(4, 256, 44100, Arc::new(PipelineCounters::default()));
/// sink.push_mono(&[0.0; 256]);
/// let frame = rx.recv_timeout(Duration::from_millis(10)).unwrap();
/// assert_eq!(frame.len(), 256);
/// rx.recycle(frame);
/// ```
#[must_use]
pub fn frame_channel(
    capacity: usize,
    chunk_size: usize,
    sample_rate: u32,
    counters: Arc<PipelineCounters>,
) -> (FrameSink, FrameReceiver) {
    let capacity = capacity.max(1);
    let chunk_size = chunk_size.max(1);
    let (tx, rx) = flume::bounded(capacity);
    let (recycle_tx, recycle_rx) = flume::bounded(capacity + 2);

    for _ in 0..=capacity {
        let _ = recycle_tx.try_send(Vec::with_capacity(chunk_size));
    }

    let sink = FrameSink {
        tx,
        recycle_rx,
        current: Vec::with_capacity(chunk_size),
        chunk_size,
        sample_rate,
        next_sequence: 0,
        counters,
    };
    (sink, FrameReceiver { rx, recycle_tx })
}

impl FrameSink {
    /// Samples per emitted frame.
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Sample rate stamped on emitted frames.
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Override the stamped sample rate once the device rate is known.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Append mono samples, emitting a frame every `chunk_size` samples.
    pub fn push_mono(&mut self, samples: &[f32]) {
        for &s in samples {
            self.push_sample(s);
        }
    }

    /// Downmix interleaved samples to mono and append them.
    pub fn push_interleaved(&mut self, data: &[f32], channels: usize) {
        if channels <= 1 {
            self.push_mono(data);
            return;
        }
        self.push_interleaved_with(data, channels, |s| s);
    }

    /// Same as [`push_interleaved`](Self::push_interleaved) for any sample
    /// type, converting each sample to f32 on the fly.
    pub fn push_interleaved_with<T: Copy>(
        &mut self,
        data: &[T],
        channels: usize,
        convert: impl Fn(T) -> f32,
    ) {
        let channels = channels.max(1);
        for chunk in data.chunks(channels) {
            let mono = chunk.iter().map(|&s| convert(s)).sum::<f32>() / chunk.len() as f32;
            self.push_sample(mono);
        }
    }

    #[inline(always)]
    fn push_sample(&mut self, sample: f32) {
        self.current.push(sample);
        if self.current.len() >= self.chunk_size {
            self.flush();
        }
    }

    /// Hand the filled buffer to the worker, or drop it if the queue is full.
    fn flush(&mut self) {
        let filled = std::mem::take(&mut self.current);
        let frame = AudioFrame::new(filled, self.sample_rate, self.next_sequence);
        self.next_sequence += 1;

        match self.tx.try_send(frame) {
            Ok(()) => {
                // Pool exhausted only if the worker lost a buffer.
                self.current = self
                    .recycle_rx
                    .try_recv()
                    .unwrap_or_else(|_| Vec::with_capacity(self.chunk_size));
                self.current.clear();
            }
            Err(TrySendError::Full(frame) | TrySendError::Disconnected(frame)) => {
                self.counters.record_dropped();
                let mut buf = frame.into_samples();
                buf.clear();
                self.current = buf;
            }
        }
    }
}

impl FrameReceiver {
    /// Wait up to `timeout` for the next frame.
    ///
    /// # Errors
    /// [`RecvTimeoutError::Timeout`] if nothing arrived in time,
    /// [`RecvTimeoutError::Disconnected`] once the sink is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<AudioFrame, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    /// Frames currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// `true` if no frame is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Return a consumed frame's buffer to the pool.
    pub fn recycle(&self, frame: AudioFrame) {
        let mut buf = frame.into_samples();
        buf.clear();
        let _ = self.recycle_tx.try_send(buf);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    fn channel(capacity: usize, chunk: usize) -> (FrameSink, FrameReceiver, Arc<PipelineCounters>) {
        let counters = Arc::new(PipelineCounters::default());
        let (sink, rx) = frame_channel(capacity, chunk, 44100, Arc::clone(&counters));
        (sink, rx, counters)
    }

    #[test]
    fn rechunks_arbitrary_buffer_sizes() {
        let (mut sink, rx, _) = channel(8, 100);
        for _ in 0..5 {
            sink.push_mono(&[0.25; 70]);
        }
        // 350 samples → 3 full frames, 50 pending
        assert_eq!(rx.len(), 3);
        for expected_seq in 0..3 {
            let frame = rx
                .recv_timeout(Duration::from_millis(1))
                .expect("queued frame");
            assert_eq!(frame.len(), 100);
            assert_eq!(frame.sequence(), expected_seq);
            rx.recycle(frame);
        }
        assert!(rx.is_empty());
    }

    #[test]
    fn interleaved_input_is_downmixed() {
        let (mut sink, rx, _) = channel(2, 4);
        sink.push_interleaved(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0, 0.2, 0.4], 2);
        let frame = rx
            .recv_timeout(Duration::from_millis(1))
            .expect("one frame");
        let expected = [0.5, 0.5, 0.0, 0.3];
        for (got, want) in frame.samples().iter().zip(expected) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn overflow_drops_newest_and_keeps_order() {
        let (mut sink, rx, counters) = channel(2, 4);
        for i in 0..5u8 {
            sink.push_mono(&[f32::from(i); 4]);
        }
        assert_eq!(counters.snapshot().frames_dropped, 3);

        let first = rx.recv_timeout(Duration::from_millis(1)).expect("frame 0");
        let second = rx.recv_timeout(Duration::from_millis(1)).expect("frame 1");
        assert_eq!(first.sequence(), 0);
        assert_eq!(second.sequence(), 1);
        assert!((first.samples()[0] - 0.0).abs() < f32::EPSILON);
        assert!((second.samples()[0] - 1.0).abs() < f32::EPSILON);
        assert!(rx.is_empty());
    }

    #[test]
    fn sequence_gaps_reveal_drops() {
        let (mut sink, rx, _) = channel(1, 2);
        sink.push_mono(&[0.0; 6]);
        let frame = rx.recv_timeout(Duration::from_millis(1)).expect("frame");
        rx.recycle(frame);
        sink.push_mono(&[0.0; 2]);
        let next = rx.recv_timeout(Duration::from_millis(1)).expect("frame");
        assert_eq!(next.sequence(), 3);
    }

    #[test]
    fn producer_never_blocks_under_sustained_overflow() {
        let (mut sink, _rx, counters) = channel(4, 256);
        let block = [0.1f32; 256];
        let mut worst = Duration::ZERO;
        for _ in 0..2_000 {
            let t = Instant::now();
            sink.push_mono(&block);
            worst = worst.max(t.elapsed());
        }
        assert_eq!(counters.snapshot().frames_dropped, 2_000 - 4);
        assert!(worst < Duration::from_millis(20), "push took {worst:?}");
    }

    #[test]
    fn recv_times_out_without_audio() {
        let (_sink, rx, _) = channel(2, 16);
        let t = Instant::now();
        let res = rx.recv_timeout(Duration::from_millis(20));
        assert!(matches!(res, Err(RecvTimeoutError::Timeout)));
        assert!(t.elapsed() >= Duration::from_millis(15));
    }

    #[test]
    fn recv_reports_disconnect_when_sink_dropped() {
        let (sink, rx, _) = channel(2, 16);
        drop(sink);
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(5)),
            Err(RecvTimeoutError::Disconnected)
        ));
    }
}
