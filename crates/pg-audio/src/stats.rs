use std::sync::atomic::{AtomicU64, Ordering};

/// Compteurs partagés entre le callback, le worker et la façade.
///
/// Tous atomiques, `Relaxed` : ce sont des statistiques, pas de la synchronisation.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    processed: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl PipelineCounters {
    #[inline]
    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> EngineStats {
        EngineStats {
            frames_processed: self.processed.load(Ordering::Relaxed),
            frames_dropped: self.dropped.load(Ordering::Relaxed),
            frames_failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Counters since engine construction.
///
/// # Example
/// ```
/// use pg_audio::stats::PipelineCounters;
/// let stats = PipelineCounters::default().snapshot();
/// assert_eq!(stats.frames_processed, 0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Frames analyzed and published.
    pub frames_processed: u64,
    /// Frames dropped because the hand-off queue was full.
    pub frames_dropped: u64,
    /// Frames rejected or panicking during analysis.
    pub frames_failed: u64,
}
