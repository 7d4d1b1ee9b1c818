use std::sync::Arc;

use arc_swap::ArcSwap;
use pg_core::frame::FeatureSnapshot;

/// Dernier snapshot publié, partagé entre le worker et les consommateurs.
///
/// Publication = un seul échange atomique de pointeur ; un lecteur voit
/// toujours un snapshot complet, jamais un mélange de deux frames.
///
/// # Example
/// ```
/// use pg_audio::store::FeatureStore;
/// use pg_core::frame::FeatureSnapshot;
///
/// let store = FeatureStore::new();
/// assert_eq!(store.load(), FeatureSnapshot::default());
/// store.publish(FeatureSnapshot { bass_level: 0.5, ..FeatureSnapshot::default() });
/// assert_eq!(store.load().bass_level, 0.5);
/// ```
#[derive(Debug)]
pub struct FeatureStore {
    current: ArcSwap<FeatureSnapshot>,
}

impl FeatureStore {
    /// Store holding the neutral snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(FeatureSnapshot::default()),
        }
    }

    /// Copy of the most recently published snapshot. Never blocks.
    #[inline]
    #[must_use]
    pub fn load(&self) -> FeatureSnapshot {
        **self.current.load()
    }

    /// Replace the published snapshot.
    #[inline]
    pub fn publish(&self, snapshot: FeatureSnapshot) {
        self.current.store(Arc::new(snapshot));
    }

    /// Publish the neutral all-zero snapshot.
    pub fn reset(&self) {
        self.publish(FeatureSnapshot::default());
    }
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new()
    }
}
