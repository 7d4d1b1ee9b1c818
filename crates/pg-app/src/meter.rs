use pg_core::frame::FeatureSnapshot;

const FULL: char = '█';
const EMPTY: char = '·';

/// Horizontal bar of `width` cells filled proportionally to `level` in [0, 1].
///
/// Out-of-range and non-finite levels are pinned to the nearest end.
#[must_use]
pub fn bar(level: f64, width: usize) -> String {
    let level = if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = ((level * width as f64).round() as usize).min(width);
    let mut out = String::with_capacity(width * 3);
    out.extend(std::iter::repeat_n(FULL, filled));
    out.extend(std::iter::repeat_n(EMPTY, width - filled));
    out
}

/// One status line for a snapshot: four bars and a beat marker.
#[must_use]
pub fn render_line(snap: &FeatureSnapshot, width: usize) -> String {
    format!(
        "B {} M {} H {} V {} {}",
        bar(snap.bass_level, width),
        bar(snap.mid_level, width),
        bar(snap.high_level, width),
        bar(snap.overall_volume, width),
        if snap.beat_detected { "●" } else { " " }
    )
}
