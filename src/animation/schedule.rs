//! Sequential particle scheduling.
//!
//! Edges take turns: each gets one window on a shared looping timeline, in
//! traversal order, with no gaps and no overlap.

/// Shortest particle trip (ms)
pub const MIN_DURATION_MS: f64 = 2000.0;
/// Longest particle trip (ms)
pub const MAX_DURATION_MS: f64 = 3500.0;
/// Trip time per unit of path length (ms)
pub const MS_PER_LENGTH: f64 = 15.0;

/// Trip duration for a path of the given length, clamped to
/// [`MIN_DURATION_MS`]..=[`MAX_DURATION_MS`].
pub fn duration_for_length(length: f64) -> f64 {
    let length = if length.is_finite() { length.max(0.0) } else { 0.0 };
    (length * MS_PER_LENGTH).clamp(MIN_DURATION_MS, MAX_DURATION_MS)
}

/// Time window during which one edge's particle is visible.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleWindow {
    /// Absolute start time (ms)
    pub start: f64,
    /// Length of the window (ms), always > 0
    pub duration: f64,
}

impl ParticleWindow {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// One full loop across all edges.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    /// Absolute time the loop started (ms)
    pub origin: f64,
    /// One window per edge, in edge order.
    pub windows: Vec<ParticleWindow>,
    /// Loop length (ms): the sum of all window durations.
    pub total: f64,
}

impl Timeline {
    /// Position inside the current loop, or `None` for an empty timeline.
    pub fn elapsed(&self, now: f64) -> Option<f64> {
        (self.total > 0.0).then(|| (now - self.origin).rem_euclid(self.total))
    }

    /// Progress in `[0, 1)` through window `index` at loop position
    /// `elapsed`, or `None` when that window is not active.
    pub fn progress(&self, index: usize, elapsed: f64) -> Option<f64> {
        let window = self.windows.get(index)?;
        let local = elapsed - (window.start - self.origin);
        (local >= 0.0 && local < window.duration).then(|| local / window.duration)
    }
}

/// Chain one window per path length, starting at `now`.
pub fn schedule(lengths: &[f64], now: f64) -> Timeline {
    let mut cursor = now;
    let windows = lengths
        .iter()
        .map(|len| {
            let window = ParticleWindow {
                start: cursor,
                duration: duration_for_length(*len),
            };
            cursor += window.duration;
            window
        })
        .collect();
    Timeline {
        origin: now,
        windows,
        total: cursor - now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_clamp() {
        assert_eq!(duration_for_length(0.0), 2000.0);
        assert_eq!(duration_for_length(100.0), 2000.0);
        assert_eq!(duration_for_length(150.0), 2250.0);
        assert_eq!(duration_for_length(3500.0 / 15.0), 3500.0);
        assert_eq!(duration_for_length(10_000.0), 3500.0);
        assert_eq!(duration_for_length(f64::NAN), 2000.0);
        assert_eq!(duration_for_length(-5.0), 2000.0);
    }

    #[test]
    fn test_windows_chain_without_gaps() {
        let lengths = [0.0, 150.0, 500.0, 180.0];
        let timeline = schedule(&lengths, 1_000.0);
        let sum: f64 = timeline.windows.iter().map(|w| w.duration).sum();
        assert_eq!(timeline.total, sum);
        assert_eq!(timeline.windows[0].start, 1_000.0);
        for pair in timeline.windows.windows(2) {
            assert_eq!(pair[1].start, pair[0].end());
        }
        for (i, a) in timeline.windows.iter().enumerate() {
            for b in &timeline.windows[i + 1..] {
                assert!(a.end() <= b.start || b.end() <= a.start);
            }
        }
    }

    #[test]
    fn test_exactly_one_active_window() {
        let timeline = schedule(&[100.0, 200.0, 300.0], 0.0);
        let mut t = 0.0;
        while t < timeline.total * 2.0 {
            let elapsed = timeline.elapsed(t).unwrap();
            let active = (0..3).filter(|i| timeline.progress(*i, elapsed).is_some()).count();
            assert_eq!(active, 1, "at t={t}");
            t += 97.0;
        }
    }

    #[test]
    fn test_loop_wraps_and_handles_clock_before_origin() {
        let timeline = schedule(&[0.0], 500.0);
        assert_eq!(timeline.elapsed(500.0), Some(0.0));
        assert_eq!(timeline.elapsed(2_600.0), Some(100.0));
        assert_eq!(timeline.elapsed(400.0), Some(1_900.0));
        assert_eq!(timeline.progress(0, 1_000.0), Some(0.5));
    }

    #[test]
    fn test_empty_timeline() {
        let timeline = schedule(&[], 42.0);
        assert_eq!(timeline.total, 0.0);
        assert_eq!(timeline.elapsed(100.0), None);
    }
}
