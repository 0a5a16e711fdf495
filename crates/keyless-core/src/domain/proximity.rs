//! Signal-strength smoothing and hysteresis for proximity detection.
//!
//! # Why not react to each sample? (for beginners)
//!
//! Received signal strength (RSSI, in dBm) is extremely noisy: a hand over
//! the phone, a passing car, or the body turning can move a single reading
//! by 10–20 dB.  Acting on raw samples would lock and unlock the car every
//! few seconds while the owner stands still next to it.
//!
//! Two techniques tame the noise:
//!
//! 1. **Median smoothing** – the last `N` samples are kept in a
//!    [`RssiWindow`] and the decision metric is their median.  Unlike a mean,
//!    a median ignores a single wild spike entirely.
//!
//! 2. **Hysteresis** – two thresholds are used instead of one.  The filter
//!    only reports [`ProximityState::Near`] above `unlock` and only reports
//!    [`ProximityState::Far`] below `lock`.  Anything in between (the
//!    *hysteresis band*) keeps the previous state.
//!
//! ```text
//!  dBm   -40 ─────────────────────────────
//!              Near
//!  unlock -60 ─────────────────────────────
//!              (keep previous state)
//!  lock   -75 ─────────────────────────────
//!              Far
//!        -100 ─────────────────────────────
//! ```

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default number of samples kept in the smoothing window.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Errors raised when building a proximity filter from configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ProximityError {
    /// The lock threshold must not be stronger than the unlock threshold.
    #[error("lock threshold {lock} dBm must not exceed unlock threshold {unlock} dBm")]
    InvertedThresholds { unlock: i16, lock: i16 },

    /// A window needs room for at least one sample.
    #[error("window size must be at least 1")]
    EmptyWindow,
}

/// Coarse proximity classification derived from the smoothed signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProximityState {
    #[default]
    Unknown,
    Near,
    Far,
}

/// Bounded, ordered history of the most recent signal-strength samples.
///
/// When full, pushing a new sample drops the oldest one.
#[derive(Debug, Clone)]
pub struct RssiWindow {
    samples: VecDeque<i16>,
    capacity: usize,
}

impl RssiWindow {
    /// Creates an empty window holding at most `capacity` samples.
    ///
    /// # Errors
    ///
    /// Returns [`ProximityError::EmptyWindow`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, ProximityError> {
        if capacity == 0 {
            return Err(ProximityError::EmptyWindow);
        }
        Ok(Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        })
    }

    /// Appends a sample, evicting the oldest when the window is full.
    pub fn push(&mut self, rssi: i16) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(rssi);
    }

    /// Median of the current samples, or `None` when the window is empty.
    ///
    /// With an even number of samples the two middle values are averaged
    /// (rounding toward zero).
    pub fn median(&self) -> Option<i16> {
        if self.samples.is_empty() {
            return None;
        }
        let mut sorted: Vec<i16> = self.samples.iter().copied().collect();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 1 {
            Some(sorted[mid])
        } else {
            let sum = i32::from(sorted[mid - 1]) + i32::from(sorted[mid]);
            Some((sum / 2) as i16)
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discards all samples (e.g. after a disconnect).
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Unlock/lock signal thresholds in dBm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    unlock: i16,
    lock: i16,
}

impl Thresholds {
    /// Validates and builds a threshold pair.
    ///
    /// # Errors
    ///
    /// Returns [`ProximityError::InvertedThresholds`] if `lock > unlock`.
    pub fn new(unlock: i16, lock: i16) -> Result<Self, ProximityError> {
        if lock > unlock {
            return Err(ProximityError::InvertedThresholds { unlock, lock });
        }
        Ok(Self { unlock, lock })
    }

    pub fn unlock(&self) -> i16 {
        self.unlock
    }

    pub fn lock(&self) -> i16 {
        self.lock
    }

    /// Classifies a smoothed value, keeping `previous` inside the band.
    pub fn classify(&self, smoothed: i16, previous: ProximityState) -> ProximityState {
        if smoothed > self.unlock {
            ProximityState::Near
        } else if smoothed < self.lock {
            ProximityState::Far
        } else {
            previous
        }
    }
}

/// Median filter plus hysteresis classifier.
#[derive(Debug, Clone)]
pub struct ProximityFilter {
    window: RssiWindow,
    thresholds: Thresholds,
    state: ProximityState,
}

impl ProximityFilter {
    pub fn new(window_size: usize, thresholds: Thresholds) -> Result<Self, ProximityError> {
        Ok(Self {
            window: RssiWindow::new(window_size)?,
            thresholds,
            state: ProximityState::Unknown,
        })
    }

    /// Records a raw sample and returns the updated classification.
    pub fn observe(&mut self, rssi: i16) -> ProximityState {
        self.window.push(rssi);
        if let Some(smoothed) = self.window.median() {
            let next = self.thresholds.classify(smoothed, self.state);
            if next != self.state {
                debug!(smoothed, from = ?self.state, to = ?next, "proximity changed");
            }
            self.state = next;
        }
        self.state
    }

    /// Current smoothed value (window median).
    pub fn smoothed(&self) -> Option<i16> {
        self.window.median()
    }

    pub fn state(&self) -> ProximityState {
        self.state
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Forgets all samples and the classification.
    pub fn reset(&mut self) {
        self.window.clear();
        self.state = ProximityState::Unknown;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds::new(-60, -75).unwrap()
    }

    // ── RssiWindow ────────────────────────────────────────────────────────────

    #[test]
    fn test_window_rejects_zero_capacity() {
        assert_eq!(RssiWindow::new(0).unwrap_err(), ProximityError::EmptyWindow);
    }

    #[test]
    fn test_window_drops_oldest_sample_on_overflow() {
        // Arrange
        let mut window = RssiWindow::new(3).unwrap();

        // Act
        for s in [-90, -50, -51, -52] {
            window.push(s);
        }

        // Assert – the -90 sample fell out, so the median ignores it
        assert_eq!(window.len(), 3);
        assert_eq!(window.median(), Some(-51));
    }

    #[test]
    fn test_median_of_empty_window_is_none() {
        let window = RssiWindow::new(5).unwrap();
        assert_eq!(window.median(), None);
    }

    #[test]
    fn test_median_ignores_single_spike() {
        let mut window = RssiWindow::new(5).unwrap();
        for s in [-80, -79, -30, -81, -80] {
            window.push(s);
        }
        assert_eq!(window.median(), Some(-80));
    }

    #[test]
    fn test_median_of_even_count_averages_middle_pair() {
        let mut window = RssiWindow::new(5).unwrap();
        for s in [-70, -60, -64, -66] {
            window.push(s);
        }
        // sorted: -70 -66 -64 -60 → (-66 + -64) / 2
        assert_eq!(window.median(), Some(-65));
    }

    // ── Thresholds ────────────────────────────────────────────────────────────

    #[test]
    fn test_thresholds_reject_lock_above_unlock() {
        assert_eq!(
            Thresholds::new(-70, -60),
            Err(ProximityError::InvertedThresholds { unlock: -70, lock: -60 })
        );
    }

    #[test]
    fn test_thresholds_allow_equal_values() {
        assert!(Thresholds::new(-65, -65).is_ok());
    }

    #[test]
    fn test_classify_keeps_previous_state_inside_band() {
        let t = thresholds();
        assert_eq!(t.classify(-65, ProximityState::Near), ProximityState::Near);
        assert_eq!(t.classify(-65, ProximityState::Far), ProximityState::Far);
        assert_eq!(t.classify(-65, ProximityState::Unknown), ProximityState::Unknown);
    }

    #[test]
    fn test_classify_boundaries_are_exclusive() {
        let t = thresholds();
        // exactly on a threshold is still inside the band
        assert_eq!(t.classify(-60, ProximityState::Far), ProximityState::Far);
        assert_eq!(t.classify(-75, ProximityState::Near), ProximityState::Near);
        assert_eq!(t.classify(-59, ProximityState::Far), ProximityState::Near);
        assert_eq!(t.classify(-76, ProximityState::Near), ProximityState::Far);
    }

    // ── ProximityFilter ───────────────────────────────────────────────────────

    #[test]
    fn test_filter_reports_near_after_strong_samples() {
        let mut filter = ProximityFilter::new(5, thresholds()).unwrap();
        let mut state = ProximityState::Unknown;
        for _ in 0..3 {
            state = filter.observe(-50);
        }
        assert_eq!(state, ProximityState::Near);
    }

    #[test]
    fn test_filter_does_not_chatter_inside_band() {
        // Arrange: settle Near first
        let mut filter = ProximityFilter::new(5, thresholds()).unwrap();
        for _ in 0..5 {
            filter.observe(-50);
        }

        // Act: oscillate just inside both thresholds
        let mut seen = Vec::new();
        for i in 0..20 {
            let sample = if i % 2 == 0 { -61 } else { -74 };
            seen.push(filter.observe(sample));
        }

        // Assert: never flips to Far
        assert!(seen.iter().all(|s| *s == ProximityState::Near));
    }

    #[test]
    fn test_filter_moves_to_far_when_median_drops_below_lock() {
        let mut filter = ProximityFilter::new(5, thresholds()).unwrap();
        for _ in 0..5 {
            filter.observe(-50);
        }
        for _ in 0..3 {
            filter.observe(-90);
        }
        assert_eq!(filter.state(), ProximityState::Far);
    }

    #[test]
    fn test_reset_clears_samples_and_state() {
        let mut filter = ProximityFilter::new(5, thresholds()).unwrap();
        filter.observe(-40);
        filter.reset();
        assert_eq!(filter.state(), ProximityState::Unknown);
        assert_eq!(filter.smoothed(), None);
    }
}
