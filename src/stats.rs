//! # Upscaling Stats and Bandwidth Accounting
//!
//! The stats snapshot is the only state mutated across loop iterations
//! within a session. It is owned exclusively by the engine and read by the
//! host at arbitrary times, so every update replaces the whole snapshot
//! under the cell's lock — a reader clone never observes a half-written
//! update.
//!
//! Savings figures come straight from the tier ladder's nominal bitrates.
//! They are policy estimates, not measured encoder output.

use std::sync::Mutex;
use std::time::Duration;

use sp_scale::savings::{compute_savings, Savings};
use sp_scale::tiers::Tier;

use crate::render::Strategy;

/// Read-only snapshot returned to callers via `getStats`.
///
/// Zero-valued at construction, populated on the first successful frame,
/// reset only by a new `start()`.
#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct UpscalingStats {
    /// Delivery tier name ("720p"), empty before the first session.
    pub original_resolution: String,
    /// Output tier name ("1080p"), empty before the first session.
    pub target_resolution: String,
    /// Cumulative megabytes saved this session. Monotonic non-decreasing.
    pub bandwidth_saved_mb: f64,
    /// Wall-clock render time of the last frame in milliseconds.
    pub upscaling_latency_ms: f64,
    /// Nominal host refresh rate in Hz.
    pub frame_rate: f64,
    /// Nominal savings percentage for the session's tier pair.
    pub savings_percentage: f64,
    /// Frames rendered and presented this session.
    pub frames_rendered: u64,
    /// Loop iterations skipped (no frame, render or present failure).
    pub frames_skipped: u64,
    /// Permanent strategy downgrades taken this session.
    pub downgrades: u32,
    /// The strategy currently rendering, if a session is live.
    pub active_strategy: Option<Strategy>,
}

/// Tear-free holder for the stats snapshot. Updates swap the whole value.
#[derive(Default)]
pub struct StatsCell {
    inner: Mutex<UpscalingStats>,
}

impl StatsCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clone the current snapshot. Safe at any point in the frame loop.
    pub fn snapshot(&self) -> UpscalingStats {
        self.inner.lock().expect("stats lock poisoned").clone()
    }

    /// Replace the snapshot wholesale.
    pub fn replace(&self, next: UpscalingStats) {
        *self.inner.lock().expect("stats lock poisoned") = next;
    }
}

/// Accumulates nominal savings over one `start()`/`stop()` session.
///
/// The running total is monotonic non-decreasing for the session lifetime;
/// a new session constructs a fresh accountant, never carrying totals over.
pub struct BandwidthAccountant {
    savings: Savings,
    accumulated_mb: f64,
}

impl BandwidthAccountant {
    /// Account for delivering `source` in place of `target`.
    pub fn new(source: Tier, target: Tier) -> Self {
        Self {
            savings: compute_savings(source, target),
            accumulated_mb: 0.0,
        }
    }

    /// An accountant that records nothing (bandwidth savings disabled).
    pub fn inert(tier: Tier) -> Self {
        Self::new(tier, tier)
    }

    /// Per-pair savings for the session.
    pub fn savings(&self) -> Savings {
        self.savings
    }

    /// Add the savings earned over `elapsed` of playback and return the new
    /// running total in megabytes.
    pub fn accumulate(&mut self, elapsed: Duration) -> f64 {
        let minutes = elapsed.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.accumulated_mb += self.savings.saved_mb_per_minute * minutes;
        }
        self.accumulated_mb
    }

    pub fn total_mb(&self) -> f64 {
        self.accumulated_mb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulation_is_monotonic() {
        let mut acct = BandwidthAccountant::new(Tier::P1080, Tier::Uhd4K);
        let mut last = 0.0;
        for _ in 0..100 {
            let total = acct.accumulate(Duration::from_millis(16));
            assert!(total >= last);
            last = total;
        }
        assert!(last > 0.0);
    }

    #[test]
    fn one_minute_matches_ladder_rate() {
        let mut acct = BandwidthAccountant::new(Tier::P1080, Tier::Uhd4K);
        let total = acct.accumulate(Duration::from_secs(60));
        let per_minute = compute_savings(Tier::P1080, Tier::Uhd4K).saved_mb_per_minute;
        assert!((total - per_minute).abs() < 1e-9);
    }

    #[test]
    fn inert_accountant_records_nothing() {
        let mut acct = BandwidthAccountant::inert(Tier::P1080);
        assert_eq!(acct.accumulate(Duration::from_secs(600)), 0.0);
        assert_eq!(acct.savings().percentage, 0.0);
    }

    #[test]
    fn fresh_accountant_starts_at_zero() {
        let acct = BandwidthAccountant::new(Tier::P720, Tier::P1080);
        assert_eq!(acct.total_mb(), 0.0);
    }

    #[test]
    fn stats_cell_swaps_whole_snapshots() {
        let cell = StatsCell::new();
        assert_eq!(cell.snapshot().frames_rendered, 0);

        let mut next = cell.snapshot();
        next.frames_rendered = 42;
        next.target_resolution = "4K".into();
        cell.replace(next);

        let got = cell.snapshot();
        assert_eq!(got.frames_rendered, 42);
        assert_eq!(got.target_resolution, "4K");
    }
}
