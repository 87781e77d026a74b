// SPDX-License-Identifier: MIT
//! Bandwidth-savings arithmetic over the tier ladder.
//!
//! Delivering `source` instead of `target` saves the bitrate gap between the
//! two rungs. The figures are derived purely from the ladder's nominal
//! bitrates; real savings depend on content and encoder behavior.

use crate::tiers::Tier;

/// Savings of delivering `source` in place of `target`, per the ladder.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Savings {
    /// Percentage of the target bitrate avoided. `0.0` when source == target.
    pub percentage: f64,
    /// Absolute bitrate gap in kbps.
    pub saved_kbps: u32,
    /// The gap converted to megabytes per minute of playback.
    pub saved_mb_per_minute: f64,
}

/// Compute the nominal savings for a source/target tier pair.
///
/// Deterministic; for any adjacent ladder pair the percentage lands in
/// `[0, 100)` because bitrates increase strictly up the ladder.
pub fn compute_savings(source: Tier, target: Tier) -> Savings {
    let source_kbps = source.typical_bitrate_kbps();
    let target_kbps = target.typical_bitrate_kbps();
    let saved_kbps = target_kbps.saturating_sub(source_kbps);

    let percentage = if target_kbps == 0 {
        0.0
    } else {
        saved_kbps as f64 / target_kbps as f64 * 100.0
    };
    let saved_mb_per_minute = saved_kbps as f64 * 60.0 / 8.0 / 1024.0;

    Savings {
        percentage,
        saved_kbps,
        saved_mb_per_minute,
    }
}
