// SPDX-License-Identifier: MIT
//! # Resolution Tier Ladder and Planning
//!
//! The fixed resolution/bitrate ladder is the single source of truth for both
//! pixel dimensions and the bitrate figures the savings math runs on. The
//! ladder is total and ordered; every tier has exactly one designated delivery
//! tier one step down.
//!
//! The bitrate column is a policy table, not a measured encoder property:
//! the figures are nominal per-tier delivery rates and the derived savings
//! percentages are estimates, not guarantees for arbitrary content.

/// A 2D size in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

/// One rung of the resolution ladder.
///
/// Ordered from smallest to largest; `Ord` follows pixel count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tier {
    /// 854x480 @ 1 Mbps
    P480,
    /// 1280x720 @ 2.5 Mbps
    P720,
    /// 1920x1080 @ 5 Mbps
    P1080,
    /// 2560x1440 @ 8 Mbps
    P1440,
    /// 3840x2160 @ 16 Mbps
    Uhd4K,
    /// 7680x4320 @ 40 Mbps
    Uhd8K,
}

/// The full ladder, smallest first. Iteration order is the planning order.
pub const LADDER: [Tier; 6] = [
    Tier::P480,
    Tier::P720,
    Tier::P1080,
    Tier::P1440,
    Tier::Uhd4K,
    Tier::Uhd8K,
];

impl Tier {
    /// Display name as used in stats snapshots and ABR signals.
    pub fn name(self) -> &'static str {
        match self {
            Tier::P480 => "480p",
            Tier::P720 => "720p",
            Tier::P1080 => "1080p",
            Tier::P1440 => "1440p",
            Tier::Uhd4K => "4K",
            Tier::Uhd8K => "8K",
        }
    }

    /// Pixel dimensions for this tier.
    pub fn size(self) -> Size {
        match self {
            Tier::P480 => Size { w: 854, h: 480 },
            Tier::P720 => Size { w: 1280, h: 720 },
            Tier::P1080 => Size { w: 1920, h: 1080 },
            Tier::P1440 => Size { w: 2560, h: 1440 },
            Tier::Uhd4K => Size { w: 3840, h: 2160 },
            Tier::Uhd8K => Size { w: 7680, h: 4320 },
        }
    }

    /// Nominal delivery bitrate in kbps. Policy figure, not a measurement.
    pub fn typical_bitrate_kbps(self) -> u32 {
        match self {
            Tier::P480 => 1_000,
            Tier::P720 => 2_500,
            Tier::P1080 => 5_000,
            Tier::P1440 => 8_000,
            Tier::Uhd4K => 16_000,
            Tier::Uhd8K => 40_000,
        }
    }

    /// Parse a ladder name. Accepts the same spellings `name()` produces.
    pub fn from_name(name: &str) -> Option<Tier> {
        LADDER.iter().copied().find(|t| t.name() == name)
    }
}

/// Pick the target tier for a display.
///
/// An explicit tier wins verbatim. Otherwise the smallest tier whose
/// dimensions cover the display's physical pixels is chosen; a display larger
/// than the top of the ladder gets the top tier. Total and deterministic.
pub fn detect_target(
    explicit: Option<Tier>,
    display_w: u32,
    display_h: u32,
    device_pixel_ratio: f64,
) -> Tier {
    if let Some(tier) = explicit {
        return tier;
    }
    let dpr = if device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    let phys_w = (display_w as f64 * dpr).round() as u32;
    let phys_h = (display_h as f64 * dpr).round() as u32;

    for tier in LADDER {
        let s = tier.size();
        if s.w >= phys_w && s.h >= phys_h {
            return tier;
        }
    }
    Tier::Uhd8K
}

/// The designated delivery tier: one step down the ladder.
///
/// The bottom tier maps to itself; there is nothing further to deliver.
/// A fixed mapping rather than a function of measured bandwidth, trading
/// optimality for a bounded, predictable savings ratio.
pub fn optimal_source(target: Tier) -> Tier {
    match target {
        Tier::P480 => Tier::P480,
        Tier::P720 => Tier::P480,
        Tier::P1080 => Tier::P720,
        Tier::P1440 => Tier::P720,
        Tier::Uhd4K => Tier::P1080,
        Tier::Uhd8K => Tier::Uhd4K,
    }
}
